//! Network Device Modules
//!
//! Modules that drive network devices over NETCONF.
//!
//! # Supported Platforms
//!
//! - **Juniper Junos**: single RPC execution via `junos_rpc`
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Save em0 media details
//!   junos_rpc:
//!     host: "{{ inventory_hostname }}"
//!     rpc: get-interface-information
//!     kwargs: "interface_name=em0,media=True"
//!     format: xml
//!     dest: "{{ inventory_hostname }}.em0.xml"
//! ```
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +-------------------+
//! |   junos_rpc      |---->|  SessionFactory   |
//! |   (kwargs)       |     |  DeviceSession    |
//! +------------------+     +-------------------+
//!                                   |
//!                                   v
//!                          +-------------------+
//!                          |   NETCONF/SSH     |
//!                          |   (russh)         |
//!                          +-------------------+
//! ```

#[cfg(feature = "russh")]
pub mod junos_rpc;
pub mod kwargs;

#[cfg(feature = "russh")]
pub use junos_rpc::{build_rpc_call, render_reply, write_reply, JunosRpcModule, JunosRpcParams};
pub use kwargs::{parse_kwargs, KwargValue, KwargsMap};
