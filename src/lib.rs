//! # junos-rpc - Run a NETCONF RPC on a Juniper device
//!
//! A native implementation of the `junos_rpc` Ansible module. One invocation
//! opens a NETCONF session, runs a single RPC and saves the reply to a local
//! file as text, XML or JSON.
//!
//! ## Core Concepts
//!
//! - **Modules**: Units of work driven by Ansible-style parameters
//! - **kwargs**: A loose `a=b,c=d` or `{a:b,c:d}` argument string
//! - **Sessions**: Transport to the device (NETCONF over SSH)
//! - **Replies**: XML documents, text or JSON data returned by an RPC
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      junos_rpc binary                                │
//! │          (args file, config defaults, logging setup)                 │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       JunosRpcModule                                 │
//! │          (kwargs parsing, call building, reply output)               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  SessionFactory / DeviceSession                      │
//! │                     (NETCONF over russh)                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use junos_rpc::prelude::*;
//!
//! let mut params = ModuleParams::new();
//! params.insert("host".into(), "router1".into());
//! params.insert("rpc".into(), "get-interface-information".into());
//! params.insert("kwargs".into(), "interface_name=em0,media=True".into());
//! params.insert("dest".into(), "/tmp/em0.xml".into());
//!
//! let output = JunosRpcModule::new().run(&params, &ModuleContext::new())?;
//! println!("{}", output.to_result_json());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Connection types
    #[cfg(feature = "russh")]
    pub use crate::connection::netconf::{NetconfSession, NetconfSessionFactory};
    pub use crate::connection::{
        ConnectionError, ConnectionMode, ConnectionResult, DeviceSession, DeviceTarget,
        OutputFormat, RpcCall, RpcReply, SessionFactory, XmlDocument,
    };

    // Error handling
    pub use crate::error::{Error, Result};

    // Module system
    #[cfg(feature = "russh")]
    pub use crate::modules::network::JunosRpcModule;
    pub use crate::modules::network::{parse_kwargs, KwargValue, KwargsMap};
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
    };
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Device sessions: the session traits, RPC call/reply model and the
/// NETCONF over SSH backend.
pub mod connection;

/// Module trait, parameters, results and the `junos_rpc` module.
pub mod modules;

// ============================================================================
// Ambient Setup
// ============================================================================

/// Defaults loaded from configuration files and the environment.
pub mod config;

/// Tracing subscriber setup.
pub mod logging;

/// Loading module arguments the way Ansible hands them over.
pub mod module_args;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of junos-rpc.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
