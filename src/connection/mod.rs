//! Device session layer.
//!
//! The `junos_rpc` module never talks to the wire itself. It asks a
//! [`SessionFactory`] for a [`DeviceSession`] bound to a [`DeviceTarget`],
//! opens it, dispatches one [`RpcCall`] and closes it again.
//!
//! # Supported Transports
//!
//! - **NETCONF over SSH** (via `russh`, default `russh` feature): the
//!   [`netconf::NetconfSessionFactory`] used by the `junos_rpc` binary.
//!
//! Console transports (`telnet`, `serial`) are recognized in the target
//! configuration but rejected when a session is created.
//!
//! # Example
//!
//! ```rust,ignore
//! use junos_rpc::connection::{DeviceTarget, SessionFactory};
//! use junos_rpc::connection::netconf::NetconfSessionFactory;
//!
//! let target = DeviceTarget::new("router1.example.net").with_password("secret");
//! let mut session = NetconfSessionFactory.create(&target)?;
//! session.open().await?;
//! let reply = session.rpc(&call).await?;
//! session.close().await?;
//! ```

/// NETCONF over SSH session implementation using russh.
#[cfg(feature = "russh")]
pub mod netconf;

/// RPC call and reply types.
pub mod rpc;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use rpc::{OutputFormat, RpcCall, RpcError, RpcReply, XmlDocument};

/// Default NETCONF port
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// RPC timeout used when the caller does not set one
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(feature = "russh")]
impl From<::russh::Error> for ConnectionError {
    fn from(err: ::russh::Error) -> Self {
        ConnectionError::SshError(format!("Russh error: {}", err))
    }
}

/// Errors that can occur while talking to a device.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish initial connection to the device.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected by the device.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The device does not speak a protocol version we can use.
    #[error("Incompatible device: {0}")]
    Incompatible(String),

    /// The RPC was rejected or its reply could not be decoded.
    #[error("RPC failed: {0}")]
    RpcFailed(String),

    /// Connection or operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// SSH-specific error from the underlying implementation.
    #[error("SSH error: {0}")]
    SshError(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An operation was attempted on a session that is not open.
    #[error("Session is not open")]
    NotOpen,

    /// Connection was closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The requested transport is not supported by this backend.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// How the device is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// NETCONF over SSH (default)
    #[default]
    Netconf,
    /// NETCONF over a telnet console server
    Telnet,
    /// NETCONF over a serial console
    Serial,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Netconf => write!(f, "netconf"),
            ConnectionMode::Telnet => write!(f, "telnet"),
            ConnectionMode::Serial => write!(f, "serial"),
        }
    }
}

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    pub port: u16,
    pub mode: ConnectionMode,
    pub private_key_file: Option<PathBuf>,
}

impl DeviceTarget {
    /// Target `host` on the default NETCONF port as the current user
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: current_user(),
            password: None,
            port: DEFAULT_NETCONF_PORT,
            mode: ConnectionMode::default(),
            private_key_file: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_private_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_file = Some(path.into());
        self
    }

    /// `user@host:port`, used in logs
    pub fn identifier(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Name of the user running the process
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

/// A session with a managed device.
///
/// Sessions are created closed; `open` must succeed before `rpc` is called.
#[async_trait]
pub trait DeviceSession: Send {
    /// Establish the session
    async fn open(&mut self) -> ConnectionResult<()>;

    /// Tear the session down. Closing a closed session is a no-op.
    async fn close(&mut self) -> ConnectionResult<()>;

    /// Per-RPC timeout currently in effect
    fn timeout(&self) -> Duration;

    /// Change the per-RPC timeout
    fn set_timeout(&mut self, timeout: Duration);

    /// Dispatch an RPC and decode the reply in the call's format
    async fn rpc(&mut self, call: &RpcCall) -> ConnectionResult<RpcReply>;
}

/// Builds unopened sessions for a target
pub trait SessionFactory: Send + Sync {
    fn create(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn DeviceSession>>;
}
