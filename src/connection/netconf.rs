//! NETCONF over SSH (RFC 6241, RFC 6242) using russh.
//!
//! Only what `junos_rpc` needs: the `netconf` SSH subsystem, a NETCONF 1.0
//! hello exchange, `]]>]]>` end-of-message framing, one `<rpc>` at a time,
//! and `<close-session/>` on the way out.

use async_trait::async_trait;
use russh::client::{Handle, Handler, Msg};
use russh::keys::key::PublicKey;
use russh::keys::agent::client::AgentClient;
use russh::keys::load_secret_key;
use russh::{Channel, ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::{
    ConnectionError, ConnectionMode, ConnectionResult, DeviceSession, DeviceTarget, RpcCall,
    RpcReply, SessionFactory, DEFAULT_RPC_TIMEOUT,
};

// ============================================================================
// NETCONF Constants
// ============================================================================

/// NETCONF 1.0 message delimiter
const NETCONF_1_0_DELIMITER: &str = "]]>]]>";

/// NETCONF SSH subsystem name
const NETCONF_SUBSYSTEM: &str = "netconf";

/// NETCONF base namespace (RFC 6241)
const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Capability every usable server must advertise
const BASE_1_0_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

/// Time allowed for TCP connect, SSH handshake and hello
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SSH Client Handler
// ============================================================================

/// Host key policy: reject keys that contradict `known_hosts`, accept
/// unknown hosts (like `StrictHostKeyChecking=accept-new`)
struct NetconfHandler {
    host: String,
    port: u16,
}

#[async_trait]
impl Handler for NetconfHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => {
                debug!(host = %self.host, "Host key verified against known_hosts");
                Ok(true)
            }
            Ok(false) => {
                warn!(
                    host = %self.host,
                    "Host not found in known_hosts, accepting (first connection)"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(
                    host = %self.host,
                    error = %e,
                    "HOST KEY VERIFICATION FAILED! Server key does not match known_hosts entry."
                );
                Ok(false)
            }
        }
    }
}

// ============================================================================
// NETCONF Session
// ============================================================================

/// A NETCONF session to one device
pub struct NetconfSession {
    target: DeviceTarget,
    timeout: Duration,
    handle: Option<Handle<NetconfHandler>>,
    channel: Option<Channel<Msg>>,
    /// Bytes received past the last complete message
    buffer: Vec<u8>,
    session_id: Option<u32>,
    capabilities: Vec<String>,
    message_id: u32,
}

impl NetconfSession {
    pub fn new(target: DeviceTarget) -> Self {
        Self {
            target,
            timeout: DEFAULT_RPC_TIMEOUT,
            handle: None,
            channel: None,
            buffer: Vec::new(),
            session_id: None,
            capabilities: Vec::new(),
            message_id: 0,
        }
    }

    /// Session ID assigned by the device in its hello
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Capabilities advertised by the device
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn next_message_id(&mut self) -> u32 {
        self.message_id += 1;
        self.message_id
    }

    async fn connect(&self) -> ConnectionResult<Handle<NetconfHandler>> {
        let config = Arc::new(russh::client::Config::default());

        let addr = (self.target.host.as_str(), self.target.port);
        let socket = tokio::time::timeout(CONNECT_TIMEOUT, tokio::net::TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::Timeout(CONNECT_TIMEOUT.as_secs()))?
            .map_err(|e| {
                ConnectionError::ConnectionFailed(format!(
                    "Failed to connect to {}: {}",
                    self.target.identifier(),
                    e
                ))
            })?;

        socket.set_nodelay(true).map_err(|e| {
            ConnectionError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
        })?;

        let handler = NetconfHandler {
            host: self.target.host.clone(),
            port: self.target.port,
        };

        let mut handle = russh::client::connect_stream(config, socket, handler)
            .await
            .map_err(|e| {
                ConnectionError::ConnectionFailed(format!("SSH handshake failed: {}", e))
            })?;

        self.authenticate(&mut handle).await?;
        Ok(handle)
    }

    /// Configured key file, then the SSH agent, then the default keys
    /// under `~/.ssh`, then password
    async fn authenticate(&self, handle: &mut Handle<NetconfHandler>) -> ConnectionResult<()> {
        let user = self.target.user.as_str();
        let explicit_key = self
            .target
            .private_key_file
            .as_ref()
            .map(|key_file| {
                PathBuf::from(shellexpand::tilde(&key_file.to_string_lossy()).into_owned())
            });

        if let Some(ref key_path) = explicit_key {
            if Self::try_key(handle, user, key_path).await {
                return Ok(());
            }
        }

        match Self::try_agent_auth(handle, user).await {
            Ok(()) => {
                debug!("Authenticated using SSH agent");
                return Ok(());
            }
            Err(e) => debug!(error = %e, "SSH agent authentication unavailable"),
        }

        for key_path in default_identity_files() {
            if explicit_key.as_deref() == Some(key_path.as_path()) {
                continue;
            }
            if Self::try_key(handle, user, &key_path).await {
                return Ok(());
            }
        }

        if let Some(ref password) = self.target.password {
            let authenticated = handle
                .authenticate_password(user, password)
                .await
                .map_err(|e| {
                    ConnectionError::AuthenticationFailed(format!(
                        "Password authentication failed: {}",
                        e
                    ))
                })?;

            if authenticated {
                debug!("Authenticated using password");
                return Ok(());
            }
        }

        Err(ConnectionError::AuthenticationFailed(format!(
            "All authentication methods failed for {}",
            self.target.identifier()
        )))
    }

    /// Offer one key file; failures are logged and reported as `false`
    async fn try_key(handle: &mut Handle<NetconfHandler>, user: &str, key_path: &Path) -> bool {
        match Self::try_key_auth(handle, user, key_path).await {
            Ok(true) => {
                debug!(key = %key_path.display(), "Authenticated using key");
                true
            }
            Ok(false) => {
                debug!(key = %key_path.display(), "Key rejected by device");
                false
            }
            Err(e) => {
                debug!(key = %key_path.display(), error = %e, "Key authentication failed");
                false
            }
        }
    }

    /// Offer every identity held by the agent at `SSH_AUTH_SOCK`
    async fn try_agent_auth(
        handle: &mut Handle<NetconfHandler>,
        user: &str,
    ) -> ConnectionResult<()> {
        let mut agent = AgentClient::connect_env().await.map_err(|e| {
            ConnectionError::AuthenticationFailed(format!("Failed to connect to SSH agent: {}", e))
        })?;

        let identities = agent.request_identities().await.map_err(|e| {
            ConnectionError::AuthenticationFailed(format!("Failed to get agent identities: {}", e))
        })?;

        if identities.is_empty() {
            return Err(ConnectionError::AuthenticationFailed(
                "SSH agent has no identities".to_string(),
            ));
        }

        debug!(identity_count = %identities.len(), "Found SSH agent identities");

        for identity in identities {
            let (returned_agent, result) = handle
                .authenticate_future(user, identity, agent)
                .await;
            agent = returned_agent;

            match result {
                Ok(true) => return Ok(()),
                Ok(false) => trace!("Agent identity rejected, trying next"),
                Err(e) => trace!(error = %e, "Agent authentication attempt failed"),
            }
        }

        Err(ConnectionError::AuthenticationFailed(
            "All SSH agent identities rejected".to_string(),
        ))
    }

    async fn try_key_auth(
        handle: &mut Handle<NetconfHandler>,
        user: &str,
        key_path: &Path,
    ) -> ConnectionResult<bool> {
        let key_pair = load_secret_key(key_path, None).map_err(|e| {
            ConnectionError::AuthenticationFailed(format!(
                "Failed to load key {}: {}",
                key_path.display(),
                e
            ))
        })?;

        handle
            .authenticate_publickey(user, Arc::new(key_pair))
            .await
            .map_err(|e| {
                ConnectionError::AuthenticationFailed(format!(
                    "Key authentication failed for {}: {}",
                    key_path.display(),
                    e
                ))
            })
    }

    async fn send(&mut self, message: &str) -> ConnectionResult<()> {
        let channel = self.channel.as_mut().ok_or(ConnectionError::NotOpen)?;
        trace!(bytes = message.len(), "Sending NETCONF message");
        channel.data(message.as_bytes()).await?;
        Ok(())
    }

    /// Read up to the next `]]>]]>`, keeping any bytes after it buffered
    async fn read_message(&mut self) -> ConnectionResult<String> {
        let timeout = self.timeout;
        let channel = self.channel.as_mut().ok_or(ConnectionError::NotOpen)?;
        let buffer = &mut self.buffer;

        let read = async move {
            loop {
                if let Some(message) = take_message(buffer) {
                    return Ok(message);
                }

                match channel.wait().await {
                    Some(ChannelMsg::Data { ref data }) => buffer.extend_from_slice(data),
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        return Err(ConnectionError::ConnectionClosed)
                    }
                    Some(_) => {}
                }
            }
        };

        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| ConnectionError::Timeout(timeout.as_secs()))?
    }

    async fn exchange_hello(&mut self) -> ConnectionResult<()> {
        let hello = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="{}">
  <capabilities>
    <capability>{}</capability>
  </capabilities>
</hello>{}"#,
            NETCONF_NS, BASE_1_0_CAPABILITY, NETCONF_1_0_DELIMITER
        );
        self.send(&hello).await?;

        let server_hello = self.read_message().await?;
        let (session_id, capabilities) = parse_server_hello(&server_hello)?;
        debug!(
            session_id = ?session_id,
            capabilities = capabilities.len(),
            "NETCONF session established"
        );
        self.session_id = session_id;
        self.capabilities = capabilities;
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for NetconfSession {
    async fn open(&mut self) -> ConnectionResult<()> {
        if self.channel.is_some() {
            return Ok(());
        }

        debug!(target = %self.target.identifier(), "Opening NETCONF session");
        let handle = self.connect().await?;

        let channel = handle.channel_open_session().await.map_err(|e| {
            ConnectionError::ConnectionFailed(format!("Failed to open channel: {}", e))
        })?;
        channel
            .request_subsystem(true, NETCONF_SUBSYSTEM)
            .await
            .map_err(|e| {
                ConnectionError::ConnectionFailed(format!(
                    "Failed to start {} subsystem: {}",
                    NETCONF_SUBSYSTEM, e
                ))
            })?;

        self.handle = Some(handle);
        self.channel = Some(channel);
        self.buffer.clear();

        let timeout = self.timeout;
        self.timeout = CONNECT_TIMEOUT;
        let hello = self.exchange_hello().await;
        self.timeout = timeout;

        if let Err(e) = hello {
            let _ = self.close().await;
            return Err(e);
        }
        Ok(())
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        if self.channel.is_some() {
            let id = self.next_message_id();
            let close = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><rpc xmlns="{}" message-id="{}"><close-session/></rpc>{}"#,
                NETCONF_NS, id, NETCONF_1_0_DELIMITER
            );
            if self.send(&close).await.is_ok() {
                let _ = self.read_message().await;
            }
        }

        if let Some(channel) = self.channel.take() {
            let _ = channel.eof().await;
        }
        if let Some(handle) = self.handle.take() {
            handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await?;
            debug!(target = %self.target.identifier(), "NETCONF session closed");
        }
        self.buffer.clear();
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn rpc(&mut self, call: &RpcCall) -> ConnectionResult<RpcReply> {
        if self.channel.is_none() {
            return Err(ConnectionError::NotOpen);
        }

        let message_id = self.next_message_id();
        let message = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rpc xmlns="{}" message-id="{}">{}</rpc>{}"#,
            NETCONF_NS,
            message_id,
            call.to_xml(),
            NETCONF_1_0_DELIMITER
        );

        debug!(rpc = %call.name, message_id, "Sending RPC");
        self.send(&message).await?;
        let reply = self.read_message().await?;
        RpcReply::decode(&reply, call.format())
    }
}

/// Creates [`NetconfSession`]s. Console modes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetconfSessionFactory;

impl SessionFactory for NetconfSessionFactory {
    fn create(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn DeviceSession>> {
        match target.mode {
            ConnectionMode::Netconf => Ok(Box::new(NetconfSession::new(target.clone()))),
            mode => Err(ConnectionError::UnsupportedOperation(format!(
                "{} mode is not supported by the NETCONF/SSH session backend",
                mode
            ))),
        }
    }
}

// ============================================================================
// Identity Files
// ============================================================================

/// Key file names tried under `~/.ssh`, in order
const DEFAULT_IDENTITY_NAMES: [&str; 4] = ["id_ed25519", "id_ecdsa", "id_rsa", "id_dsa"];

/// Existing default identity files of the current user
fn default_identity_files() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| identity_files_in(&home.join(".ssh")))
        .unwrap_or_default()
}

fn identity_files_in(ssh_dir: &Path) -> Vec<PathBuf> {
    DEFAULT_IDENTITY_NAMES
        .iter()
        .map(|name| ssh_dir.join(name))
        .filter(|p| p.exists())
        .collect()
}

// ============================================================================
// Framing and Hello Helpers
// ============================================================================

/// Remove and return the first complete message in `buffer`
fn take_message(buffer: &mut Vec<u8>) -> Option<String> {
    let delimiter = NETCONF_1_0_DELIMITER.as_bytes();
    let end = buffer
        .windows(delimiter.len())
        .position(|window| window == delimiter)?;

    let message = String::from_utf8_lossy(&buffer[..end]).into_owned();
    buffer.drain(..end + delimiter.len());
    Some(message)
}

/// Session ID and capabilities from a server `<hello>`
fn parse_server_hello(response: &str) -> ConnectionResult<(Option<u32>, Vec<String>)> {
    let mut session_id = None;
    if let Some(start) = response.find("<session-id>") {
        if let Some(end) = response.find("</session-id>") {
            let start_tag_end = start + "<session-id>".len();
            if start_tag_end <= end {
                session_id = response[start_tag_end..end].trim().parse::<u32>().ok();
            }
        }
    }

    let mut capabilities = Vec::new();
    let mut search_start = 0;
    while let Some(start) = response[search_start..].find("<capability>") {
        let abs_start = search_start + start + "<capability>".len();
        if let Some(end) = response[abs_start..].find("</capability>") {
            capabilities.push(response[abs_start..abs_start + end].trim().to_string());
            search_start = abs_start + end;
        } else {
            break;
        }
    }

    if !capabilities.iter().any(|c| c == BASE_1_0_CAPABILITY) {
        return Err(ConnectionError::Incompatible(format!(
            "device does not advertise {}",
            BASE_1_0_CAPABILITY
        )));
    }

    Ok((session_id, capabilities))
}
