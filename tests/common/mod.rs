//! Shared test utilities and fixtures for the junos-rpc test suite.
//!
//! This module provides:
//! - A mock device session and session factory that record every call
//! - Canned NETCONF replies
//! - Parameter builders
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use junos_rpc::connection::{
    ConnectionError, ConnectionResult, DeviceSession, DeviceTarget, RpcCall, RpcReply,
    SessionFactory, DEFAULT_RPC_TIMEOUT,
};
use junos_rpc::modules::ModuleParams;

// ============================================================================
// Canned Replies
// ============================================================================

pub const TEXT_REPLY: &str = r#"<rpc-reply xmlns:junos="http://xml.juniper.net/junos/21.4R0/junos">
<output>
Physical interface: em0, Enabled, Physical link is Up
  Link-level type: Ethernet, MTU: 1514, Speed: 1000mbps
</output>
</rpc-reply>"#;

pub const XML_REPLY: &str = r#"<rpc-reply xmlns:junos="http://xml.juniper.net/junos/21.4R0/junos">
<interface-information xmlns="http://xml.juniper.net/junos/21.4R0/junos-interface" junos:style="normal">
<physical-interface>
<name>em0</name>
<admin-status junos:format="Enabled">up</admin-status>
</physical-interface>
</interface-information>
</rpc-reply>"#;

pub const CONFIG_REPLY: &str = r#"<rpc-reply xmlns:junos="http://xml.juniper.net/junos/21.4R0/junos">
<configuration junos:commit-seconds="1700000000" junos:commit-user="netops">
<system><host-name>router1</host-name></system>
</configuration>
</rpc-reply>"#;

pub const JSON_REPLY: &str = r#"<rpc-reply>
{"software-information": [{"host-name": [{"data": "router1"}]}]}
</rpc-reply>"#;

pub const ERROR_REPLY: &str = r#"<rpc-reply>
<rpc-error>
<error-type>protocol</error-type>
<error-tag>operation-failed</error-tag>
<error-severity>error</error-severity>
<error-message>syntax error</error-message>
</rpc-error>
</rpc-reply>"#;

// ============================================================================
// Mock Session Implementation
// ============================================================================

/// How the mock should misbehave
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// `SessionFactory::create` fails
    Create(String),
    /// `open` fails to connect
    Open(String),
    /// `open` finds an incompatible device
    Incompatible(String),
    /// `rpc` fails
    Rpc(String),
}

/// State shared by a [`MockSessionFactory`] and every session it creates.
#[derive(Debug, Default)]
pub struct MockState {
    pub targets: RwLock<Vec<DeviceTarget>>,
    pub calls: RwLock<Vec<RpcCall>>,
    pub timeouts: RwLock<Vec<Duration>>,
    pub raw_reply: RwLock<Option<String>>,
    pub failure: RwLock<Option<MockFailure>>,
    pub opened: AtomicU32,
    pub closed: AtomicU32,
}

impl MockState {
    pub fn open_count(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    pub fn last_call(&self) -> Option<RpcCall> {
        self.calls.read().last().cloned()
    }

    pub fn last_target(&self) -> Option<DeviceTarget> {
        self.targets.read().last().cloned()
    }
}

/// A mock device session.
///
/// Replies are decoded from the configured raw `<rpc-reply>` with the same
/// decoder the NETCONF backend uses, so reply handling is exercised end to
/// end.
pub struct MockSession {
    state: Arc<MockState>,
    timeout: Duration,
    open: bool,
}

#[async_trait]
impl DeviceSession for MockSession {
    async fn open(&mut self) -> ConnectionResult<()> {
        let failure = self.state.failure.read().clone();
        match failure {
            Some(MockFailure::Open(msg)) => return Err(ConnectionError::ConnectionFailed(msg)),
            Some(MockFailure::Incompatible(msg)) => {
                return Err(ConnectionError::Incompatible(msg))
            }
            _ => {}
        }
        self.open = true;
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        if self.open {
            self.open = false;
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.state.timeouts.write().push(timeout);
    }

    async fn rpc(&mut self, call: &RpcCall) -> ConnectionResult<RpcReply> {
        if !self.open {
            return Err(ConnectionError::NotOpen);
        }
        self.state.calls.write().push(call.clone());

        let failure = self.state.failure.read().clone();
        if let Some(MockFailure::Rpc(msg)) = failure {
            return Err(ConnectionError::RpcFailed(msg));
        }

        let raw = self
            .state
            .raw_reply
            .read()
            .clone()
            .unwrap_or_else(|| "<rpc-reply><ok/></rpc-reply>".to_string());
        RpcReply::decode(&raw, call.format())
    }
}

/// Factory handing out [`MockSession`]s that share one [`MockState`].
///
/// # Example
///
/// ```rust,ignore
/// let factory = MockSessionFactory::new().with_reply(XML_REPLY);
/// let module = JunosRpcModule::with_factory(Arc::new(factory.clone()));
/// module.execute(&params, &ModuleContext::new())?;
/// assert_eq!(factory.state.close_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    pub state: Arc<MockState>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `<rpc-reply>` returned by every RPC
    pub fn with_reply(self, raw: &str) -> Self {
        *self.state.raw_reply.write() = Some(raw.to_string());
        self
    }

    pub fn with_failure(self, failure: MockFailure) -> Self {
        *self.state.failure.write() = Some(failure);
        self
    }
}

impl SessionFactory for MockSessionFactory {
    fn create(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn DeviceSession>> {
        let failure = self.state.failure.read().clone();
        if let Some(MockFailure::Create(msg)) = failure {
            return Err(ConnectionError::UnsupportedOperation(msg));
        }
        self.state.targets.write().push(target.clone());
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            timeout: DEFAULT_RPC_TIMEOUT,
            open: false,
        }))
    }
}

// ============================================================================
// Parameter Helpers
// ============================================================================

/// Build module parameters from `key, value` pairs
pub fn params(pairs: &[(&str, serde_json::Value)]) -> ModuleParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// `host` and `rpc` plus extra pairs
pub fn rpc_params(rpc: &str, extra: &[(&str, serde_json::Value)]) -> ModuleParams {
    let mut p = params(&[
        ("host", serde_json::json!("router1")),
        ("rpc", serde_json::json!(rpc)),
    ]);
    p.extend(params(extra));
    p
}
