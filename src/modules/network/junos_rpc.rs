//! JunOS RPC Module - run a single NETCONF RPC on a Juniper device
//!
//! Opens a session, dispatches one RPC built from `rpc`, `kwargs` and
//! `filter_xml`, closes the session and optionally writes the reply to a
//! local file.
//!
//! ## Parameters
//!
//! - `host`: Device hostname or address (required)
//! - `user`: Login user - default: the user running the module
//! - `passwd`: Login password
//! - `ssh_private_key_file`: Private key for key-based login
//! - `port`: NETCONF port - default: 830
//! - `mode`: Console transport (`telnet`, `serial`) - default: none (NETCONF/SSH)
//! - `logfile`: Append logs to this file (set up by the `junos_rpc` binary)
//! - `rpc`: RPC name, hyphens or underscores (required)
//! - `kwargs`: RPC arguments, `a=b,c=d` or `{a:b,c:d}`
//! - `filter_xml`: Configuration filter, only used by `get-config`
//! - `format`: Reply format (text, xml, json) - default: xml
//! - `timeout`: RPC timeout in seconds, 0 keeps the session default
//! - `dest`: File the reply is written to
//!
//! ## Examples
//!
//! ```yaml
//! - junos_rpc:
//!     host: "{{ inventory_hostname }}"
//!     rpc: get-interface-information
//!     kwargs: "interface_name=em0,media=True"
//!     format: text
//!     dest: "/tmp/{{ inventory_hostname }}.em0.txt"
//!
//! - junos_rpc:
//!     host: "{{ inventory_hostname }}"
//!     rpc: get-config
//!     filter_xml: "<configuration><system/></configuration>"
//!     dest: "~/backups/{{ inventory_hostname }}.system.xml"
//! ```

use crate::connection::netconf::NetconfSessionFactory;
use crate::connection::{
    ConnectionError, ConnectionMode, DeviceTarget, OutputFormat, RpcCall, RpcReply,
    SessionFactory,
};
use crate::modules::network::kwargs::{parse_kwargs, KwargValue, KwargsMap};
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ============================================================================
// Parameters
// ============================================================================

/// Validated module options
#[derive(Debug, Clone)]
pub struct JunosRpcParams {
    pub target: DeviceTarget,
    /// RPC name as given by the user
    pub rpc: String,
    pub kwargs: KwargsMap,
    pub filter_xml: Option<String>,
    pub format: OutputFormat,
    /// Seconds; 0 keeps the session default
    pub timeout: u32,
    pub dest: Option<String>,
}

impl JunosRpcParams {
    pub fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let mut args = Self::options(params)?;
        args.kwargs = parse_kwargs(params.get_string("kwargs")?.as_deref());
        Ok(args)
    }

    /// Every option except `kwargs`, which parses best effort and never
    /// fails validation
    fn options(params: &ModuleParams) -> ModuleResult<Self> {
        let host = params.get_string_required("host")?;
        let rpc = params.get_string_required("rpc")?;
        if rpc.trim().is_empty() {
            return Err(ModuleError::InvalidParameter(
                "rpc must not be empty".to_string(),
            ));
        }

        let mut target = DeviceTarget::new(host);
        if let Some(user) = params.get_string("user")? {
            target = target.with_user(user);
        }
        if let Some(passwd) = params.get_string("passwd")? {
            target = target.with_password(passwd);
        }
        if let Some(key) = params.get_string("ssh_private_key_file")? {
            target = target.with_private_key_file(shellexpand::tilde(&key).into_owned());
        }
        if let Some(port) = params.get_u32("port")? {
            let port = u16::try_from(port)
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| {
                    ModuleError::InvalidParameter("port must be 1-65535".to_string())
                })?;
            target = target.with_port(port);
        }
        if let Some(mode) = params.get_string("mode")? {
            target = target.with_mode(parse_mode(&mode)?);
        }

        let format = match params.get_string("format")? {
            Some(f) => OutputFormat::from_str(&f)?,
            None => OutputFormat::default(),
        };

        Ok(Self {
            target,
            rpc,
            kwargs: KwargsMap::new(),
            filter_xml: params.get_string("filter_xml")?,
            format,
            timeout: params.get_u32("timeout")?.unwrap_or(0),
            dest: params.get_string("dest")?,
        })
    }

    /// The call this invocation dispatches
    pub fn rpc_call(&self) -> RpcCall {
        build_rpc_call(
            &self.rpc,
            &self.kwargs,
            self.filter_xml.as_deref(),
            self.format,
        )
    }
}

/// `mode` option: empty or `none` selects NETCONF over SSH
fn parse_mode(mode: &str) -> ModuleResult<ConnectionMode> {
    match mode.trim().to_lowercase().as_str() {
        "" | "none" | "netconf" => Ok(ConnectionMode::Netconf),
        "telnet" => Ok(ConnectionMode::Telnet),
        "serial" => Ok(ConnectionMode::Serial),
        other => Err(ModuleError::InvalidParameter(format!(
            "Invalid mode '{}'. Valid modes: telnet, serial",
            other
        ))),
    }
}

// ============================================================================
// Call construction
// ============================================================================

/// Build the RPC call for `rpc`.
///
/// `get-config` takes the parsed kwargs as options, with `format` merged in
/// last, and carries the filter document. Every other RPC gets `format` as
/// its only option and the kwargs as arguments.
pub fn build_rpc_call(
    rpc: &str,
    kwargs: &KwargsMap,
    filter_xml: Option<&str>,
    format: OutputFormat,
) -> RpcCall {
    let mut call = RpcCall::new(rpc);

    if call.is_get_config() {
        call.options = kwargs.clone();
        call.options
            .insert("format".to_string(), KwargValue::from(format.as_str()));
        call.filter_xml = filter_xml
            .filter(|f| !f.trim().is_empty())
            .map(str::to_string);
    } else {
        call.options
            .insert("format".to_string(), KwargValue::from(format.as_str()));
        call.kwargs = kwargs.clone();
        if filter_xml.is_some() {
            warn!(rpc = %call.name, "filter_xml is only used by get-config, ignoring it");
        }
    }

    call
}

// ============================================================================
// Reply output
// ============================================================================

/// Serialize a reply the way it is written to `dest`
pub fn render_reply(reply: &RpcReply, format: OutputFormat) -> ModuleResult<String> {
    match reply {
        RpcReply::Document(doc) if format == OutputFormat::Text => Ok(doc.text_content()),
        RpcReply::Document(doc) => Ok(doc.as_str().to_string()),
        RpcReply::Data(data) => serde_json::to_string_pretty(data).map_err(|e| {
            ModuleError::ExecutionFailed(format!("Failed to serialize RPC reply: {}", e))
        }),
        RpcReply::Text(text) => Ok(text.clone()),
    }
}

/// Write `contents` to `dest`, expanding a leading `~`. Parent directories
/// must already exist.
pub fn write_reply(dest: &str, contents: &str) -> ModuleResult<PathBuf> {
    let path = PathBuf::from(shellexpand::tilde(dest).into_owned());
    std::fs::write(&path, contents).map_err(|e| ModuleError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(path)
}

/// Map a session error raised while connecting
fn connect_error(target: &DeviceTarget, err: ConnectionError) -> ModuleError {
    match err {
        ConnectionError::Incompatible(message) => ModuleError::Incompatible(message),
        other => ModuleError::ConnectionFailed {
            host: target.host.clone(),
            message: other.to_string(),
        },
    }
}

/// Drive `future` to completion from synchronous code.
///
/// Inside a tokio runtime the future runs on a scoped thread with its own
/// current-thread runtime, since blocking the caller's runtime is not allowed.
fn block_on<F>(future: F) -> ModuleResult<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    let run = move || -> ModuleResult<F::Output> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(future))
    };

    if tokio::runtime::Handle::try_current().is_ok() {
        std::thread::scope(|s| {
            s.spawn(run).join().map_err(|_| {
                ModuleError::ExecutionFailed("RPC worker thread panicked".to_string())
            })?
        })
    } else {
        run()
    }
}

// ============================================================================
// Module
// ============================================================================

/// Module for running a single RPC on a Juniper device
pub struct JunosRpcModule {
    factory: Arc<dyn SessionFactory>,
}

impl Default for JunosRpcModule {
    fn default() -> Self {
        Self::new()
    }
}

impl JunosRpcModule {
    /// Module backed by NETCONF over SSH
    pub fn new() -> Self {
        Self::with_factory(Arc::new(NetconfSessionFactory))
    }

    pub fn with_factory(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Open a session, run the call and close the session again, whatever
    /// the RPC outcome.
    async fn dispatch(
        &self,
        args: &JunosRpcParams,
        call: &RpcCall,
        factory: &dyn SessionFactory,
    ) -> ModuleResult<RpcReply> {
        let target = &args.target;
        let mut session = factory
            .create(target)
            .map_err(|e| connect_error(target, e))?;

        info!(target = %target.identifier(), "Opening device session");
        session.open().await.map_err(|e| connect_error(target, e))?;

        if args.timeout > 0 {
            session.set_timeout(Duration::from_secs(u64::from(args.timeout)));
        }

        debug!(rpc = %call.name, timeout = ?session.timeout(), xml = %call.to_xml(), "Dispatching RPC");
        let result = session.rpc(call).await;

        if let Err(e) = session.close().await {
            warn!(target = %target.identifier(), error = %e, "Failed to close device session");
        }

        result.map_err(|e| ModuleError::RpcFailed {
            rpc: call.name.clone(),
            message: e.to_string(),
        })
    }

    fn run_rpc(
        &self,
        args: &JunosRpcParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let call = args.rpc_call();
        let kwargs = serde_json::to_value(&args.kwargs).map_err(|e| {
            ModuleError::ExecutionFailed(format!("Failed to serialize kwargs: {}", e))
        })?;

        if context.check_mode {
            return Ok(ModuleOutput::ok(format!(
                "Would execute RPC '{}' on {}",
                call.name, args.target.host
            ))
            .with_data("rpc", serde_json::json!(args.rpc))
            .with_data("kwargs", kwargs));
        }

        let factory = context
            .session_factory
            .clone()
            .unwrap_or_else(|| self.factory.clone());
        let reply = block_on(self.dispatch(args, &call, factory.as_ref()))??;

        let mut output = ModuleOutput::changed(format!(
            "Executed RPC '{}' on {}",
            call.name, args.target.host
        ))
        .with_data("rpc", serde_json::json!(args.rpc))
        .with_data("kwargs", kwargs);

        if let Some(ref dest) = args.dest {
            let contents = render_reply(&reply, args.format)?;
            let path = write_reply(dest, &contents)?;
            info!(rpc = %call.name, dest = %path.display(), "Wrote RPC reply");
            output = output.with_data("dest", serde_json::json!(path.display().to_string()));
        }

        if args.format == OutputFormat::Json {
            let raw = match reply {
                RpcReply::Data(data) => data,
                RpcReply::Text(text) => serde_json::Value::String(text),
                RpcReply::Document(doc) => serde_json::Value::String(doc.to_string()),
            };
            output = output.with_data("rpc_reply", raw);
        }

        Ok(output)
    }
}

impl Module for JunosRpcModule {
    fn name(&self) -> &'static str {
        "junos_rpc"
    }

    fn description(&self) -> &'static str {
        "Execute an RPC on a Juniper JunOS device via NETCONF/SSH"
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let args = JunosRpcParams::from_params(params)?;

        self.run_rpc(&args, context).map_err(|e| {
            error!(rpc = %args.rpc, host = %args.target.host, error = %e, "junos_rpc failed");
            e
        })
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        JunosRpcParams::options(params).map(|_| ())
    }

    fn required_params(&self) -> &[&'static str] {
        &["host", "rpc"]
    }
}
