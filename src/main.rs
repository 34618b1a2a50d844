//! junos_rpc - Run a NETCONF RPC on a Juniper device
//!
//! Ansible module entry point. Reads the module arguments, fills unset
//! options from configuration, runs the module and prints the JSON result
//! on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use junos_rpc::config::Config;
use junos_rpc::logging::{LogFormat, LoggingBuilder};
use junos_rpc::module_args;
use junos_rpc::modules::network::JunosRpcModule;
use junos_rpc::modules::{Module, ModuleContext, ModuleOutput, ModuleParams, ParamExt};
use std::path::PathBuf;
use std::process::ExitCode;

/// Execute an RPC on a Juniper device and save the reply
#[derive(Parser, Debug, Clone)]
#[command(name = "junos_rpc")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "Execute an RPC on a Juniper device via NETCONF", long_about = None)]
struct Cli {
    /// Module arguments file (JSON or key=value words)
    args_file: Option<PathBuf>,

    /// Module argument, overrides the arguments file (repeatable)
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    args: Vec<String>,

    /// Run in check mode (do not contact the device)
    #[arg(long = "check")]
    check_mode: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format on stderr (full, json)
    #[arg(long, default_value = "full")]
    log_format: String,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match run(&cli) {
        Ok(output) => output.to_result_json(),
        Err(e) => ModuleOutput::failed(format!("{:#}", e)).to_result_json(),
    };

    println!("{}", result);

    if result.get("failed").is_some() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: &Cli) -> Result<ModuleOutput> {
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let mut params = match cli.args_file {
        Some(ref path) => module_args::load_file(path)?,
        None => ModuleParams::new(),
    };
    module_args::apply_overrides(&mut params, &cli.args)?;
    let check_mode = module_args::strip_internal(&mut params) || cli.check_mode;
    config.apply_defaults(&mut params);

    init_logging(cli, &config, &params)?;

    let module = JunosRpcModule::new();
    let context = ModuleContext::new().with_check_mode(check_mode);
    let output = module.run(&params, &context)?;

    Ok(output)
}

/// Initialize logging from verbosity, configuration and the `logfile` option
fn init_logging(cli: &Cli, config: &Config, params: &ModuleParams) -> Result<()> {
    let format: LogFormat = cli.log_format.parse()?;
    let mut builder = LoggingBuilder::new()
        .with_verbosity(cli.verbose)
        .with_level(config.logging.log_level.clone())
        .with_format(format);

    if let Some(logfile) = params.get_string("logfile")? {
        builder = builder.with_file_output(logfile);
    }

    builder.init()?;
    Ok(())
}
