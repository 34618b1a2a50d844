//! Module argument loading.
//!
//! Ansible hands a module its arguments in a file whose path is the first
//! command-line argument. The file holds either JSON (the
//! `{"ANSIBLE_MODULE_ARGS": {...}}` wrapper, or a bare object) or old-style
//! shell-quoted `key=value` words. `key=value` overrides from the command
//! line are applied on top.

use crate::error::{Error, Result};
use crate::modules::ModuleParams;
use std::path::Path;

/// Wrapper key used by Ansible for JSON module arguments
const ANSIBLE_ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// Internal parameter that requests check mode
const CHECK_MODE_KEY: &str = "_ansible_check_mode";

/// Read and parse an arguments file
pub fn load_file(path: &Path) -> Result<ModuleParams> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::module_args(path, format!("failed to read file: {}", e)))?;
    parse(&content).map_err(|message| Error::module_args(path, message))
}

/// Parse arguments file content, JSON first, then `key=value` words
pub fn parse(content: &str) -> std::result::Result<ModuleParams, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(ModuleParams::new());
    }

    if trimmed.starts_with('{') {
        let value: serde_json::Value =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON: {}", e))?;
        let args = match value {
            serde_json::Value::Object(mut map) => match map.remove(ANSIBLE_ARGS_KEY) {
                Some(serde_json::Value::Object(args)) => args,
                Some(_) => return Err(format!("{} must be an object", ANSIBLE_ARGS_KEY)),
                None => map,
            },
            _ => return Err("arguments must be a JSON object".to_string()),
        };
        return Ok(args.into_iter().collect());
    }

    let words = shell_words::split(trimmed).map_err(|e| format!("invalid quoting: {}", e))?;
    let mut params = ModuleParams::new();
    for word in words {
        let (key, value) = split_pair(&word)?;
        params.insert(key, value);
    }
    Ok(params)
}

/// Apply `key=value` overrides
pub fn apply_overrides(params: &mut ModuleParams, overrides: &[String]) -> Result<()> {
    for pair in overrides {
        let (key, value) = split_pair(pair).map_err(Error::config)?;
        params.insert(key, value);
    }
    Ok(())
}

/// Drop Ansible's internal `_ansible_*` parameters, returning whether check
/// mode was requested
pub fn strip_internal(params: &mut ModuleParams) -> bool {
    let check_mode = matches!(
        params.get(CHECK_MODE_KEY),
        Some(serde_json::Value::Bool(true))
    ) || matches!(
        params.get(CHECK_MODE_KEY).and_then(|v| v.as_str()),
        Some("True" | "true" | "yes")
    );
    params.retain(|key, _| !key.starts_with("_ansible_"));
    check_mode
}

fn split_pair(pair: &str) -> std::result::Result<(String, serde_json::Value), String> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((
            key.trim().to_string(),
            serde_json::Value::String(value.to_string()),
        )),
        _ => Err(format!("expected key=value, got '{}'", pair)),
    }
}
