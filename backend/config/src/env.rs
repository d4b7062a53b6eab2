//! Environment variable substitution for config values.
//!
//! String values may reference `${VAR_NAME}` (uppercase names only);
//! `$${VAR_NAME}` is kept as a literal `${VAR_NAME}`. A value that is
//! exactly one reference is re-read as a YAML scalar, so
//! `restrictedChannel: ${HERALD_CHANNEL}` yields a number.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\$?)\{([A-Z_][A-Z0-9_]*)\}").unwrap());

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute references using `env`. Unset or empty variables are errors.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    Ok(substitute(value, env, "")?)
}

fn substitute(
    value: &Value,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<Value, MissingEnvVarError> {
    match value {
        Value::String(s) => substitute_string(s, env, path),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (k, v) in map {
                let key = k.as_str().unwrap_or("?");
                let child = if path.is_empty() { key.to_string() } else { format!("{path}.{key}") };
                out.insert(k.clone(), substitute(v, env, &child)?);
            }
            Ok(Value::Mapping(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(
    s: &str,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<Value, MissingEnvVarError> {
    if !s.contains('$') {
        return Ok(Value::String(s.to_string()));
    }

    let mut missing = None;
    let replaced = REFERENCE.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        return Err(err);
    }

    let whole = REFERENCE.captures(s).filter(|c| c[0].len() == s.len() && c[1].is_empty());
    if whole.is_some() {
        if let Ok(scalar @ (Value::Number(_) | Value::Bool(_))) = serde_yaml::from_str::<Value>(&replaced) {
            return Ok(scalar);
        }
    }
    Ok(Value::String(replaced.into_owned()))
}

/// Every variable name referenced in `value`, sorted and de-duplicated.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.extend(
                REFERENCE.captures_iter(s).filter(|c| c[1].is_empty()).map(|c| c[2].to_string()),
            ),
            Value::Sequence(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Mapping(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }

    let mut vars = Vec::new();
    walk(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}
