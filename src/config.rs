//! Process configuration: environment variable defaults, the Robusta token
//! envelope, and `{{ env.X }}` templating.
//!
//! Grounded on `enforcer/env_vars.py`, `enforcer/params_utils.py`, and
//! `enforcer/dal/{robusta_config,supabase_dal}.py`.

use std::collections::BTreeMap;
use std::env;

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_int_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_float_or(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct EnvVars {
    pub robusta_config_path: String,
    pub robusta_account_id: String,
    pub discovery_max_batches: u64,
    pub discovery_batch_size: u64,
    pub update_threshold: f64,
    pub scan_reload_interval: u64,
    pub krr_mutation_mode_default: String,
    pub replica_set_cleanup_interval: u64,
    pub replica_set_deletion_wait: u64,
    pub scan_age_hours_threshold: u64,
    pub enforcer_ssl_key_file: String,
    pub enforcer_ssl_cert_file: String,
}

impl Default for EnvVars {
    fn default() -> Self {
        EnvVars {
            robusta_config_path: env_or(
                "ROBUSTA_CONFIG_PATH",
                "/etc/robusta/config/active_playbooks.yaml",
            ),
            robusta_account_id: env_or("ROBUSTA_ACCOUNT_ID", ""),
            discovery_max_batches: env_int_or("DISCOVERY_MAX_BATCHES", 50),
            discovery_batch_size: env_int_or("DISCOVERY_BATCH_SIZE", 30_000),
            update_threshold: env_float_or("UPDATE_THRESHOLD", 20.0),
            scan_reload_interval: env_int_or("SCAN_RELOAD_INTERVAL", 3600),
            krr_mutation_mode_default: env_or("KRR_MUTATION_MODE_DEFAULT", "enforce"),
            replica_set_cleanup_interval: env_int_or("REPLICA_SET_CLEANUP_INTERVAL", 600),
            replica_set_deletion_wait: env_int_or("REPLICA_SET_DELETION_WAIT", 600),
            scan_age_hours_threshold: env_int_or("SCAN_AGE_HOURS_THRESHOLD", 360),
            enforcer_ssl_key_file: env_or("ENFORCER_SSL_KEY_FILE", ""),
            enforcer_ssl_cert_file: env_or("ENFORCER_SSL_CERT_FILE", ""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustaToken {
    pub store_url: String,
    pub api_key: String,
    pub account_id: String,
    pub email: String,
    pub password: String,
}

/// Decodes the base64-JSON token envelope described in spec §6.
pub fn decode_token_envelope(raw: &str) -> Result<RobustaToken, ConfigError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| ConfigError::InvalidTokenEnvelope(e.to_string()))?;
    serde_json::from_slice(&decoded).map_err(|e| ConfigError::InvalidTokenEnvelope(e.to_string()))
}

/// Finds a `{{ env.VAR }}` placeholder in `value` and returns the env var's
/// value, or an error if the placeholder is present but the variable is
/// unset. Returns `Ok(None)` when there is no placeholder at all.
pub fn get_env_replacement(value: &str) -> Result<Option<String>, ConfigError> {
    let re = Regex::new(r"\{\{\s*env\.([^}\s]+)\s*\}\}").expect("static regex is valid");
    let Some(captures) = re.captures(value) else {
        return Ok(None);
    };
    let var_name = captures.get(1).unwrap().as_str().trim().to_string();
    match env::var(&var_name) {
        Ok(v) if !v.is_empty() => Ok(Some(v)),
        _ => Err(ConfigError::MissingEnvVar(var_name)),
    }
}

/// Recursively substitutes `{{ env.X }}` placeholders throughout a string
/// map, raising `UnresolvedPlaceholder` if any `{{` survives substitution.
pub fn replace_env_vars_values(
    values: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut out = BTreeMap::new();
    for (key, value) in values {
        let resolved = match get_env_replacement(value)? {
            Some(replacement) => replacement,
            None => value.clone(),
        };
        if resolved.contains("{{") {
            return Err(ConfigError::UnresolvedPlaceholder(resolved));
        }
        out.insert(key.clone(), resolved);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_token_envelope() {
        let token = RobustaToken {
            store_url: "https://store.example".into(),
            api_key: "key".into(),
            account_id: "acct".into(),
            email: "a@b.com".into(),
            password: "pw".into(),
        };
        let json = serde_json::to_vec(&token).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        let decoded = decode_token_envelope(&encoded).unwrap();
        assert_eq!(decoded.store_url, "https://store.example");
    }

    #[test]
    fn rejects_garbage_envelope() {
        assert!(decode_token_envelope("not-base64!!!").is_err());
    }

    #[test]
    fn env_replacement_missing_var_errors() {
        unsafe { env::remove_var("KRR_TEST_MISSING_VAR") };
        let result = get_env_replacement("{{ env.KRR_TEST_MISSING_VAR }}");
        assert!(result.is_err());
    }

    #[test]
    fn env_replacement_present_var_resolves() {
        unsafe { env::set_var("KRR_TEST_PRESENT_VAR", "hello") };
        let result = get_env_replacement("{{ env.KRR_TEST_PRESENT_VAR }}").unwrap();
        assert_eq!(result, Some("hello".to_string()));
        unsafe { env::remove_var("KRR_TEST_PRESENT_VAR") };
    }

    #[test]
    fn no_placeholder_returns_none() {
        assert_eq!(get_env_replacement("plain-value").unwrap(), None);
    }

    #[test]
    fn residual_placeholder_after_substitution_errors() {
        let mut values = BTreeMap::new();
        values.insert("token".to_string(), "{{ not.a.valid.pattern }}".to_string());
        let result = replace_env_vars_values(&values);
        assert!(result.is_err());
    }
}
