use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("RAGCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let data_config = self.paths.data_dir.join("config.yml");
        if data_config.exists() {
            return data_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Merged configuration: YAML file first, process environment on top.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let file_config = load_yaml_file(&self.config_path())?;
        let overrides = env_overrides(|key| env::var(key).ok());
        let merged = deep_merge(&file_config, &overrides);
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let config = self.load_config()?;
        let mut settings = settings_from_value(config)?;
        if settings.app.database_path.is_none() {
            settings.app.database_path = Some(self.paths.db_path.clone());
        }
        if settings.server.static_dir.is_relative() {
            settings.server.static_dir = self.paths.project_root.join(&settings.server.static_dir);
        }
        Ok(settings)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: Value) -> Result<Settings, ApiError> {
    serde_json::from_value(config)
        .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|e| {
        ApiError::BadRequest(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ApiError::BadRequest(format!(
            "Config file {} must contain a mapping",
            path.display()
        ))),
    }
}

/// Maps well-known environment variables onto config paths.
fn env_overrides<F>(lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut overrides = Value::Object(Map::new());
    let read = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(key) = read("OPENAI_API_KEY") {
        ensure_object_path(&mut overrides, &["openai", "api_key"], Value::String(key));
    }
    if let Some(url) = read("OPENAI_BASE_URL") {
        ensure_object_path(&mut overrides, &["openai", "base_url"], Value::String(url));
    }
    if let Some(model) = read("OPENAI_MODEL") {
        ensure_object_path(&mut overrides, &["openai", "default_model"], Value::String(model));
    }
    if let Some(model) = read("EMBEDDING_MODEL") {
        ensure_object_path(
            &mut overrides,
            &["openai", "embedding_model"],
            Value::String(model),
        );
    }
    if let Some(port) = read("PORT") {
        match port.parse::<u64>() {
            Ok(port) => ensure_object_path(&mut overrides, &["server", "port"], Value::from(port)),
            Err(_) => tracing::warn!("Ignoring non-numeric PORT value: {}", port),
        }
    }
    if let Some(path) = read("DATABASE_PATH") {
        ensure_object_path(&mut overrides, &["app", "database_path"], Value::String(path));
    }

    let ci = read("CI").map(|v| is_truthy(&v)).unwrap_or(false);
    let environment = match read("APP_ENV").map(|v| v.to_lowercase()).as_deref() {
        Some("production") | Some("prod") => Some("production"),
        Some("ci") => Some("ci"),
        Some("development") | Some("dev") if !ci => Some("development"),
        _ if ci => Some("ci"),
        _ => None,
    };
    if let Some(environment) = environment {
        ensure_object_path(
            &mut overrides,
            &["app", "environment"],
            Value::String(environment.to_string()),
        );
    }

    overrides
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Environment;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "server": { "host": "0.0.0.0", "port": 8080 },
            "openai": { "default_model": "gpt-4o" }
        });
        let override_value = json!({
            "server": { "port": 9000 },
            "openai": { "api_key": "sk-test" }
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "server": { "host": "0.0.0.0", "port": 9000 },
                "openai": { "default_model": "gpt-4o", "api_key": "sk-test" }
            })
        );
    }

    #[test]
    fn env_overrides_map_known_variables() {
        let overrides = env_overrides(lookup_from(&[
            ("OPENAI_API_KEY", "sk-live"),
            ("PORT", "8181"),
            ("OPENAI_MODEL", "gpt-4.1-mini"),
            ("DATABASE_PATH", "/tmp/docs.db"),
        ]));

        assert_eq!(overrides["openai"]["api_key"], "sk-live");
        assert_eq!(overrides["openai"]["default_model"], "gpt-4.1-mini");
        assert_eq!(overrides["server"]["port"], 8181);
        assert_eq!(overrides["app"]["database_path"], "/tmp/docs.db");
        assert!(overrides["app"].get("environment").is_none());
    }

    #[test]
    fn env_overrides_ignore_blank_and_malformed_values() {
        let overrides = env_overrides(lookup_from(&[("OPENAI_API_KEY", "  "), ("PORT", "abc")]));
        assert_eq!(overrides, json!({}));
    }

    #[test]
    fn ci_flag_selects_ci_environment_unless_production() {
        let ci = env_overrides(lookup_from(&[("CI", "true")]));
        assert_eq!(ci["app"]["environment"], "ci");

        let prod = env_overrides(lookup_from(&[("CI", "1"), ("APP_ENV", "production")]));
        assert_eq!(prod["app"]["environment"], "production");

        let dev = env_overrides(lookup_from(&[("APP_ENV", "dev")]));
        assert_eq!(dev["app"]["environment"], "development");
    }

    #[test]
    fn settings_fill_defaults_for_missing_sections() {
        let settings = settings_from_value(json!({ "retrieval": { "top_k": 5 } })).unwrap();

        assert_eq!(settings.retrieval.top_k, 5);
        assert!((settings.retrieval.min_score - 0.65).abs() < f32::EPSILON);
        assert_eq!(settings.retrieval.preview_chars, 800);
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.openai.default_model, "gpt-4o-mini");
        assert_eq!(settings.app.environment, Environment::Development);
        assert!(!settings.has_credential());
    }

    #[test]
    fn load_settings_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_data_dir(
            dir.path().to_path_buf(),
            dir.path().join("data"),
        ));
        fs::write(
            dir.path().join("config.yml"),
            "completion:\n  max_tokens: 256\nserver:\n  static_dir: web\n",
        )
        .unwrap();

        let settings = ConfigService::new(paths.clone()).load_settings().unwrap();

        assert_eq!(settings.completion.max_tokens, 256);
        assert_eq!(settings.server.static_dir, dir.path().join("web"));
        assert_eq!(settings.app.database_path, Some(paths.db_path.clone()));
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "openai": { "api_key": "sk-secret", "default_model": "gpt-4o-mini" },
            "completion": { "max_tokens": 42 }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "openai": { "api_key": "****", "default_model": "gpt-4o-mini" },
                "completion": { "max_tokens": 42 }
            })
        );
    }
}
