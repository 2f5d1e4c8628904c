use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use slashgate_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{serialize_payload, CommandResult};

const REDACTED: &str = "<redacted>";

#[derive(Debug, Serialize)]
struct ConfigField {
    key: String,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    source_precedence: &'static str,
    fields: Vec<ConfigField>,
}

struct Sources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl Sources {
    fn detect() -> Self {
        let path = detect_config_path();
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn field(&self, key: &str, value: impl Into<String>, env_keys: &[&str]) -> ConfigField {
        ConfigField { key: key.to_string(), value: value.into(), source: self.source(key, env_keys) }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                return self.file_source();
            }
        }

        "default".to_string()
    }

    /// Tenants only come from the config file, as an array of tables.
    fn tenant_field(&self, prefix: &str, name: &str, value: impl Into<String>) -> ConfigField {
        ConfigField {
            key: format!("{prefix}.{name}"),
            value: value.into(),
            source: self.file_source(),
        }
    }

    fn file_source(&self) -> String {
        let file_path = self
            .path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        format!("file ({file_path})")
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let report = ConfigReport {
        command: "config",
        status: "ok",
        source_precedence: "overrides > env > file > default",
        fields: effective_fields(&config, &Sources::detect()),
    };
    CommandResult { exit_code: 0, output: serialize_payload(&report) }
}

fn effective_fields(config: &AppConfig, sources: &Sources) -> Vec<ConfigField> {
    let mut fields = vec![
        sources.field("database.url", &config.database.url, &["SLASHGATE_DATABASE_URL"]),
        sources.field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["SLASHGATE_DATABASE_MAX_CONNECTIONS"],
        ),
        sources.field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["SLASHGATE_DATABASE_TIMEOUT_SECS"],
        ),
        sources.field(
            "server.bind_address",
            &config.server.bind_address,
            &["SLASHGATE_SERVER_BIND_ADDRESS"],
        ),
        sources.field("server.port", config.server.port.to_string(), &["SLASHGATE_SERVER_PORT"]),
        sources.field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["SLASHGATE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        sources.field("auth.enabled", config.auth.enabled.to_string(), &["SLASHGATE_AUTH_ENABLED"]),
        sources.field(
            "auth.replay_window_secs",
            config.auth.replay_window_secs.to_string(),
            &["SLASHGATE_AUTH_REPLAY_WINDOW_SECS"],
        ),
        sources.field(
            "auth.failed_ip_limit",
            config.auth.failed_ip_limit.to_string(),
            &["SLASHGATE_AUTH_FAILED_IP_LIMIT"],
        ),
        sources.field(
            "auth.failed_ip_window_secs",
            config.auth.failed_ip_window_secs.to_string(),
            &["SLASHGATE_AUTH_FAILED_IP_WINDOW_SECS"],
        ),
        sources.field(
            "logging.level",
            &config.logging.level,
            &["SLASHGATE_LOGGING_LEVEL", "SLASHGATE_LOG_LEVEL"],
        ),
        sources.field(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["SLASHGATE_LOGGING_FORMAT", "SLASHGATE_LOG_FORMAT"],
        ),
    ];

    for tenant in &config.tenants {
        let prefix = format!("tenants.{}", tenant.id);
        fields.push(sources.tenant_field(&prefix, "label", &tenant.label));
        fields.push(sources.tenant_field(&prefix, "secret", REDACTED));
        fields.push(sources.tenant_field(&prefix, "active", tenant.active.to_string()));
    }

    fields
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("slashgate.toml"), PathBuf::from("config/slashgate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use slashgate_core::config::{AppConfig, TenantConfig};

    use super::{contains_path, effective_fields, Sources};

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: toml::Value = "[database]\nurl = \"sqlite::memory:\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "database.url"));
        assert!(!contains_path(&doc, "database.max_connections"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn file_values_are_attributed_to_the_file() {
        let sources = Sources {
            path: Some("slashgate.toml".into()),
            doc: Some("[auth]\nfailed_ip_limit = 9\n".parse().expect("toml")),
        };

        let field = sources.field("auth.failed_ip_limit", "9", &["SLASHGATE_TEST_UNSET_KEY"]);
        let fallback = sources.field("auth.enabled", "true", &["SLASHGATE_TEST_UNSET_KEY"]);

        assert_eq!(field.source, "file (slashgate.toml)");
        assert_eq!(fallback.source, "default");
    }

    #[test]
    fn tenant_secrets_are_redacted() {
        let mut config = AppConfig::default();
        config.tenants.push(TenantConfig {
            id: "workspace".to_string(),
            label: "Workspace".to_string(),
            secret: SecretString::from("super-secret".to_string()),
            active: true,
        });

        let fields = effective_fields(&config, &Sources { path: None, doc: None });
        let secret = fields
            .iter()
            .find(|field| field.key == "tenants.workspace.secret")
            .expect("secret field");

        assert_eq!(secret.value, "<redacted>");
        assert!(fields.iter().all(|field| !field.value.contains("super-secret")));
    }
}
