use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::tenant::{TenantApplication, TenantId};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub tenants: Vec<TenantConfig>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Request authentication settings.
///
/// `failed_ip_limit` failed attempts are tolerated per client within
/// `failed_ip_window_secs` before further requests are rejected outright.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub enabled: bool,
    pub replay_window_secs: u64,
    pub failed_ip_limit: u32,
    pub failed_ip_window_secs: u64,
}

/// A tenant application declared in the config file, synced into the
/// repository at startup.
#[derive(Clone, Debug)]
pub struct TenantConfig {
    pub id: String,
    pub label: String,
    pub secret: SecretString,
    pub active: bool,
}

impl TenantConfig {
    pub fn to_application(&self) -> TenantApplication {
        TenantApplication {
            id: TenantId(self.id.clone()),
            label: self.label.clone(),
            secret: self.secret.clone(),
            active: self.active,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub auth_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://slashgate.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            auth: AuthConfig {
                enabled: true,
                replay_window_secs: 300,
                failed_ip_limit: 50,
                failed_ip_window_secs: 3600,
            },
            tenants: Vec::new(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("slashgate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(enabled) = auth.enabled {
                self.auth.enabled = enabled;
            }
            if let Some(replay_window_secs) = auth.replay_window_secs {
                self.auth.replay_window_secs = replay_window_secs;
            }
            if let Some(failed_ip_limit) = auth.failed_ip_limit {
                self.auth.failed_ip_limit = failed_ip_limit;
            }
            if let Some(failed_ip_window_secs) = auth.failed_ip_window_secs {
                self.auth.failed_ip_window_secs = failed_ip_window_secs;
            }
        }

        if let Some(tenants) = patch.tenants {
            self.tenants = tenants
                .into_iter()
                .map(|tenant| TenantConfig {
                    id: tenant.id,
                    label: tenant.label,
                    secret: secret_value(tenant.secret),
                    active: tenant.active.unwrap_or(true),
                })
                .collect();
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SLASHGATE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SLASHGATE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SLASHGATE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SLASHGATE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SLASHGATE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLASHGATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SLASHGATE_SERVER_PORT") {
            self.server.port = parse_u16("SLASHGATE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SLASHGATE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SLASHGATE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SLASHGATE_AUTH_ENABLED") {
            self.auth.enabled = parse_bool("SLASHGATE_AUTH_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SLASHGATE_AUTH_REPLAY_WINDOW_SECS") {
            self.auth.replay_window_secs =
                parse_u64("SLASHGATE_AUTH_REPLAY_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("SLASHGATE_AUTH_FAILED_IP_LIMIT") {
            self.auth.failed_ip_limit = parse_u32("SLASHGATE_AUTH_FAILED_IP_LIMIT", &value)?;
        }
        if let Some(value) = read_env("SLASHGATE_AUTH_FAILED_IP_WINDOW_SECS") {
            self.auth.failed_ip_window_secs =
                parse_u64("SLASHGATE_AUTH_FAILED_IP_WINDOW_SECS", &value)?;
        }

        let log_level =
            read_env("SLASHGATE_LOGGING_LEVEL").or_else(|| read_env("SLASHGATE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SLASHGATE_LOGGING_FORMAT").or_else(|| read_env("SLASHGATE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.auth_enabled {
            self.auth.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_auth(&self.auth)?;
        validate_tenants(&self.tenants)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("slashgate.toml"), PathBuf::from("config/slashgate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if auth.replay_window_secs == 0 {
        return Err(ConfigError::Validation(
            "auth.replay_window_secs must be greater than zero".to_string(),
        ));
    }

    if auth.failed_ip_limit == 0 {
        return Err(ConfigError::Validation(
            "auth.failed_ip_limit must be greater than zero".to_string(),
        ));
    }

    if auth.failed_ip_window_secs == 0 {
        return Err(ConfigError::Validation(
            "auth.failed_ip_window_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_tenants(tenants: &[TenantConfig]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for tenant in tenants {
        tenant.to_application().validate().map_err(|error| {
            ConfigError::Validation(format!("tenants entry `{}`: {error}", tenant.id))
        })?;
        if !seen.insert(tenant.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "tenants entry `{}` is declared more than once",
                tenant.id
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    tenants: Option<Vec<TenantPatch>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    enabled: Option<bool>,
    replay_window_secs: Option<u64>,
    failed_ip_limit: Option<u32>,
    failed_ip_window_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TenantPatch {
    id: String,
    label: String,
    secret: String,
    active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
