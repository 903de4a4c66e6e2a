use serde::{Deserialize, Serialize};
use shopdesk_core::{Catalog, Credentials, Currency, ServerProfile};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: ConfigValue<u16>,
    /// Local directory standing in for the remote file tree
    pub mirror_root: ConfigValue<PathBuf>,
    /// Login name for the remote hosts
    pub username: ConfigValue<Option<String>>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub servers: ConfigValue<Vec<ServerProfile>>,
    pub currencies: ConfigValue<Vec<Currency>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    port: Option<u16>,
    mirror_root: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    servers: Option<Vec<ServerProfile>>,
    currencies: Option<Vec<Currency>>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, std::env::vars())
    }

    /// Same as [`Config::load`] with an explicit environment.
    pub fn load_with_env<I>(config_path: Option<PathBuf>, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: BTreeMap<String, String> = vars.into_iter().collect();

        // Start with defaults
        let mut port = ConfigValue::new(DEFAULT_PORT, ConfigSource::Default);
        let mut mirror_root = ConfigValue::new(Self::default_mirror_root(), ConfigSource::Default);
        let mut username = ConfigValue::new(None, ConfigSource::Default);
        let mut password = None;
        let mut servers = ConfigValue::new(Vec::new(), ConfigSource::Default);
        let mut currencies = ConfigValue::new(Vec::new(), ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path
            .or_else(|| env.get("SHOPDESK_CONFIG").map(PathBuf::from))
            .unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(p) = file_config.port {
                port = ConfigValue::new(p, ConfigSource::File);
            }
            if let Some(root) = file_config.mirror_root {
                // Resolve relative paths against config file's directory
                let resolved = if root.is_relative() {
                    path.parent().map(|p| p.join(&root)).unwrap_or(root)
                } else {
                    root
                };
                mirror_root = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(user) = file_config.username {
                username = ConfigValue::new(Some(user), ConfigSource::File);
            }
            if file_config.password.is_some() {
                password = file_config.password;
            }
            if let Some(list) = file_config.servers {
                servers = ConfigValue::new(list, ConfigSource::File);
            }
            if let Some(list) = file_config.currencies {
                let list = list
                    .into_iter()
                    .map(|c| Currency::new(c.id, Some(c.name), c.economy))
                    .collect();
                currencies = ConfigValue::new(list, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Some(p) = env.get("SHOPDESK_PORT") {
            match p.parse() {
                Ok(p) => port = ConfigValue::new(p, ConfigSource::Environment),
                Err(_) => tracing::warn!("Ignoring invalid SHOPDESK_PORT: {}", p),
            }
        }
        if let Some(root) = env.get("SHOPDESK_MIRROR_ROOT") {
            mirror_root = ConfigValue::new(PathBuf::from(root), ConfigSource::Environment);
        }
        // SFTP_* names are accepted for existing deployments; SHOPDESK_* wins
        if let Some(user) = env_first(&env, &["SHOPDESK_USERNAME", "SFTP_USERNAME"]) {
            username = ConfigValue::new(Some(user.to_string()), ConfigSource::Environment);
        }
        if let Some(pass) = env_first(&env, &["SHOPDESK_PASSWORD", "SFTP_PASSWORD"]) {
            password = Some(pass.to_string());
        }

        let env_servers = servers_from_env(&env);
        if !env_servers.is_empty() {
            servers = ConfigValue::new(env_servers, ConfigSource::Environment);
        }
        let env_currencies = currencies_from_env(&env);
        if !env_currencies.is_empty() {
            currencies = ConfigValue::new(env_currencies, ConfigSource::Environment);
        }

        Ok(Self {
            port,
            mirror_root,
            username,
            password,
            servers,
            currencies,
            config_file,
        })
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.servers.value.clone(), self.currencies.value.clone())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.value.clone(),
            password: self.password.clone(),
        }
    }

    /// Default config directory (platform-specific), e.g. ~/.config/shopdesk/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shopdesk")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// Default mirror root, e.g. ~/.local/share/shopdesk/remote
    pub fn default_mirror_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shopdesk")
            .join("remote")
    }
}

/// Value of the first of `keys` that is set.
fn env_first<'a>(env: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| env.get(*k)).map(String::as_str)
}

/// Indices `n` for which `<prefix>_<n>_ID` is set, ascending.
fn indexed_groups(env: &BTreeMap<String, String>, prefix: &str) -> BTreeSet<u32> {
    env.keys()
        .filter_map(|k| {
            k.strip_prefix(prefix)?
                .strip_prefix('_')?
                .strip_suffix("_ID")?
                .parse()
                .ok()
        })
        .collect()
}

fn group_field<'a>(
    env: &'a BTreeMap<String, String>,
    prefix: &str,
    index: u32,
    field: &str,
) -> Option<&'a String> {
    env.get(&format!("{}_{}_{}", prefix, index, field))
        .filter(|v| !v.is_empty())
}

/// Servers from `SERVER_<n>_{ID,NAME,HOST,PORT,BASE_PATH}`.
///
/// Every field is required; incomplete groups are skipped.
pub fn servers_from_env(env: &BTreeMap<String, String>) -> Vec<ServerProfile> {
    let mut servers = Vec::new();
    for n in indexed_groups(env, "SERVER") {
        let field = |name: &str| group_field(env, "SERVER", n, name);
        let (Some(id), Some(name), Some(host), Some(port), Some(base_path)) = (
            field("ID"),
            field("NAME"),
            field("HOST"),
            field("PORT"),
            field("BASE_PATH"),
        ) else {
            tracing::warn!("Skipping incomplete server group SERVER_{}", n);
            continue;
        };
        let Ok(port) = port.parse::<u16>() else {
            tracing::warn!("Skipping server group SERVER_{}: bad port {}", n, port);
            continue;
        };
        servers.push(ServerProfile {
            id: id.clone(),
            name: name.clone(),
            host: host.clone(),
            port,
            base_path: base_path.clone(),
        });
    }
    servers
}

/// Currencies from `CURRENCY_<n>_{ID,NAME,ECONOMY}`. The name defaults to the id.
pub fn currencies_from_env(env: &BTreeMap<String, String>) -> Vec<Currency> {
    let mut currencies = Vec::new();
    for n in indexed_groups(env, "CURRENCY") {
        let field = |name: &str| group_field(env, "CURRENCY", n, name);
        let (Some(id), Some(economy)) = (field("ID"), field("ECONOMY")) else {
            tracing::warn!("Skipping incomplete currency group CURRENCY_{}", n);
            continue;
        };
        currencies.push(Currency::new(id.clone(), field("NAME").cloned(), economy.clone()));
    }
    currencies
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
