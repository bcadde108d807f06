use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "mailtally.conf";
pub const ENV_PREFIX: &str = "MAILTALLY_";
const DEFAULT_SECTION: &str = "DEFAULT";
const DEFAULT_MAIL_FOLDER: &str = "Inbox";
const AUTHORITY_BASE: &str = "https://login.microsoftonline.com";

/// Flat upper-cased key/value pairs read from the `[DEFAULT]` section.
pub type Settings = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config line {line}: expected KEY=VALUE")]
    Malformed { line: usize },
    #[error("missing required config key {0}")]
    MissingKey(&'static str),
}

/// Parse an INI-style source. Only the `DEFAULT` section (and anything before
/// the first header) is kept.
pub fn parse_settings(raw: &str) -> Result<Settings, ConfigError> {
    let mut settings = Settings::new();
    let mut in_default = true;

    for (index, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if let Some(section) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            in_default = section.trim().eq_ignore_ascii_case(DEFAULT_SECTION);
            continue;
        }

        let Some(split_at) = trimmed.find(['=', ':']) else {
            return Err(ConfigError::Malformed { line: index + 1 });
        };
        if !in_default {
            continue;
        }

        let key = trimmed[..split_at].trim().to_ascii_uppercase();
        if key.is_empty() {
            return Err(ConfigError::Malformed { line: index + 1 });
        }
        let value = trimmed[split_at + 1..].trim().to_string();
        settings.insert(key, value);
    }

    Ok(settings)
}

/// Immutable run configuration, passed explicitly to every component.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub resource: String,
    pub api_version: String,
    pub target_user: String,
    pub mail_folder: String,
    pub token_url: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("resource", &self.resource)
            .field("api_version", &self.api_version)
            .field("target_user", &self.target_user)
            .field("mail_folder", &self.mail_folder)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = parse_settings(&raw)?;
        apply_env_overrides(&mut settings, std::env::vars());
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: required(settings, "CLIENT_ID")?,
            client_secret: required(settings, "CLIENT_SECRET")?,
            tenant_id: required(settings, "TENANT_ID")?,
            resource: required(settings, "RESOURCE")?
                .trim_end_matches('/')
                .to_string(),
            api_version: required(settings, "API_VERSION")?
                .trim_matches('/')
                .to_string(),
            target_user: required(settings, "TARGET_USER")?,
            mail_folder: optional(settings, "MAIL_FOLDER")
                .unwrap_or_else(|| DEFAULT_MAIL_FOLDER.to_string()),
            token_url: optional(settings, "TOKEN_URL"),
        })
    }

    /// OAuth scope for the client-credentials grant.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource)
    }

    pub fn token_url(&self) -> String {
        self.token_url.clone().unwrap_or_else(|| {
            format!("{AUTHORITY_BASE}/{}/oauth2/v2.0/token", self.tenant_id)
        })
    }

    pub fn messages_endpoint(&self) -> String {
        format!(
            "{}/{}/users/{}/mailFolders/{}/messages",
            self.resource, self.api_version, self.target_user, self.mail_folder
        )
    }
}

/// `./mailtally.conf` when present, otherwise the per-user config directory.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return local;
    }

    dirs::config_dir()
        .map(|dir| dir.join("mailtally").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

/// `MAILTALLY_<KEY>` variables replace file values for `<KEY>`.
fn apply_env_overrides<I>(settings: &mut Settings, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        settings.insert(name.to_ascii_uppercase(), value.to_string());
    }
}

fn required(settings: &Settings, key: &'static str) -> Result<String, ConfigError> {
    optional(settings, key).ok_or(ConfigError::MissingKey(key))
}

fn optional(settings: &Settings, key: &str) -> Option<String> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
