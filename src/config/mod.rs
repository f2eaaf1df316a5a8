//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. Command line flags are applied on top by the
//! binary. [`Config::resolve`] validates everything once at startup.
//!
//! | Variable         | Meaning                                   | Default          |
//! |------------------|-------------------------------------------|------------------|
//! | `EMAILS`         | comma-separated report recipients         | `root@localhost` |
//! | `LOG_LEVEL`      | `TRACE`, `DEBUG`, `INFO`, `WARN`, ...     | `INFO`           |
//! | `CLEAN`          | delete intermediate files after the run   | `true`           |
//! | `MAIL_TRANSPORT` | `sendmail` or `smtp`                      | see below        |
//! | `SMTP_HOST`      | SMTP relay; selects `smtp` when set       |                  |
//! | `SMTP_PORT`      | SMTP port                                 | `587`            |
//! | `SMTP_USER`      | SMTP user name                            |                  |
//! | `SMTP_PASSWORD`  | SMTP password                             |                  |
//! | `SMTP_FROM`      | sender address                            | `surveycheck@localhost` |

use lettre::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::SurveyPointQuery;
use crate::logging::{InvalidLogLevel, LogLevel};
use crate::validate::ComparisonMode;

pub const DEFAULT_RECIPIENT: &str = "root@localhost";
pub const DEFAULT_FROM_ADDRESS: &str = "surveycheck@localhost";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SENDMAIL_COMMAND: &str = "sendmail";
const DEFAULT_SUBJECT_PREFIX: &str = "[surveycheck]";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid recipient address {value:?}: {source}")]
    InvalidRecipient {
        value: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("invalid sender address {value:?}: {source}")]
    InvalidSender {
        value: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("no report recipients configured")]
    NoRecipients,
    #[error(transparent)]
    LogLevel(#[from] InvalidLogLevel),
    #[error("invalid boolean for {name}: {value:?}")]
    InvalidBool { name: &'static str, value: String },
    #[error("invalid SMTP port {0:?}")]
    InvalidPort(String),
    #[error("unknown mail transport {0:?} (expected sendmail or smtp)")]
    InvalidTransport(String),
}

fn default_overpass_urls() -> Vec<String> {
    vec![
        "https://overpass-api.de/api/interpreter".to_string(),
        "https://overpass.private.coffee/api/interpreter".to_string(),
        "https://maps.mail.ru/osm/tools/overpass/api/interpreter".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverpassConfig {
    #[serde(default = "default_overpass_urls")]
    pub urls: Vec<String>,
    /// HTTP client timeout, slightly above the query's server-side timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries per mirror after the first attempt, on 429 or 504 only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            urls: default_overpass_urls(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Sendmail,
    Smtp,
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sendmail" => Ok(TransportKind::Sendmail),
            "smtp" => Ok(TransportKind::Smtp),
            _ => Err(ConfigError::InvalidTransport(s.to_string())),
        }
    }
}

/// `[mail]` section of the config file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileMailConfig {
    #[serde(default)]
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject_prefix: Option<String>,
    #[serde(default)]
    pub sendmail_command: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub smtp_starttls: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub clean: Option<bool>,
    #[serde(default)]
    pub comparison: Option<ComparisonMode>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub admin_level: Option<u8>,
    /// Parent directory for the per-run work directory
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub overpass: Option<OverpassConfig>,
    #[serde(default)]
    pub mail: Option<FileMailConfig>,
}

impl FileConfig {
    /// Load an explicitly requested config file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the first config file found in the usual locations
    pub fn load() -> Result<Option<Self>, ConfigError> {
        for path in get_config_paths() {
            if path.exists() {
                return Self::from_path(&path).map(Some);
            }
        }
        Ok(None)
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("surveycheck.toml"),
        PathBuf::from(".surveycheck.toml"),
    ];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("surveycheck").join("config.toml"));
        paths.push(config_dir.join("surveycheck.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".surveycheck.toml"));
    }

    paths
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailTransport {
    /// Pipe the message to a local sendmail-compatible command
    Sendmail { command: String },
    Smtp {
        host: Option<String>,
        port: u16,
        user: Option<String>,
        password: Option<String>,
        starttls: bool,
    },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from: Address,
    pub subject_prefix: String,
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub recipients: Vec<Address>,
    pub log_level: LogLevel,
    /// Delete intermediate files once the run is over
    pub clean: bool,
    /// Where the work directory is created; system temp dir when unset
    pub work_root: Option<PathBuf>,
    pub comparison: ComparisonMode,
    pub query: SurveyPointQuery,
    pub overpass: OverpassConfig,
    pub mail: MailConfig,
}

impl Config {
    /// Merge the file config with environment variables looked up via `env`
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let recipients = match env("EMAILS") {
            Some(list) => parse_recipients(list.split(','))?,
            None => match file.recipients {
                Some(list) => parse_recipients(list.iter().map(String::as_str))?,
                None => parse_recipients([DEFAULT_RECIPIENT])?,
            },
        };

        let log_level = match env("LOG_LEVEL") {
            Some(level) => level.parse()?,
            None => file.log_level.unwrap_or_default(),
        };

        let clean = match env("CLEAN") {
            Some(value) => parse_bool("CLEAN", &value)?,
            None => file.clean.unwrap_or(true),
        };

        let mut query = SurveyPointQuery::default();
        if let Some(area) = file.area {
            query.area = area;
        }
        if let Some(level) = file.admin_level {
            query.admin_level = level;
        }

        let overpass = file.overpass.unwrap_or_default();
        // Leave the HTTP client some slack over the server-side timeout
        query.timeout_secs = overpass.timeout_secs.saturating_sub(20).max(1);

        let mail = resolve_mail(file.mail.unwrap_or_default(), &env)?;

        Ok(Self {
            recipients,
            log_level,
            clean,
            work_root: file.work_dir,
            comparison: file.comparison.unwrap_or_default(),
            query,
            overpass,
            mail,
        })
    }

    /// Resolve using the process environment
    pub fn from_env(file: FileConfig) -> Result<Self, ConfigError> {
        Self::resolve(file, |name| std::env::var(name).ok())
    }
}

fn resolve_mail<F>(file: FileMailConfig, env: &F) -> Result<MailConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = env("SMTP_HOST").or(file.smtp_host);

    let kind = match env("MAIL_TRANSPORT") {
        Some(value) => value.parse()?,
        None => file.transport.unwrap_or(if host.is_some() {
            TransportKind::Smtp
        } else {
            TransportKind::Sendmail
        }),
    };

    let transport = match kind {
        TransportKind::Sendmail => MailTransport::Sendmail {
            command: file
                .sendmail_command
                .unwrap_or_else(|| DEFAULT_SENDMAIL_COMMAND.to_string()),
        },
        TransportKind::Smtp => MailTransport::Smtp {
            host,
            port: match env("SMTP_PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(port.clone()))?,
                None => file.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            },
            user: env("SMTP_USER").or(file.smtp_user),
            password: env("SMTP_PASSWORD").or(file.smtp_password),
            starttls: file.smtp_starttls.unwrap_or(true),
        },
    };

    let from = env("SMTP_FROM")
        .or(file.from)
        .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string());
    let from = from
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidSender {
            value: from.clone(),
            source,
        })?;

    Ok(MailConfig {
        transport,
        from,
        subject_prefix: file
            .subject_prefix
            .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.to_string()),
    })
}

fn parse_recipients<'a, I>(values: I) -> Result<Vec<Address>, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let recipients = values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse().map_err(|source| ConfigError::InvalidRecipient {
                value: v.to_string(),
                source,
            })
        })
        .collect::<Result<Vec<Address>, _>>()?;

    if recipients.is_empty() {
        return Err(ConfigError::NoRecipients);
    }
    Ok(recipients)
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}
