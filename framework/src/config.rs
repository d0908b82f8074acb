//! Environment-backed configuration.

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use config::ConfigError;

use crate::jobs::DEFAULT_QUEUE;
use crate::mail::Address;

/// Load any `Deserialize` type from environment variables.
pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }
}

/// Process-wide mail defaults, read from `MAIL_*` variables.
///
/// | Variable | Default |
/// |----------|---------|
/// | `MAIL_DEFAULT_MAILER` | `smtp` |
/// | `MAIL_DEFAULT_QUEUE` | `default` |
/// | `MAIL_DEFAULT_DISK` | `local` |
/// | `MAIL_FROM_ADDRESS` | unset |
/// | `MAIL_FROM_NAME` | unset |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mailer")]
    pub default_mailer: String,
    #[serde(default = "default_queue")]
    pub default_queue: String,
    #[serde(default = "default_disk")]
    pub default_disk: String,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
}

impl MailConfig {
    pub const PREFIX: &'static str = "MAIL";

    /// Read `.env` if present, then the `MAIL_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        <Self as EnvConfig>::from_env_with_prefix(Self::PREFIX)
    }

    /// Sender applied to messages that set none.
    pub fn always_from(&self) -> Option<Address> {
        let address = self.from_address.as_deref()?;
        Some(match &self.from_name {
            Some(name) => Address::with_name(address, name.as_str()),
            None => Address::new(address),
        })
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            default_mailer: default_mailer(),
            default_queue: default_queue(),
            default_disk: default_disk(),
            from_address: None,
            from_name: None,
        }
    }
}

fn default_mailer() -> String {
    "smtp".to_string()
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_disk() -> String {
    "local".to_string()
}
