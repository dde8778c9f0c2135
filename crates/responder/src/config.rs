use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ansible: AnsibleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsibleConfig {
    /// Program invoked for every recovery run.
    pub binary: PathBuf,
    pub playbook_dir: PathBuf,
    pub inventory: PathBuf,
    /// Pass `-v` to the playbook run.
    pub verbose: bool,
    pub timeout_secs: u64,
}

impl AnsibleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ansible-playbook"),
            playbook_dir: PathBuf::from("/app/ansible/playbooks"),
            inventory: PathBuf::from("/app/ansible/inventory.ini"),
            verbose: true,
            timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for `webhook.log`; console only when unset.
    pub dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AnsibleConfig::default();

        let timeout_secs = match lookup("EXECUTION_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => defaults.timeout_secs,
        };

        Ok(Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            },
            ansible: AnsibleConfig {
                binary: lookup("ANSIBLE_PLAYBOOK_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.binary),
                playbook_dir: lookup("ANSIBLE_PLAYBOOK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.playbook_dir),
                inventory: lookup("ANSIBLE_INVENTORY")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.inventory),
                verbose: lookup("ANSIBLE_VERBOSE")
                    .map(|v| parse_bool(&v))
                    .unwrap_or(defaults.verbose),
                timeout_secs,
            },
            logging: LoggingConfig {
                dir: lookup("LOG_DIR")
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            },
        })
    }
}

pub(crate) fn parse_timeout(raw: &str) -> crate::Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(crate::Error::Config(
            "EXECUTION_TIMEOUT_SECS must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(secs),
        Err(e) => Err(crate::Error::Config(format!(
            "EXECUTION_TIMEOUT_SECS is not a valid number of seconds ({raw:?}): {e}"
        ))),
    }
}

fn parse_bool(raw: &str) -> bool {
    !matches!(
        raw.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            ansible: AnsibleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
