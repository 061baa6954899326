use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::RwLock;
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::Capability,
    error::{GatewayError, Result},
    world::EventKind,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WORLD_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_NOTIFICATION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_WORKERS: u32 = 5;

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_world_timeout_ms() -> u64 {
    DEFAULT_WORLD_TIMEOUT_MS
}

fn default_callback_timeout_ms() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_MS
}

fn default_notification_timeout_ms() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_MS
}

fn default_workers() -> u32 {
    DEFAULT_WORKERS
}

/// A credentialed tenant of the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub password: String,
    pub uuid: Uuid,
    #[serde(
        default,
        serialize_with = "serialize_capabilities",
        deserialize_with = "deserialize_capabilities"
    )]
    pub capabilities: Capability,
    #[serde(
        default,
        serialize_with = "serialize_notifications",
        deserialize_with = "deserialize_notifications"
    )]
    pub notifications: EventKind,
    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default)]
    pub chatlog: Option<PathBuf>,
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_world_timeout_ms")]
    pub world_timeout_ms: u64,
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,
    #[serde(default = "default_notification_timeout_ms")]
    pub notification_timeout_ms: u64,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            world_timeout_ms: default_world_timeout_ms(),
            callback_timeout_ms: default_callback_timeout_ms(),
            notification_timeout_ms: default_notification_timeout_ms(),
            log_dir: None,
            groups: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            GatewayError::Config(format!("unable to read {}: {err}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(GatewayError::Config("group with empty name".to_string()));
            }
            if group.password.is_empty() {
                return Err(GatewayError::Config(format!(
                    "group '{}' has an empty password",
                    group.name
                )));
            }
        }
        let mut names: Vec<&str> = self.groups.iter().map(|g| g.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(GatewayError::Config(format!(
                "duplicate group '{}'",
                pair[0]
            )));
        }
        Ok(())
    }

    /// Case-sensitive group lookup.
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn world_timeout(&self) -> Duration {
        Duration::from_millis(self.world_timeout_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }
}

/// Swappable handle to the immutable configuration snapshot. Every
/// operation clones one `Arc` up front and reads that snapshot for its
/// entire execution; `swap` replaces the set wholesale.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.inner.read())
    }

    pub fn swap(&self, config: Config) {
        *self.inner.write() = Arc::new(config);
    }
}

fn serialize_capabilities<S: Serializer>(
    value: &Capability,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    value.names().serialize(serializer)
}

fn deserialize_capabilities<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Capability, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    Capability::from_names(&names)
        .map_err(|name| DeError::custom(format!("unknown capability '{name}'")))
}

fn serialize_notifications<S: Serializer>(
    value: &EventKind,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    value.names().serialize(serializer)
}

fn deserialize_notifications<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<EventKind, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    EventKind::from_names(&names)
        .map_err(|name| DeError::custom(format!("unknown notification '{name}'")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn group_named(name: &str, password: &str) -> GroupConfig {
        GroupConfig {
            name: name.to_string(),
            password: password.to_string(),
            uuid: Uuid::new_v4(),
            capabilities: Capability::empty(),
            notifications: EventKind::empty(),
            workers: DEFAULT_WORKERS,
            chatlog: None,
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
bind_addr = "127.0.0.1"
port = 9090

[[group]]
name = "Tester"
password = "secret"
uuid = "7c46dfeb-2b11-4cbe-b595-3e4472f52ba9"
capabilities = ["economy", "database"]
notifications = ["groupchat", "balance"]
workers = 2
database = "tester.db"
"#;

    #[test]
    fn parses_groups_and_masks() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.world_timeout_ms, DEFAULT_WORLD_TIMEOUT_MS);
        let group = config.group("Tester").unwrap();
        assert_eq!(
            group.capabilities,
            Capability::ECONOMY | Capability::DATABASE
        );
        assert_eq!(
            group.notifications,
            EventKind::GROUP_CHAT | EventKind::BALANCE
        );
        assert_eq!(group.workers, 2);
        assert!(config.group("tester").is_none());
    }

    #[test]
    fn rejects_unknown_capability_names() {
        let raw = SAMPLE.replace("\"economy\"", "\"levitation\"");
        assert!(toml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn validate_rejects_duplicates_and_empty_passwords() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        let mut dup = config.groups[0].clone();
        dup.uuid = Uuid::new_v4();
        config.groups.push(dup);
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.groups[0].password.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn snapshot_survives_swap() {
        let handle = ConfigHandle::new(toml::from_str(SAMPLE).unwrap());
        let before = handle.snapshot();
        handle.swap(Config::default());
        assert!(before.group("Tester").is_some());
        assert!(handle.snapshot().group("Tester").is_none());
    }

    #[test]
    fn masks_round_trip_through_toml() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let rendered = toml::to_string(&config).unwrap();
        let reparsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(
            reparsed.group("Tester").unwrap().capabilities,
            config.group("Tester").unwrap().capabilities
        );
    }
}
