//! Zenoh session configuration for param-z transports.
//!
//! Defaults are kept as a table of documented [`ConfigOverride`]s applied
//! on top of `zenoh::Config::default()`:
//!
//! - common: shared by peers and clients
//! - peer: devices and controllers talking directly on a LAN
//! - client: controllers reaching devices through a router
//!
//! Two environment variables adjust every session built here:
//!
//! - `PARAMZ_CONFIG_FILE`: path of a Zenoh config file used instead of the
//!   override table
//! - `PARAMZ_CONFIG_OVERRIDE`: `key=json5;key=json5` pairs applied last
//!
//! ```rust,ignore
//! let config = SessionConfigBuilder::new()
//!     .with_listen_endpoint("tcp/127.0.0.1:7450")
//!     .with_multicast_scouting(false)
//!     .build()?;
//! ```

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

pub const CONFIG_FILE_ENV: &str = "PARAMZ_CONFIG_FILE";
pub const CONFIG_OVERRIDE_ENV: &str = "PARAMZ_CONFIG_OVERRIDE";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConfigOverride {
    /// Config key path, e.g. `scouting/multicast/enabled`.
    pub key: &'static str,
    pub value: Value,
    /// Why the default is changed.
    pub reason: &'static str,
}

fn common_overrides() -> &'static [ConfigOverride] {
    static COMMON: LazyLock<Vec<ConfigOverride>> = LazyLock::new(|| {
        vec![
            ConfigOverride {
                key: "queries_default_timeout",
                value: serde_json::json!(2000),
                reason: "Value and namespace queries give up after 2s, the same budget as a subtree update",
            },
            ConfigOverride {
                key: "transport/link/tx/keep_alive",
                value: serde_json::json!(2),
                reason: "Detect vanished devices faster; control surfaces notice a dead peer within a lease period",
            },
        ]
    });
    &COMMON
}

fn peer_specific_overrides() -> &'static [ConfigOverride] {
    static PEER: LazyLock<Vec<ConfigOverride>> = LazyLock::new(|| {
        vec![
            ConfigOverride {
                key: "mode",
                value: serde_json::json!("peer"),
                reason: "Devices and controllers talk directly, no router required",
            },
            ConfigOverride {
                key: "scouting/multicast/enabled",
                value: serde_json::json!(true),
                reason: "Find devices on the local network without configuring endpoints",
            },
            ConfigOverride {
                key: "listen/endpoints",
                value: serde_json::json!(["tcp/[::]:0"]),
                reason: "Let the OS pick a port; peers learn it through scouting",
            },
        ]
    });
    &PEER
}

fn client_specific_overrides() -> &'static [ConfigOverride] {
    static CLIENT: LazyLock<Vec<ConfigOverride>> = LazyLock::new(|| {
        vec![
            ConfigOverride {
                key: "mode",
                value: serde_json::json!("client"),
                reason: "Controllers reach devices through a router",
            },
            ConfigOverride {
                key: "connect/endpoints",
                value: serde_json::json!(["tcp/localhost:7447"]),
                reason: "Router on localhost at the standard Zenoh port",
            },
            ConfigOverride {
                key: "scouting/multicast/enabled",
                value: serde_json::json!(false),
                reason: "Clients only talk to their configured router",
            },
        ]
    });
    &CLIENT
}

pub fn peer_overrides() -> Vec<ConfigOverride> {
    let mut overrides = peer_specific_overrides().to_vec();
    overrides.extend_from_slice(common_overrides());
    overrides
}

pub fn client_overrides() -> Vec<ConfigOverride> {
    let mut overrides = client_specific_overrides().to_vec();
    overrides.extend_from_slice(common_overrides());
    overrides
}

fn insert(config: &mut zenoh::Config, key: &str, value: &Value) -> Result<()> {
    let value_str = serde_json::to_string(value)?;
    config
        .insert_json5(key, &value_str)
        .map_err(|e| Error::Config(format!("cannot set '{key}' = '{value_str}': {e}")))
}

fn build_config(overrides: &[ConfigOverride]) -> Result<zenoh::Config> {
    let mut config = zenoh::Config::default();
    for o in overrides {
        insert(&mut config, o.key, &o.value)?;
    }
    Ok(config)
}

pub fn peer_config() -> Result<zenoh::Config> {
    build_config(&peer_overrides())
}

pub fn client_config() -> Result<zenoh::Config> {
    build_config(&client_overrides())
}

/// Parses `key=json5;key=json5`.
pub fn parse_overrides(raw: &str) -> Result<Vec<(String, Value)>> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::Config(format!("invalid override '{pair}', expected 'key=value'"))
            })?;
            let value = json5::from_str::<Value>(value.trim())
                .map_err(|e| Error::Config(format!("invalid value for '{}': {e}", key.trim())))?;
            Ok((key.trim().to_owned(), value))
        })
        .collect()
}

fn env_overrides() -> Result<Vec<(String, Value)>> {
    match std::env::var(CONFIG_OVERRIDE_ENV) {
        Ok(raw) => {
            debug!("[CFG] applying {CONFIG_OVERRIDE_ENV}: {raw}");
            parse_overrides(&raw)
        }
        Err(_) => Ok(Vec::new()),
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
    overrides: Vec<ConfigOverride>,
    connect: Vec<String>,
    listen: Vec<String>,
    use_env: bool,
}

impl SessionConfigBuilder {
    /// Peer-mode defaults.
    pub fn new() -> Self {
        Self {
            overrides: peer_overrides(),
            connect: Vec::new(),
            listen: Vec::new(),
            use_env: true,
        }
    }

    /// Client-mode defaults.
    pub fn client() -> Self {
        Self {
            overrides: client_overrides(),
            ..Self::new()
        }
    }

    /// Adds an endpoint to connect to. Replaces the table's endpoints.
    pub fn with_connect_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.connect.push(endpoint.into());
        self
    }

    /// Adds an endpoint to listen on. Replaces the table's endpoints.
    pub fn with_listen_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.listen.push(endpoint.into());
        self
    }

    pub fn with_multicast_scouting(self, enabled: bool) -> Self {
        self.with_override(
            "scouting/multicast/enabled",
            serde_json::json!(enabled),
            "Set explicitly by the application",
        )
    }

    /// Replaces the override for `key`, or adds one.
    pub fn with_override(mut self, key: &'static str, value: Value, reason: &'static str) -> Self {
        if let Some(existing) = self.overrides.iter_mut().find(|o| o.key == key) {
            existing.value = value;
            existing.reason = reason;
        } else {
            self.overrides.push(ConfigOverride { key, value, reason });
        }
        self
    }

    /// Ignore `PARAMZ_CONFIG_FILE` and `PARAMZ_CONFIG_OVERRIDE`.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Priority, lowest first: the override table (or `PARAMZ_CONFIG_FILE`
    /// when set), explicit endpoints, `PARAMZ_CONFIG_OVERRIDE`.
    pub fn build(self) -> Result<zenoh::Config> {
        let file = self
            .use_env
            .then(|| std::env::var(CONFIG_FILE_ENV).ok())
            .flatten();
        let mut config = match file {
            Some(path) => {
                debug!("[CFG] loading zenoh config from {path}");
                zenoh::Config::from_file(&path)?
            }
            None => build_config(&self.overrides)?,
        };
        if !self.connect.is_empty() {
            insert(&mut config, "connect/endpoints", &serde_json::json!(self.connect))?;
        }
        if !self.listen.is_empty() {
            insert(&mut config, "listen/endpoints", &serde_json::json!(self.listen))?;
        }
        if self.use_env {
            for (key, value) in env_overrides()? {
                insert(&mut config, &key, &value)?;
            }
        }
        Ok(config)
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
