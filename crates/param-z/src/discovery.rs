//! Service discovery contract.
//!
//! Transports that have to locate a remote peer ask a [`ServiceResolver`]
//! for the records published under a logical service name. The backend
//! (mDNS, a registry, a static table) is not part of this crate; only the
//! in-memory [`StaticResolver`] ships with it.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::Completion;

/// One endpoint announced under a service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ServiceRecord {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Zenoh TCP locator, `tcp/host:port`. IPv6 hosts are bracketed.
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("tcp/[{}]:{}", self.host, self.port)
        } else {
            format!("tcp/{}:{}", self.host, self.port)
        }
    }
}

pub trait ServiceResolver: Send + Sync {
    /// Eventually yields every record known for `name`, possibly none.
    fn resolve(&self, name: &str) -> Completion<Vec<ServiceRecord>>;
}

/// Resolver over an in-memory table.
#[derive(Debug, Default)]
pub struct StaticResolver {
    services: RwLock<HashMap<String, Vec<ServiceRecord>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce(&self, name: impl Into<String>, record: ServiceRecord) {
        let name = name.into();
        debug!(%name, endpoint = %record.endpoint(), "[DSC] announce");
        let mut services = self.services.write();
        let records = services.entry(name).or_default();
        if !records.contains(&record) {
            records.push(record);
        }
    }

    /// Removes every record of `name`. Returns how many were removed.
    pub fn withdraw(&self, name: &str) -> usize {
        self.services.write().remove(name).map_or(0, |r| r.len())
    }
}

impl ServiceResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Completion<Vec<ServiceRecord>> {
        Completion::ready(self.services.read().get(name).cloned().unwrap_or_default())
    }
}
