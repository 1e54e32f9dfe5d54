//! Zenoh transport.
//!
//! A device is exposed under a key prefix, `paramz/synth` say, with two
//! key spaces:
//!
//! | Key | Direction | Payload |
//! |-----|-----------|---------|
//! | `{prefix}/value/{address}` | server puts, server answers queries | JSON [`Value`] on put, JSON [`FullParameterData`] on query |
//! | `{prefix}/set/{address}` | clients put | JSON [`Value`] |
//!
//! The [`ZRole::Server`] side owns the authoritative tree: it answers
//! namespace and value queries, applies remote writes and publishes every
//! value it pushes. The [`ZRole::Client`] side mirrors a remote tree:
//! `update` rebuilds nodes from a namespace query, `pull` queries a value,
//! `push` writes remotely and `observe` subscribes to the published values.
//!
//! ```rust,ignore
//! let server = ZProtocolBuilder::server("paramz/synth").build()?;
//! let device = DeviceBuilder::new("synth").with_protocol(server).build()?;
//!
//! let client = ZProtocolBuilder::client("paramz/synth").build()?;
//! let mirror = DeviceBuilder::new("synth").with_protocol(client).build()?;
//! mirror.update();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace, warn};
use zenoh::key_expr::keyexpr;
use zenoh::pubsub::Subscriber;
use zenoh::query::{Query, Queryable, Reply};
use zenoh::sample::Sample;
use zenoh::{Session, Wait};

use super::{Completer, Completion, Protocol};
use crate::Builder;
use crate::config::SessionConfigBuilder;
use crate::device::{Device, WeakDevice};
use crate::discovery::ServiceResolver;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::parameter::{FullParameterData, Parameter};
use crate::value::Value;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ZRole {
    /// Exposes the local tree.
    #[default]
    Server,
    /// Mirrors a remote tree.
    Client,
}

pub struct ZProtocolBuilder {
    prefix: String,
    role: ZRole,
    session: Option<Arc<Session>>,
    config: Option<zenoh::Config>,
    connect: Vec<String>,
    listen: Vec<String>,
    query_timeout: Duration,
    service: Option<(String, Arc<dyn ServiceResolver>)>,
}

impl ZProtocolBuilder {
    pub fn new(prefix: impl Into<String>, role: ZRole) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_owned(),
            role,
            session: None,
            config: None,
            connect: Vec::new(),
            listen: Vec::new(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            service: None,
        }
    }

    pub fn server(prefix: impl Into<String>) -> Self {
        Self::new(prefix, ZRole::Server)
    }

    pub fn client(prefix: impl Into<String>) -> Self {
        Self::new(prefix, ZRole::Client)
    }

    /// Shares an already open session. Endpoint and config options are
    /// then ignored.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_zenoh_config(mut self, config: zenoh::Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_connect_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.connect.push(endpoint.into());
        self
    }

    pub fn with_listen_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.listen.push(endpoint.into());
        self
    }

    /// Bounds `pull` and `update`. Defaults to 2 s.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Connects to every endpoint `resolver` knows for `name`.
    pub fn with_service(mut self, name: impl Into<String>, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.service = Some((name.into(), resolver));
        self
    }

    fn service_endpoints(&self) -> Vec<String> {
        let Some((name, resolver)) = &self.service else {
            return Vec::new();
        };
        match resolver.resolve(name).wait_timeout(self.query_timeout) {
            Some(records) if !records.is_empty() => {
                records.iter().map(|r| r.endpoint()).collect()
            }
            Some(_) => {
                warn!(service = %name, "[ZPR] no record for service");
                Vec::new()
            }
            None => {
                warn!(service = %name, "[ZPR] service resolution timed out");
                Vec::new()
            }
        }
    }

    fn open_session(&mut self) -> Result<Arc<Session>> {
        if let Some(session) = self.session.take() {
            return Ok(session);
        }
        let mut connect = std::mem::take(&mut self.connect);
        connect.extend(self.service_endpoints());

        let config = match self.config.take() {
            Some(mut config) => {
                if !connect.is_empty() {
                    config
                        .insert_json5("connect/endpoints", &serde_json::to_string(&connect)?)
                        .map_err(|e| Error::Config(e.to_string()))?;
                }
                if !self.listen.is_empty() {
                    config
                        .insert_json5("listen/endpoints", &serde_json::to_string(&self.listen)?)
                        .map_err(|e| Error::Config(e.to_string()))?;
                }
                config
            }
            None => {
                let mut builder = SessionConfigBuilder::new();
                for endpoint in connect {
                    builder = builder.with_connect_endpoint(endpoint);
                }
                for endpoint in self.listen.drain(..) {
                    builder = builder.with_listen_endpoint(endpoint);
                }
                builder.build()?
            }
        };
        Ok(Arc::new(zenoh::open(config).wait()?))
    }
}

impl Builder for ZProtocolBuilder {
    type Output = ZProtocol;

    #[tracing::instrument(name = "zprotocol_build", skip(self), fields(
        prefix = %self.prefix,
        role = %self.role
    ))]
    fn build(mut self) -> Result<ZProtocol> {
        let wild = self.prefix.split('/').any(|chunk| chunk.contains(['*', '$']));
        if wild || keyexpr::new(self.prefix.as_str()).is_err() {
            return Err(Error::Config(format!("invalid key prefix '{}'", self.prefix)));
        }
        let session = self.open_session()?;
        debug!("[ZPR] session {} open", session.zid());
        Ok(ZProtocol {
            session,
            prefix: self.prefix,
            role: self.role,
            query_timeout: self.query_timeout,
            device: OnceLock::new(),
            observers: Arc::default(),
            server: Mutex::new(None),
        })
    }
}

/// Observation subscriptions keyed by address and quietness.
type Observers = HashMap<(String, bool), Subscriber<()>>;

struct ServerHandles {
    _queryable: Queryable<()>,
    _writes: Subscriber<()>,
}

pub struct ZProtocol {
    session: Arc<Session>,
    prefix: String,
    role: ZRole,
    query_timeout: Duration,
    device: OnceLock<WeakDevice>,
    observers: Arc<Mutex<Observers>>,
    server: Mutex<Option<ServerHandles>>,
}

impl std::fmt::Debug for ZProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZProtocol")
            .field("prefix", &self.prefix)
            .field("role", &self.role)
            .field("zid", &self.session.zid())
            .finish()
    }
}

fn encode<T: Serialize>(payload: &T) -> Option<Vec<u8>> {
    serde_json::to_vec(payload)
        .inspect_err(|e| warn!("[ZPR] encode failed: {e}"))
        .ok()
}

fn decode<T: DeserializeOwned>(sample: &Sample) -> Option<T> {
    serde_json::from_slice(&sample.payload().to_bytes())
        .inspect_err(|e| warn!(key = %sample.key_expr(), "[ZPR] decode failed: {e}"))
        .ok()
}

fn join(prefix: &str, space: &str, address: &str) -> String {
    let path = address.trim_matches('/');
    if path.is_empty() {
        format!("{prefix}/{space}")
    } else {
        format!("{prefix}/{space}/{path}")
    }
}

/// Address of `key` within `{prefix}/{space}`.
fn address_of(prefix: &str, space: &str, key: &str) -> Option<String> {
    let root = format!("{prefix}/{space}");
    let rest = key.strip_prefix(&root)?;
    match rest {
        "" => Some("/".to_owned()),
        r if r.starts_with('/') => Some(r.to_owned()),
        _ => None,
    }
}

/// Resolves its completion when the owning zenoh callback is dropped,
/// i.e. when the query is finished.
struct CompleteOnDrop {
    completer: Option<Completer>,
    ok: AtomicBool,
}

impl CompleteOnDrop {
    fn new(completer: Completer) -> Self {
        Self {
            completer: Some(completer),
            ok: AtomicBool::new(false),
        }
    }

    fn succeed(&self) {
        self.ok.store(true, Ordering::Release);
    }
}

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        if let Some(completer) = self.completer.take() {
            completer.complete(self.ok.load(Ordering::Acquire));
        }
    }
}

/// Creates or refreshes the mirrored parameter described by `data`.
fn mirror(device: &Device, data: &FullParameterData) -> bool {
    let node = match device.find_or_create_node(&data.address) {
        Ok(node) => node,
        Err(e) => {
            warn!(address = %data.address, "[ZPR] cannot mirror: {e}");
            return false;
        }
    };
    if node.is_root() {
        return false;
    }
    node.create_parameter(data.value_type).apply_data(data);
    true
}

impl ZProtocol {
    pub fn role(&self) -> ZRole {
        self.role
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn value_key(&self, address: &str) -> String {
        join(&self.prefix, "value", address)
    }

    fn set_key(&self, address: &str) -> String {
        join(&self.prefix, "set", address)
    }

    fn subtree_key(&self, address: &str) -> String {
        format!("{}/**", self.value_key(address))
    }

    fn device(&self) -> Option<Device> {
        self.device.get().and_then(WeakDevice::upgrade)
    }

    fn put(&self, key: &str, value: &Value) -> bool {
        let Some(payload) = encode(value) else {
            return false;
        };
        match self.session.put(key, payload).wait() {
            Ok(()) => {
                trace!(%key, %value, "[ZPR] put");
                true
            }
            Err(e) => {
                warn!(%key, "[ZPR] put failed: {e}");
                false
            }
        }
    }

    fn query(&self, key: &str) -> Option<zenoh::handlers::FifoChannelHandler<Reply>> {
        self.session
            .get(key)
            .timeout(self.query_timeout)
            .wait()
            .inspect_err(|e| warn!(%key, "[ZPR] query failed: {e}"))
            .ok()
    }

    fn start_server(&self, device: WeakDevice) -> Result<()> {
        let prefix = self.prefix.clone();
        let reads = device.clone();
        let queryable = self
            .session
            .declare_queryable(self.subtree_key("/"))
            .callback(move |query| answer(&prefix, &reads, &query))
            .wait()?;

        let prefix = self.prefix.clone();
        let writes = self
            .session
            .declare_subscriber(join(&self.prefix, "set", "/**"))
            .callback(move |sample| apply_remote_write(&prefix, &device, &sample))
            .wait()?;

        *self.server.lock() = Some(ServerHandles {
            _queryable: queryable,
            _writes: writes,
        });
        info!(prefix = %self.prefix, "[ZPR] serving device");
        Ok(())
    }
}

/// Drops the notifying and the quiet subscription of `address`.
fn forget_observers(observers: &mut Observers, address: &str) -> usize {
    let dropped = [false, true]
        .into_iter()
        .filter(|quiet| observers.remove(&(address.to_owned(), *quiet)).is_some())
        .count();
    if dropped > 0 {
        trace!(%address, dropped, "[ZPR] observation dropped with parameter");
    }
    dropped
}

fn answer(prefix: &str, device: &WeakDevice, query: &Query) {
    let Some(device) = device.upgrade() else {
        return;
    };
    let mut replies = 0usize;
    for parameter in device.parameters() {
        let key = join(prefix, "value", &parameter.address());
        let Ok(ke) = keyexpr::new(key.as_str()) else {
            continue;
        };
        if !query.key_expr().intersects(ke) {
            continue;
        }
        let Some(payload) = encode(&parameter.to_data()) else {
            continue;
        };
        if let Err(e) = query.reply(key.as_str(), payload).wait() {
            warn!(%key, "[ZPR] reply failed: {e}");
        } else {
            replies += 1;
        }
    }
    trace!(selector = %query.key_expr(), replies, "[ZPR] answered query");
}

fn apply_remote_write(prefix: &str, device: &WeakDevice, sample: &Sample) {
    let Some(device) = device.upgrade() else {
        return;
    };
    let Some(address) = address_of(prefix, "set", sample.key_expr().as_str()) else {
        return;
    };
    let Some(parameter) = device.find_parameter(&address) else {
        debug!(%address, "[ZPR] write to unknown parameter");
        return;
    };
    if !parameter.access().writable() {
        debug!(%address, "[ZPR] write to read-only parameter dropped");
        return;
    }
    if let Some(value) = decode::<Value>(sample) {
        parameter.push_value(value);
    }
}

impl Protocol for ZProtocol {
    fn pull(&self, parameter: &Parameter) -> bool {
        if self.role == ZRole::Server {
            return true;
        }
        let key = self.value_key(&parameter.address());
        let Some(replies) = self.query(&key) else {
            return false;
        };
        let mut pulled = false;
        while let Ok(reply) = replies.recv() {
            if let Ok(sample) = reply.result()
                && let Some(data) = decode::<FullParameterData>(sample)
                && !pulled
            {
                parameter.set_value(data.value);
                pulled = true;
            }
        }
        pulled
    }

    fn pull_async(&self, parameter: &Parameter) -> Completion {
        if self.role == ZRole::Server {
            return Completion::ready(true);
        }
        let (completer, completion) = Completion::pending();
        let guard = CompleteOnDrop::new(completer);
        let target: Weak<Parameter> = parameter.downgrade();
        let key = self.value_key(&parameter.address());
        let declared = self
            .session
            .get(key.as_str())
            .timeout(self.query_timeout)
            .callback(move |reply| {
                if let Ok(sample) = reply.result()
                    && let Some(data) = decode::<FullParameterData>(sample)
                    && let Some(parameter) = target.upgrade()
                {
                    parameter.set_value(data.value);
                    guard.succeed();
                }
            })
            .wait();
        // on error the callback, and with it the guard, is already dropped
        if let Err(e) = declared {
            warn!(%key, "[ZPR] async query failed: {e}");
        }
        completion
    }

    fn push(&self, parameter: &Parameter, value: &Value) -> bool {
        match self.role {
            ZRole::Server => self.put(&self.value_key(&parameter.address()), value),
            ZRole::Client => {
                if !parameter.access().writable() {
                    debug!(address = %parameter.address(), "[ZPR] push refused on read-only parameter");
                    return false;
                }
                self.put(&self.set_key(&parameter.address()), value)
            }
        }
    }

    fn push_raw(&self, data: &FullParameterData) -> bool {
        match self.role {
            ZRole::Server => self
                .device()
                .and_then(|d| d.find_parameter(&data.address))
                .is_some_and(|p| p.push_value(data.value.clone())),
            ZRole::Client => self.put(&self.set_key(&data.address), &data.value),
        }
    }

    fn observe(&self, parameter: &Parameter, enable: bool) -> bool {
        self.observe_with(parameter, enable, false)
    }

    fn observe_quietly(&self, parameter: &Parameter, enable: bool) -> bool {
        self.observe_with(parameter, enable, true)
    }

    fn request(&self, parameter: &Parameter) {
        // fire and forget: the completion is dropped, the query still runs
        let _ = self.pull_async(parameter);
    }

    fn update(&self, node: &Node) -> bool {
        if self.role == ZRole::Server {
            return true;
        }
        let Some(device) = self.device() else {
            return false;
        };
        let key = self.subtree_key(&node.address());
        let Some(replies) = self.query(&key) else {
            return false;
        };
        let mut mirrored = 0usize;
        while let Ok(reply) = replies.recv() {
            if let Ok(sample) = reply.result()
                && let Some(data) = decode::<FullParameterData>(sample)
                && mirror(&device, &data)
            {
                mirrored += 1;
            }
        }
        debug!(%key, mirrored, "[ZPR] namespace update done");
        true
    }

    fn update_async(&self, node: &Node) -> Completion {
        if self.role == ZRole::Server {
            return Completion::ready(true);
        }
        let Some(device) = self.device.get().cloned() else {
            return Completion::ready(false);
        };
        let (completer, completion) = Completion::pending();
        // resolves once both this frame and the query callback let go
        let guard = Arc::new(CompleteOnDrop::new(completer));
        let key = self.subtree_key(&node.address());
        let in_callback = Arc::clone(&guard);
        let declared = self
            .session
            .get(key.as_str())
            .timeout(self.query_timeout)
            .callback(move |reply| {
                let _ = &in_callback;
                if let Ok(sample) = reply.result()
                    && let Some(data) = decode::<FullParameterData>(sample)
                    && let Some(device) = device.upgrade()
                {
                    mirror(&device, &data);
                }
            })
            .wait();
        match declared {
            // a finished query is a successful update, even with no replies
            Ok(()) => guard.succeed(),
            Err(e) => warn!(%key, "[ZPR] async namespace query failed: {e}"),
        }
        completion
    }

    fn set_device(&self, device: WeakDevice) {
        if self.device.set(device.clone()).is_err() {
            warn!("[ZPR] protocol already attached to a device");
            return;
        }
        if let Some(attached) = device.upgrade() {
            let observers = Arc::downgrade(&self.observers);
            attached
                .signals()
                .parameter_removing
                .add(move |parameter: &Parameter| {
                    if let Some(observers) = observers.upgrade() {
                        forget_observers(&mut observers.lock(), &parameter.address());
                    }
                });
        }
        if self.role == ZRole::Server
            && let Err(e) = self.start_server(device)
        {
            warn!(prefix = %self.prefix, "[ZPR] cannot serve device: {e}");
        }
    }

    fn stop(&self) {
        let observers = std::mem::take(&mut *self.observers.lock());
        let server = self.server.lock().take();
        debug!(
            prefix = %self.prefix,
            observers = observers.len(),
            serving = server.is_some(),
            "[ZPR] stopping"
        );
    }
}

impl ZProtocol {
    fn observe_with(&self, parameter: &Parameter, enable: bool, quiet: bool) -> bool {
        if self.role == ZRole::Server {
            return true;
        }
        let slot = (parameter.address(), quiet);
        if !enable {
            return self.observers.lock().remove(&slot).is_some();
        }
        if self.observers.lock().contains_key(&slot) {
            return true;
        }
        let target = parameter.downgrade();
        let subscriber = self
            .session
            .declare_subscriber(self.value_key(&slot.0))
            .callback(move |sample| {
                let (Some(parameter), Some(value)) = (target.upgrade(), decode::<Value>(&sample))
                else {
                    return;
                };
                if quiet {
                    parameter.set_value_quiet(value);
                } else {
                    parameter.set_value(value);
                }
            })
            .wait();
        match subscriber {
            Ok(subscriber) => {
                trace!(address = %slot.0, quiet, "[ZPR] observing");
                self.observers.lock().insert(slot, subscriber);
                true
            }
            Err(e) => {
                warn!(address = %slot.0, "[ZPR] cannot observe: {e}");
                false
            }
        }
    }
}
