//! Typed, bounded, observable value endpoints.
//!
//! A [`Parameter`] is owned by the [`Node`] it is attached to. Every write
//! goes through the same pipeline:
//!
//! 1. invalid input is dropped
//! 2. input of another type is converted to the declared type (an impulse
//!    re-commits the current value)
//! 3. the domain is applied under the bounding mode; a rejected value drops
//!    the write
//! 4. the value is committed under the parameter's lock, keeping the old
//!    one as `previous`
//! 5. with the lock released, callbacks run on the writing thread unless
//!    the write is quiet or filtered
//!
//! Callbacks double as the observation switch: adding the first one asks
//! the device's protocol to start observing the parameter remotely, and
//! removing the last one asks it to stop.

pub mod types;

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

pub use types::{AccessMode, Attribute, FullParameterData, ParameterId, RepetitionFilter};

use crate::callbacks::{CallbackHandle, CallbackList};
use crate::device::{AttributeChange, Device, WeakDevice};
use crate::domain::{BoundingMode, Domain, WireDomain};
use crate::node::Node;
use crate::protocol::Completion;
use crate::queue::ReceivedValue;
use crate::value::{Value, ValueType};

struct ValueState {
    current: Value,
    previous: Value,
}

#[derive(Debug, Clone)]
struct Attributes {
    value_type: ValueType,
    access: AccessMode,
    bounding: BoundingMode,
    domain: Domain,
    repetition_filter: RepetitionFilter,
    unit: Option<String>,
    description: Option<String>,
    critical: bool,
    disabled: bool,
    muted: bool,
}

struct Committed {
    value: Value,
    filtered: bool,
}

pub struct Parameter {
    id: ParameterId,
    this: Weak<Parameter>,
    node: Weak<Node>,
    device: WeakDevice,
    state: Mutex<ValueState>,
    attributes: RwLock<Attributes>,
    callbacks: CallbackList<Value>,
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("id", &self.id)
            .field("address", &self.address())
            .field("value", &self.value())
            .finish()
    }
}

impl Parameter {
    pub(crate) fn new(node: Weak<Node>, device: WeakDevice, value_type: ValueType) -> Arc<Self> {
        Arc::new_cyclic(|this| Parameter {
            id: ParameterId::next(),
            this: this.clone(),
            node,
            device,
            state: Mutex::new(ValueState {
                current: value_type.default_value(),
                previous: Value::Invalid,
            }),
            attributes: RwLock::new(Attributes {
                value_type,
                access: AccessMode::default(),
                bounding: BoundingMode::default(),
                domain: Domain::Empty,
                repetition_filter: RepetitionFilter::default(),
                unit: None,
                description: None,
                critical: false,
                disabled: false,
                muted: false,
            }),
            callbacks: CallbackList::new(),
        })
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    pub fn downgrade(&self) -> Weak<Parameter> {
        self.this.clone()
    }

    pub fn node(&self) -> Option<Arc<Node>> {
        self.node.upgrade()
    }

    pub fn device(&self) -> Option<Device> {
        self.device.upgrade()
    }

    /// Address of the owning node, or an empty string once detached.
    pub fn address(&self) -> String {
        self.node().map(|n| n.address()).unwrap_or_default()
    }

    pub fn value(&self) -> Value {
        self.state.lock().current.clone()
    }

    pub fn previous_value(&self) -> Value {
        self.state.lock().previous.clone()
    }

    fn commit(&self, value: Value) -> Option<Committed> {
        if !value.valid() {
            return None;
        }
        let attrs = self.attributes.read();
        let mut state = self.state.lock();

        let converted = if value.same_type(&state.current) {
            value
        } else {
            value.convert_with_previous(&state.current, attrs.value_type)
        };
        let bounded = if attrs.bounding == BoundingMode::Free {
            converted
        } else {
            attrs.domain.apply(attrs.bounding, &converted)
        };
        if !bounded.valid() {
            trace!(id = %self.id, "[PRM] write rejected by domain");
            return None;
        }

        let repeated = attrs.repetition_filter == RepetitionFilter::On
            && !bounded.is_impulse()
            && bounded == state.current;
        state.previous = std::mem::replace(&mut state.current, bounded.clone());

        Some(Committed {
            value: bounded,
            filtered: attrs.disabled || attrs.muted || repeated,
        })
    }

    fn announce(&self, value: &Value) {
        let Some(device) = self.device() else { return };
        let message = &device.signals().message;
        if !message.is_empty() {
            message.emit(&ReceivedValue {
                id: self.id,
                parameter: self.this.clone(),
                value: value.clone(),
            });
        }
    }

    /// Commits `value` and notifies callbacks.
    ///
    /// Invalid values and values the domain rejects leave the parameter
    /// untouched.
    pub fn set_value(&self, value: impl Into<Value>) -> &Self {
        if let Some(c) = self.commit(value.into()) {
            if !c.filtered {
                self.callbacks.emit(&c.value);
            }
            self.announce(&c.value);
        }
        self
    }

    /// Commits `value` without running callbacks.
    pub fn set_value_quiet(&self, value: impl Into<Value>) -> &Self {
        if let Some(c) = self.commit(value.into()) {
            self.announce(&c.value);
        }
        self
    }

    /// [`set_value`](Self::set_value), then send the committed value out
    /// through the device's protocol.
    ///
    /// Returns `false` when nothing was sent: the write was dropped, the
    /// parameter is filtered (muted, disabled or a repeat), there is no
    /// device, or the transport failed.
    pub fn push_value(&self, value: impl Into<Value>) -> bool {
        let Some(c) = self.commit(value.into()) else {
            return false;
        };
        if !c.filtered {
            self.callbacks.emit(&c.value);
        }
        self.announce(&c.value);
        if c.filtered {
            trace!(id = %self.id, "[PRM] filtered value not pushed");
            return false;
        }
        self.device()
            .is_some_and(|d| d.protocol().push(self, &c.value))
    }

    /// Pushes the committed value without writing a new one.
    pub fn push_current(&self) -> bool {
        let attrs = self.attributes.read();
        if attrs.disabled || attrs.muted {
            return false;
        }
        drop(attrs);
        self.device().is_some_and(|d| d.protocol().push_current(self))
    }

    pub fn pull_value(&self) -> bool {
        if !self.access().readable() {
            debug!(address = %self.address(), "[PRM] pull refused on write-only parameter");
            return false;
        }
        self.device().is_some_and(|d| d.protocol().pull(self))
    }

    pub fn pull_value_async(&self) -> Completion {
        if !self.access().readable() {
            return Completion::ready(false);
        }
        match self.device() {
            Some(d) => d.protocol().pull_async(self),
            None => Completion::ready(false),
        }
    }

    /// Asks the remote side for a fresh value without waiting for it.
    pub fn request_value(&self) {
        if let Some(d) = self.device() {
            d.protocol().request(self);
        }
    }

    pub fn fetch_value(&self) -> Value {
        self.pull_value();
        self.value()
    }

    /// Whether a write of `value` would be suppressed: the parameter is
    /// disabled or muted, or the repetition filter is on and `value` equals
    /// the current value.
    pub fn filter_value(&self, value: &Value) -> bool {
        let attrs = self.attributes.read();
        if attrs.disabled || attrs.muted {
            return true;
        }
        attrs.repetition_filter == RepetitionFilter::On
            && !value.is_impulse()
            && *value == self.state.lock().current
    }

    pub fn add_callback<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let (handle, first) = self.callbacks.add(callback);
        if first {
            self.on_first_callback_added();
        }
        handle
    }

    /// Returns `false` for unknown or stale handles.
    pub fn remove_callback(&self, handle: CallbackHandle) -> bool {
        match self.callbacks.remove(handle) {
            Some(now_empty) => {
                if now_empty {
                    self.on_removing_last_callback();
                }
                true
            }
            None => false,
        }
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    fn on_first_callback_added(&self) {
        if let Some(d) = self.device() {
            trace!(address = %self.address(), "[PRM] start observing");
            d.protocol().observe(self, true);
        }
    }

    fn on_removing_last_callback(&self) {
        if let Some(d) = self.device() {
            trace!(address = %self.address(), "[PRM] stop observing");
            d.protocol().observe(self, false);
        }
    }

    /// Invalidates every callback. Runs as part of node teardown, after the
    /// device announced the removal.
    pub(crate) fn teardown(&self) {
        if self.callbacks.clear() > 0 {
            self.on_removing_last_callback();
        }
    }

    fn notify_attribute(&self, attribute: Attribute) {
        let (Some(device), Some(node)) = (self.device(), self.node()) else {
            return;
        };
        let signal = &device.signals().attribute_modified;
        if !signal.is_empty() {
            signal.emit(&AttributeChange {
                address: node.address(),
                attribute,
            });
        }
    }

    /// Applies `f` to the attributes and notifies when it reports a change.
    fn update_attribute(&self, attribute: Attribute, f: impl FnOnce(&mut Attributes) -> bool) -> &Self {
        let changed = f(&mut self.attributes.write());
        if changed {
            self.notify_attribute(attribute);
        }
        self
    }

    pub fn value_type(&self) -> ValueType {
        self.attributes.read().value_type
    }

    /// Re-types the parameter: the value resets to the type's default and
    /// a set domain is converted to the new type.
    pub fn set_value_type(&self, value_type: ValueType) -> &Self {
        {
            let mut attrs = self.attributes.write();
            let mut state = self.state.lock();
            attrs.value_type = value_type;
            state.previous = std::mem::replace(&mut state.current, value_type.default_value());
            if !attrs.domain.is_empty() {
                attrs.domain = attrs.domain.convert_to(value_type);
            }
        }
        self.notify_attribute(Attribute::ValueType);
        self
    }

    pub fn access(&self) -> AccessMode {
        self.attributes.read().access
    }

    pub fn set_access(&self, access: AccessMode) -> &Self {
        self.update_attribute(Attribute::Access, |a| {
            std::mem::replace(&mut a.access, access) != access
        })
    }

    pub fn domain(&self) -> Domain {
        self.attributes.read().domain.clone()
    }

    /// Sets the domain, converted to fit the declared value type.
    pub fn set_domain(&self, domain: Domain) -> &Self {
        self.update_attribute(Attribute::Domain, |a| {
            let domain = domain.convert_to(a.value_type);
            if a.domain == domain {
                return false;
            }
            a.domain = domain;
            true
        })
    }

    pub fn bounding(&self) -> BoundingMode {
        self.attributes.read().bounding
    }

    /// Ignored for boolean parameters.
    pub fn set_bounding(&self, bounding: BoundingMode) -> &Self {
        self.update_attribute(Attribute::Bounding, |a| {
            if a.value_type == ValueType::Bool {
                return false;
            }
            std::mem::replace(&mut a.bounding, bounding) != bounding
        })
    }

    pub fn repetition_filter(&self) -> RepetitionFilter {
        self.attributes.read().repetition_filter
    }

    pub fn set_repetition_filter(&self, filter: RepetitionFilter) -> &Self {
        self.update_attribute(Attribute::RepetitionFilter, |a| {
            std::mem::replace(&mut a.repetition_filter, filter) != filter
        })
    }

    pub fn unit(&self) -> Option<String> {
        self.attributes.read().unit.clone()
    }

    pub fn set_unit(&self, unit: Option<String>) -> &Self {
        self.update_attribute(Attribute::Unit, |a| {
            if a.unit == unit {
                return false;
            }
            a.unit = unit;
            true
        })
    }

    pub fn description(&self) -> Option<String> {
        self.attributes.read().description.clone()
    }

    pub fn set_description(&self, description: Option<String>) -> &Self {
        self.update_attribute(Attribute::Description, |a| {
            if a.description == description {
                return false;
            }
            a.description = description;
            true
        })
    }

    pub fn critical(&self) -> bool {
        self.attributes.read().critical
    }

    pub fn set_critical(&self, critical: bool) -> &Self {
        self.update_attribute(Attribute::Critical, |a| {
            std::mem::replace(&mut a.critical, critical) != critical
        })
    }

    pub fn disabled(&self) -> bool {
        self.attributes.read().disabled
    }

    pub fn set_disabled(&self, disabled: bool) -> &Self {
        self.update_attribute(Attribute::Disabled, |a| {
            std::mem::replace(&mut a.disabled, disabled) != disabled
        })
    }

    pub fn muted(&self) -> bool {
        self.attributes.read().muted
    }

    pub fn set_muted(&self, muted: bool) -> &Self {
        self.update_attribute(Attribute::Muted, |a| {
            std::mem::replace(&mut a.muted, muted) != muted
        })
    }

    /// Snapshot of the address, value and attributes.
    pub fn to_data(&self) -> FullParameterData {
        let value = self.value();
        let attrs = self.attributes.read();
        FullParameterData {
            address: self.address(),
            value,
            value_type: attrs.value_type,
            access: attrs.access,
            bounding: attrs.bounding,
            domain: (!attrs.domain.is_empty()).then(|| WireDomain::from(&attrs.domain)),
            repetition_filter: attrs.repetition_filter,
            unit: attrs.unit.clone(),
            description: attrs.description.clone(),
            critical: attrs.critical,
        }
    }

    /// Mirrors a remote snapshot: attributes first, then a quiet commit of
    /// the value so the mirror does not echo it back out.
    pub(crate) fn apply_data(&self, data: &FullParameterData) {
        if self.value_type() != data.value_type {
            self.set_value_type(data.value_type);
        }
        self.set_access(data.access)
            .set_domain(data.domain.clone().map(Domain::from).unwrap_or_default())
            .set_bounding(data.bounding)
            .set_repetition_filter(data.repetition_filter)
            .set_unit(data.unit.clone())
            .set_description(data.description.clone())
            .set_critical(data.critical)
            .set_value_quiet(data.value.clone());
    }
}
