//! Cross-thread delivery of value changes.
//!
//! Value changes happen on whichever thread wrote the parameter, often a
//! network thread. A real-time consumer drains them here without ever
//! blocking: the only consumption primitive is [`MessageQueue::try_dequeue`].
//!
//! Two flavours:
//!
//! - [`MessageQueue`] delivers changes of explicitly registered parameters.
//!   Registrations are reference counted and dropped automatically when the
//!   parameter is removed from its device.
//! - [`GlobalMessageQueue`] delivers every committed value of a device,
//!   quiet writes included. On a mirror, [`GlobalMessageQueue::observe_all`]
//!   subscribes every parameter so remote changes arrive at all.
//!
//! Entries hold a [`Weak`] to their parameter, so draining an entry for a
//! parameter that has since been destroyed is safe.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::callbacks::CallbackHandle;
use crate::device::{Device, WeakDevice};
use crate::parameter::{Parameter, ParameterId};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ReceivedValue {
    pub id: ParameterId,
    pub parameter: Weak<Parameter>,
    pub value: Value,
}

impl ReceivedValue {
    /// The parameter, if it still exists.
    pub fn parameter(&self) -> Option<Arc<Parameter>> {
        self.parameter.upgrade()
    }
}

struct Registration {
    count: usize,
    handle: CallbackHandle,
    parameter: Weak<Parameter>,
}

type Registry = Arc<Mutex<HashMap<ParameterId, Registration>>>;

pub struct MessageQueue {
    device: WeakDevice,
    tx: Sender<ReceivedValue>,
    rx: Receiver<ReceivedValue>,
    registry: Registry,
    removal: CallbackHandle,
}

impl MessageQueue {
    pub fn new(device: &Device) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let registry: Registry = Arc::default();

        let removal = {
            let registry = Arc::downgrade(&registry);
            device
                .signals()
                .parameter_removing
                .add(move |p: &Parameter| {
                    if let Some(registry) = registry.upgrade()
                        && registry.lock().remove(&p.id()).is_some()
                    {
                        trace!(id = %p.id(), "[QUE] registration dropped with parameter");
                    }
                })
                .0
        };

        Self {
            device: device.downgrade(),
            tx,
            rx,
            registry,
            removal,
        }
    }

    /// Starts delivering changes of `parameter`, or bumps its count when
    /// already registered.
    pub fn register(&self, parameter: &Parameter) {
        let mut registry = self.registry.lock();
        if let Some(reg) = registry.get_mut(&parameter.id()) {
            reg.count += 1;
            return;
        }
        let tx = self.tx.clone();
        let id = parameter.id();
        let weak = parameter.downgrade();
        let handle = parameter.add_callback(move |value: &Value| {
            let _ = tx.send(ReceivedValue {
                id,
                parameter: weak.clone(),
                value: value.clone(),
            });
        });
        registry.insert(
            id,
            Registration {
                count: 1,
                handle,
                parameter: parameter.downgrade(),
            },
        );
        debug!(address = %parameter.address(), "[QUE] registered");
    }

    /// Drops one registration; the last one removes the callback.
    pub fn unregister(&self, parameter: &Parameter) {
        let mut registry = self.registry.lock();
        let Some(reg) = registry.get_mut(&parameter.id()) else {
            return;
        };
        reg.count -= 1;
        if reg.count == 0 {
            let handle = reg.handle;
            registry.remove(&parameter.id());
            drop(registry);
            parameter.remove_callback(handle);
            debug!(address = %parameter.address(), "[QUE] unregistered");
        }
    }

    /// Registration count of `parameter`, zero when not registered.
    pub fn registrations(&self, parameter: &Parameter) -> usize {
        self.registry
            .lock()
            .get(&parameter.id())
            .map_or(0, |r| r.count)
    }

    /// Never blocks.
    pub fn try_dequeue(&self) -> Option<ReceivedValue> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        let registrations: Vec<Registration> =
            self.registry.lock().drain().map(|(_, r)| r).collect();
        for reg in registrations {
            if let Some(p) = reg.parameter.upgrade() {
                p.remove_callback(reg.handle);
            }
        }
        if let Some(device) = self.device.upgrade() {
            device.signals().parameter_removing.remove(self.removal);
        }
    }
}

/// Every committed value of one device.
pub struct GlobalMessageQueue {
    device: WeakDevice,
    rx: Receiver<ReceivedValue>,
    handle: CallbackHandle,
    /// Parameters observed by [`Self::observe_all`], with whether quietly.
    observed: Mutex<Vec<(Weak<Parameter>, bool)>>,
}

impl GlobalMessageQueue {
    pub fn new(device: &Device) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (handle, _) = device.signals().message.add(move |msg: &ReceivedValue| {
            let _ = tx.send(msg.clone());
        });
        Self {
            device: device.downgrade(),
            rx,
            handle,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Asks the protocol to observe every current parameter, quietly where
    /// supported. Undone when the queue is dropped.
    ///
    /// Returns how many parameters are observed through this queue.
    pub fn observe_all(&self) -> usize {
        let Some(device) = self.device.upgrade() else {
            return 0;
        };
        let protocol = device.protocol();
        let mut observed = self.observed.lock();
        for p in device.parameters() {
            if observed.iter().any(|(w, _)| w.as_ptr() == Arc::as_ptr(&p)) {
                continue;
            }
            if protocol.observe_quietly(&p, true) {
                observed.push((p.downgrade(), true));
            } else if protocol.observe(&p, true) {
                observed.push((p.downgrade(), false));
            } else {
                trace!(address = %p.address(), "[QUE] protocol refused observation");
            }
        }
        debug!(observed = observed.len(), "[QUE] global queue observing");
        observed.len()
    }

    pub fn try_dequeue(&self) -> Option<ReceivedValue> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for GlobalMessageQueue {
    fn drop(&mut self) {
        let Some(device) = self.device.upgrade() else {
            return;
        };
        device.signals().message.remove(self.handle);
        let protocol = device.protocol();
        for (p, quiet) in self.observed.get_mut().drain(..) {
            let Some(p) = p.upgrade() else { continue };
            if quiet {
                protocol.observe_quietly(&p, false);
            } else if p.callback_count() == 0 {
                // parameter callbacks keep their own observation
                protocol.observe(&p, false);
            }
        }
    }
}
