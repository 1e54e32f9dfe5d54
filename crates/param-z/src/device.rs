//! Devices: a node tree bound to a protocol.
//!
//! ```rust,ignore
//! use param_z::prelude::*;
//!
//! let device = DeviceBuilder::new("synth")
//!     .with_protocol(LocalProtocol::default())
//!     .build()?;
//! let freq = device.create_parameter("/osc/freq", ValueType::Float)?;
//! freq.set_domain(make_domain(&20.0.into(), &20_000.0.into()))
//!     .set_bounding(BoundingMode::Clip)
//!     .set_value(440.0);
//! ```

use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::Builder;
use crate::address::{self, ExactResolver, NodeResolver};
use crate::callbacks::CallbackList;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::parameter::{Attribute, Parameter};
use crate::protocol::{Completion, LocalProtocol, Protocol};
use crate::queue::ReceivedValue;
use crate::value::ValueType;

/// A non-value attribute of the parameter at `address` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub address: String,
    pub attribute: Attribute,
}

/// Structural and value notifications published by a device.
#[derive(Debug, Default)]
pub struct DeviceSignals {
    pub node_created: CallbackList<Node>,
    pub node_removing: CallbackList<Node>,
    pub parameter_created: CallbackList<Parameter>,
    pub parameter_removing: CallbackList<Parameter>,
    pub attribute_modified: CallbackList<AttributeChange>,
    /// Every committed value, quiet or not.
    pub message: CallbackList<ReceivedValue>,
}

pub(crate) struct DeviceShared {
    name: String,
    root: Arc<Node>,
    protocol: Box<dyn Protocol>,
    resolver: Box<dyn NodeResolver>,
    signals: DeviceSignals,
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        debug!(name = %self.name, "[DEV] dropping device");
        self.protocol.stop();
        self.root.teardown(Some(&self.signals));
    }
}

/// Shared handle to a device. Cloning is cheap; the tree lives until the
/// last handle is dropped.
#[derive(Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

/// Non-owning device handle held by nodes, parameters and protocols.
#[derive(Clone, Default)]
pub struct WeakDevice {
    shared: Weak<DeviceShared>,
}

impl WeakDevice {
    pub fn upgrade(&self) -> Option<Device> {
        self.shared.upgrade().map(|shared| Device { shared })
    }
}

impl std::fmt::Debug for WeakDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakDevice")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("name", &self.shared.name).finish()
    }
}

pub struct DeviceBuilder {
    name: String,
    protocol: Option<Box<dyn Protocol>>,
    resolver: Box<dyn NodeResolver>,
}

impl DeviceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: None,
            resolver: Box::new(ExactResolver),
        }
    }

    pub fn with_protocol<P: Protocol + 'static>(mut self, protocol: P) -> Self {
        self.protocol = Some(Box::new(protocol));
        self
    }

    pub fn with_boxed_protocol(mut self, protocol: Box<dyn Protocol>) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_resolver<R: NodeResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Box::new(resolver);
        self
    }
}

impl Builder for DeviceBuilder {
    type Output = Device;

    /// Without an explicit protocol the device uses a [`LocalProtocol`].
    #[tracing::instrument(name = "device_build", skip(self), fields(name = %self.name))]
    fn build(self) -> Result<Device> {
        if !address::is_valid_name(&self.name) {
            return Err(Error::InvalidAddress(self.name));
        }
        let protocol = self
            .protocol
            .unwrap_or_else(|| Box::new(LocalProtocol::default()));
        let shared = Arc::new_cyclic(|weak: &Weak<DeviceShared>| DeviceShared {
            name: self.name,
            root: Node::new_root(WeakDevice {
                shared: weak.clone(),
            }),
            protocol,
            resolver: self.resolver,
            signals: DeviceSignals::default(),
        });
        let device = Device { shared };
        device.shared.protocol.set_device(device.downgrade());
        info!(name = %device.name(), "[DEV] device ready");
        Ok(device)
    }
}

impl Device {
    /// Shorthand for a [`DeviceBuilder`] with `protocol`.
    pub fn new<P: Protocol + 'static>(name: impl Into<String>, protocol: P) -> Result<Device> {
        DeviceBuilder::new(name).with_protocol(protocol).build()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.shared.root
    }

    pub fn protocol(&self) -> &dyn Protocol {
        self.shared.protocol.as_ref()
    }

    pub fn signals(&self) -> &DeviceSignals {
        &self.shared.signals
    }

    pub fn downgrade(&self) -> WeakDevice {
        WeakDevice {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn find_node(&self, address: &str) -> Option<Arc<Node>> {
        address::find_node(self.root(), address)
    }

    /// Nodes designated by `pattern`, as understood by the device's
    /// [`NodeResolver`].
    pub fn find_nodes(&self, pattern: &str) -> Vec<Arc<Node>> {
        self.shared.resolver.resolve(self.root(), pattern)
    }

    /// Creates the node at `address`, creating missing ancestors. When the
    /// last segment already exists a sibling with a `.N` suffix is created.
    pub fn create_node(&self, address: &str) -> Result<Arc<Node>> {
        let segments = address::split_address(address)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::InvalidAddress(address.to_owned()));
        };
        let mut node = Arc::clone(self.root());
        for segment in parents {
            node = node.find_or_create_child(segment)?;
        }
        node.create_child(last)
    }

    pub fn find_or_create_node(&self, address: &str) -> Result<Arc<Node>> {
        let segments = address::split_address(address)?;
        let mut node = Arc::clone(self.root());
        for segment in segments {
            node = node.find_or_create_child(segment)?;
        }
        Ok(node)
    }

    pub fn find_parameter(&self, address: &str) -> Option<Arc<Parameter>> {
        self.find_node(address)?.parameter()
    }

    /// Finds or creates the node at `address` and attaches a parameter.
    pub fn create_parameter(&self, address: &str, value_type: ValueType) -> Result<Arc<Parameter>> {
        let node = self.find_or_create_node(address)?;
        if node.is_root() {
            return Err(Error::InvalidAddress(address.to_owned()));
        }
        Ok(node.create_parameter(value_type))
    }

    /// Removes the node at `address` and everything below it.
    pub fn remove_node(&self, address: &str) -> Result<()> {
        let node = self
            .find_node(address)
            .ok_or_else(|| Error::NotFound(address.to_owned()))?;
        let parent = node
            .parent()
            .ok_or_else(|| Error::InvalidAddress(address.to_owned()))?;
        parent.remove_child(node.name());
        Ok(())
    }

    /// Every parameter in the tree, depth first.
    pub fn parameters(&self) -> Vec<Arc<Parameter>> {
        self.root().parameters()
    }

    /// Synchronises the whole tree from the remote side.
    pub fn update(&self) -> bool {
        self.protocol().update(self.root())
    }

    pub fn update_async(&self) -> Completion {
        self.protocol().update_async(self.root())
    }
}
