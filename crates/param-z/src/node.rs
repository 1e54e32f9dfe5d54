//! The address tree.
//!
//! Nodes own their children and at most one parameter. Parent and device
//! links are weak, so dropping the device tears the whole tree down.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::address::sanitize_name;
use crate::device::{Device, DeviceSignals, WeakDevice};
use crate::error::{Error, Result};
use crate::parameter::Parameter;
use crate::value::ValueType;

pub struct Node {
    name: String,
    this: Weak<Node>,
    parent: Weak<Node>,
    device: WeakDevice,
    children: RwLock<Vec<Arc<Node>>>,
    parameter: RwLock<Option<Arc<Parameter>>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address())
            .field("children", &self.children.read().len())
            .field("parameter", &self.parameter.read().is_some())
            .finish()
    }
}

impl Node {
    pub(crate) fn new_root(device: WeakDevice) -> Arc<Node> {
        Self::new(String::new(), Weak::new(), device)
    }

    fn new(name: String, parent: Weak<Node>, device: WeakDevice) -> Arc<Node> {
        Arc::new_cyclic(|this| Node {
            name,
            this: this.clone(),
            parent,
            device,
            children: RwLock::new(Vec::new()),
            parameter: RwLock::new(None),
        })
    }

    /// Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none() && self.name.is_empty()
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.upgrade()
    }

    pub fn device(&self) -> Option<Device> {
        self.device.upgrade()
    }

    /// Slash-delimited path from the root, `/` for the root itself.
    ///
    /// Computed on every call by walking parent links.
    pub fn address(&self) -> String {
        let mut names = vec![self.name.clone()];
        let mut cursor = self.parent.upgrade();
        while let Some(node) = cursor {
            if !node.name.is_empty() {
                names.push(node.name.clone());
            }
            cursor = node.parent.upgrade();
        }
        if self.name.is_empty() {
            return "/".to_owned();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    pub fn children(&self) -> Vec<Arc<Node>> {
        self.children.read().clone()
    }

    pub fn find_child(&self, name: &str) -> Option<Arc<Node>> {
        self.children
            .read()
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Creates a child. The name is sanitised and, when a sibling already
    /// uses it, suffixed `.1`, `.2`, ... until unique.
    pub fn create_child(&self, name: &str) -> Result<Arc<Node>> {
        let base = sanitize_name(name);
        if base.is_empty() {
            return Err(Error::InvalidAddress(name.to_owned()));
        }
        let child = {
            let mut children = self.children.write();
            let taken = |n: &str| children.iter().any(|c| c.name == n);
            let mut unique = base.clone();
            let mut i = 1;
            while taken(&unique) {
                unique = format!("{base}.{i}");
                i += 1;
            }
            let child = Node::new(unique, self.this.clone(), self.device.clone());
            children.push(Arc::clone(&child));
            child
        };
        self.announce_created(&child);
        Ok(child)
    }

    /// Returns the child called `name`, creating it when absent.
    pub fn find_or_create_child(&self, name: &str) -> Result<Arc<Node>> {
        let base = sanitize_name(name);
        if base.is_empty() {
            return Err(Error::InvalidAddress(name.to_owned()));
        }
        let child = {
            let mut children = self.children.write();
            if let Some(existing) = children.iter().find(|c| c.name == base) {
                return Ok(Arc::clone(existing));
            }
            let child = Node::new(base, self.this.clone(), self.device.clone());
            children.push(Arc::clone(&child));
            child
        };
        self.announce_created(&child);
        Ok(child)
    }

    fn announce_created(&self, child: &Node) {
        if let Some(device) = self.device() {
            debug!(address = %child.address(), "[DEV] node created");
            device.signals().node_created.emit(child);
        }
    }

    /// Removes and tears down the child called `name`.
    pub fn remove_child(&self, name: &str) -> bool {
        let removed = {
            let mut children = self.children.write();
            children
                .iter()
                .position(|c| c.name == name)
                .map(|i| children.remove(i))
        };
        let Some(child) = removed else {
            return false;
        };
        let device = self.device();
        child.teardown(device.as_ref().map(Device::signals));
        true
    }

    pub fn parameter(&self) -> Option<Arc<Parameter>> {
        self.parameter.read().clone()
    }

    /// Attaches a parameter of type `value_type`. A node that already has
    /// one keeps it, re-typed when the type differs.
    pub fn create_parameter(&self, value_type: ValueType) -> Arc<Parameter> {
        let (created, is_new) = {
            let mut slot = self.parameter.write();
            match slot.as_ref() {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let p = Parameter::new(self.this.clone(), self.device.clone(), value_type);
                    *slot = Some(Arc::clone(&p));
                    (p, true)
                }
            }
        };
        if !is_new {
            if created.value_type() != value_type {
                created.set_value_type(value_type);
            }
            return created;
        }
        if let Some(device) = self.device() {
            debug!(address = %self.address(), %value_type, "[DEV] parameter created");
            device.signals().parameter_created.emit(&created);
        }
        created
    }

    pub fn remove_parameter(&self) -> bool {
        let Some(parameter) = self.parameter.write().take() else {
            return false;
        };
        let device = self.device();
        Self::retire_parameter(&parameter, device.as_ref().map(Device::signals));
        true
    }

    fn retire_parameter(parameter: &Parameter, signals: Option<&DeviceSignals>) {
        if let Some(signals) = signals {
            signals.parameter_removing.emit(parameter);
        }
        parameter.teardown();
    }

    /// Depth-first teardown: announces this node, then its descendants,
    /// then retires its parameter.
    ///
    /// `signals` is passed explicitly because the device may already be
    /// unreachable through its weak handle while it is being dropped.
    pub(crate) fn teardown(&self, signals: Option<&DeviceSignals>) {
        if let Some(signals) = signals {
            signals.node_removing.emit(self);
        }
        let children = std::mem::take(&mut *self.children.write());
        for child in children {
            child.teardown(signals);
        }
        if let Some(parameter) = self.parameter.write().take() {
            Self::retire_parameter(&parameter, signals);
        }
    }

    /// Every parameter in this subtree, depth first.
    pub fn parameters(&self) -> Vec<Arc<Parameter>> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters(&self, out: &mut Vec<Arc<Parameter>>) {
        if let Some(p) = self.parameter() {
            out.push(p);
        }
        for child in self.children() {
            child.collect_parameters(out);
        }
    }
}
