#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use param_z::node::Node;
use param_z::parameter::{FullParameterData, Parameter};
use param_z::protocol::Protocol;
use param_z::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Pull(String),
    Push(String, Value),
    PushRaw(String, Value),
    Observe(String, bool),
    Request(String),
    Update(String),
}

/// Records every protocol call. `remote` stands in for the other side:
/// pulls read from it, pushes write to it.
#[derive(Clone, Default)]
pub struct RecordingProtocol {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub remote: Arc<Mutex<HashMap<String, Value>>>,
    pub fail_pushes_to: Arc<Mutex<Option<String>>>,
    pub stopped: Arc<AtomicBool>,
}

impl RecordingProtocol {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn pushes(&self) -> Vec<(String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push(a, v) => Some((a, v)),
                _ => None,
            })
            .collect()
    }

    pub fn set_remote(&self, address: &str, value: Value) {
        self.remote.lock().unwrap().insert(address.to_owned(), value);
    }

    pub fn fail_pushes_to(&self, address: &str) {
        *self.fail_pushes_to.lock().unwrap() = Some(address.to_owned());
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Protocol for RecordingProtocol {
    fn pull(&self, parameter: &Parameter) -> bool {
        let address = parameter.address();
        self.record(Call::Pull(address.clone()));
        let remote = self.remote.lock().unwrap().get(&address).cloned();
        match remote {
            Some(value) => {
                parameter.set_value(value);
                true
            }
            None => false,
        }
    }

    fn push(&self, parameter: &Parameter, value: &Value) -> bool {
        let address = parameter.address();
        self.record(Call::Push(address.clone(), value.clone()));
        if self.fail_pushes_to.lock().unwrap().as_deref() == Some(address.as_str()) {
            return false;
        }
        self.set_remote(&address, value.clone());
        true
    }

    fn push_raw(&self, data: &FullParameterData) -> bool {
        self.record(Call::PushRaw(data.address.clone(), data.value.clone()));
        true
    }

    fn observe(&self, parameter: &Parameter, enable: bool) -> bool {
        self.record(Call::Observe(parameter.address(), enable));
        true
    }

    fn request(&self, parameter: &Parameter) {
        self.record(Call::Request(parameter.address()));
    }

    fn update(&self, node: &Node) -> bool {
        self.record(Call::Update(node.address()));
        true
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
