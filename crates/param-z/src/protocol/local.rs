//! In-process protocol: there is no remote side, so every operation
//! succeeds against the local tree.

use std::sync::OnceLock;

use tracing::{trace, warn};

use super::Protocol;
use crate::device::WeakDevice;
use crate::node::Node;
use crate::parameter::{FullParameterData, Parameter};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct LocalProtocol {
    device: OnceLock<WeakDevice>,
}

impl Protocol for LocalProtocol {
    fn pull(&self, _parameter: &Parameter) -> bool {
        true
    }

    fn push(&self, parameter: &Parameter, value: &Value) -> bool {
        trace!(address = %parameter.address(), %value, "[LOC] push");
        true
    }

    /// Writes the value into the addressed parameter.
    fn push_raw(&self, data: &FullParameterData) -> bool {
        let parameter = self
            .device
            .get()
            .and_then(WeakDevice::upgrade)
            .and_then(|d| d.find_parameter(&data.address));
        match parameter {
            Some(p) => {
                p.set_value(data.value.clone());
                true
            }
            None => {
                trace!(address = %data.address, "[LOC] push_raw to unknown address");
                false
            }
        }
    }

    fn observe(&self, _parameter: &Parameter, _enable: bool) -> bool {
        true
    }

    fn update(&self, _node: &Node) -> bool {
        true
    }

    fn set_device(&self, device: WeakDevice) {
        if self.device.set(device).is_err() {
            warn!("[LOC] protocol already attached to a device");
        }
    }
}
