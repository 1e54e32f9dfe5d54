//! The transport contract.
//!
//! A [`Protocol`] connects a device's tree to whatever is on the other end.
//! Every operation reports failure through its return value; none of them
//! panic or return errors. `update` may legitimately leave the tree
//! partially populated when the remote side does not answer in time.
//!
//! | Operation | Default |
//! |-----------|---------|
//! | `pull_async` | resolves with the result of `pull` |
//! | `push_current` | `push` of the committed value |
//! | `push_bundle` | every push, aggregated; `false` when empty |
//! | `push_raw_bundle` | every `push_raw`, aggregated; `false` when empty |
//! | `observe_quietly` | `false` (not supported) |
//! | `request` | nothing |
//! | `update_async` | resolves with the result of `update` |
//! | `set_device` | nothing |
//! | `stop` | nothing |

mod completion;
pub mod local;
pub mod zenoh;

use std::sync::Arc;

pub use completion::{Completer, Completion};
pub use local::LocalProtocol;
pub use self::zenoh::{ZProtocol, ZProtocolBuilder, ZRole};

use crate::device::WeakDevice;
use crate::node::Node;
use crate::parameter::{FullParameterData, Parameter};
use crate::value::Value;

pub trait Protocol: Send + Sync {
    /// Fetches the remote value into `parameter`.
    fn pull(&self, parameter: &Parameter) -> bool;

    fn pull_async(&self, parameter: &Parameter) -> Completion {
        Completion::ready(self.pull(parameter))
    }

    /// Sends `value` as the new value of `parameter`.
    fn push(&self, parameter: &Parameter, value: &Value) -> bool;

    fn push_current(&self, parameter: &Parameter) -> bool {
        self.push(parameter, &parameter.value())
    }

    /// Pushes every parameter, even after a failure. No rollback.
    fn push_bundle(&self, parameters: &[Arc<Parameter>]) -> bool {
        !parameters.is_empty()
            && parameters
                .iter()
                .fold(true, |ok, p| self.push_current(p) && ok)
    }

    /// Sends a value addressed by string, without a parameter object.
    fn push_raw(&self, data: &FullParameterData) -> bool;

    fn push_raw_bundle(&self, data: &[FullParameterData]) -> bool {
        !data.is_empty() && data.iter().fold(true, |ok, d| self.push_raw(d) && ok)
    }

    /// Starts or stops applying remote changes to `parameter` with
    /// notifying writes.
    fn observe(&self, parameter: &Parameter, enable: bool) -> bool;

    /// Like [`observe`](Self::observe) with quiet writes. Callers must
    /// check the result: `false` means the transport cannot do it.
    fn observe_quietly(&self, _parameter: &Parameter, _enable: bool) -> bool {
        false
    }

    /// Fire-and-forget request for a fresh value.
    fn request(&self, _parameter: &Parameter) {}

    /// Synchronises the structure and values of the subtree at `node`.
    fn update(&self, node: &Node) -> bool;

    fn update_async(&self, node: &Node) -> Completion {
        Completion::ready(self.update(node))
    }

    /// Called once, when the protocol is attached to its device.
    fn set_device(&self, _device: WeakDevice) {}

    /// Releases transport resources. Called when the device is dropped.
    fn stop(&self) {}
}
