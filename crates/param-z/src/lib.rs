//! # param-z: typed, bounded, observable parameter trees over Zenoh
//!
//! `param-z` models a device as a tree of named [`Node`](node::Node)s, some
//! of which carry a [`Parameter`](parameter::Parameter): a typed value with
//! an access mode, a [`Domain`](domain::Domain) of legal values and a
//! [`BoundingMode`](domain::BoundingMode) saying what happens to values
//! outside it. Every device owns a [`Protocol`](protocol::Protocol) that
//! connects its tree to the other end: nothing ([`LocalProtocol`]), or a
//! remote peer over Zenoh ([`ZProtocol`]).
//!
//! ## Getting started
//!
//! ```rust,ignore
//! use param_z::prelude::*;
//!
//! let device = DeviceBuilder::new("synth").build()?;
//! let gain = device.create_parameter("/mixer/gain", ValueType::Float)?;
//! gain.set_domain(make_domain(&0.0.into(), &1.0.into()))
//!     .set_bounding(BoundingMode::Clip);
//!
//! let queue = MessageQueue::new(&device);
//! queue.register(&gain);
//! gain.set_value(1.5);
//!
//! // on the real-time thread
//! while let Some(msg) = queue.try_dequeue() {
//!     assert_eq!(msg.value, Value::Float(1.0));
//! }
//! ```
//!
//! ## Sync and async APIs
//!
//! | Suffix | Behaviour |
//! |--------|-----------|
//! | *(none)* | Blocking, or immediate for in-process work |
//! | `_async` | Returns a [`Completion`](protocol::Completion): `.await` it or `wait()` on it |
//!
//! Only pulls and namespace updates have an async flavour; everything else
//! completes on the calling thread.
//!
//! ## Threads
//!
//! The crate spawns no threads of its own. Values written from a transport
//! thread reach callbacks on that thread; a real-time consumer drains them
//! through a [`MessageQueue`](queue::MessageQueue) instead.
//!
//! [`LocalProtocol`]: protocol::LocalProtocol
//! [`ZProtocol`]: protocol::ZProtocol

pub mod address;
pub mod callbacks;
pub mod config;
pub mod device;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod node;
pub mod parameter;
pub mod prelude;
pub mod preset;
pub mod protocol;
pub mod queue;
pub mod value;

pub use error::{Error, Result};

/// Builds a configured object, consuming the builder.
///
/// ```rust,ignore
/// use param_z::Builder;
/// let device = DeviceBuilder::new("synth").build()?;
/// ```
pub trait Builder {
    type Output;
    /// # Errors
    ///
    /// Invalid configuration, or a transport that cannot be set up (e.g.
    /// the Zenoh session could not be opened).
    fn build(self) -> Result<Self::Output>;
}
