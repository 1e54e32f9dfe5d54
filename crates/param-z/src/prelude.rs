//! Convenience re-exports for common param-z types.
//!
//! ```rust,ignore
//! use param_z::prelude::*;
//! ```

/// The builder trait, required to call `.build()` on any builder type.
pub use crate::Builder;

pub use crate::error::{Error, Result};

/// Values and their types.
pub use crate::value::{Impulse, Value, ValueType};

/// Domains and bounding.
pub use crate::domain::{BoundingMode, Domain, make_domain};

/// The parameter tree.
pub use crate::device::{Device, DeviceBuilder};
pub use crate::node::Node;
pub use crate::parameter::{AccessMode, FullParameterData, Parameter, RepetitionFilter};

/// Transports.
pub use crate::protocol::{
    Completion, LocalProtocol, Protocol, ZProtocol, ZProtocolBuilder, ZRole,
};

/// Cross-thread delivery.
pub use crate::queue::{GlobalMessageQueue, MessageQueue, ReceivedValue};

pub use crate::preset::{Preset, apply_preset, dump_preset};
