//! Parameter attribute types and the serializable parameter snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::domain::{BoundingMode, WireDomain};
use crate::value::{Value, ValueType};

/// Process-unique parameter identity. Never reused, so it stays a valid
/// lookup key after the parameter it named is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId(u64);

impl ParameterId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ParameterId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ParameterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum AccessMode {
    /// Read-only: remote writes are refused.
    #[strum(to_string = "read", serialize = "get")]
    #[serde(rename = "read", alias = "get")]
    Get,
    /// Write-only: pulls are refused.
    #[strum(to_string = "write", serialize = "set")]
    #[serde(rename = "write", alias = "set")]
    Set,
    #[default]
    #[strum(to_string = "read-write", serialize = "bi")]
    #[serde(rename = "read-write", alias = "bi")]
    Bi,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        self != AccessMode::Set
    }

    pub fn writable(self) -> bool {
        self != AccessMode::Get
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RepetitionFilter {
    #[default]
    Off,
    On,
}

/// Names of the attributes whose changes are announced through
/// `on_attribute_modified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Attribute {
    #[strum(serialize = "type")]
    ValueType,
    #[strum(serialize = "access")]
    Access,
    #[strum(serialize = "domain")]
    Domain,
    #[strum(serialize = "bounding")]
    Bounding,
    #[strum(serialize = "repetition_filter")]
    RepetitionFilter,
    #[strum(serialize = "unit")]
    Unit,
    #[strum(serialize = "description")]
    Description,
    #[strum(serialize = "critical")]
    Critical,
    #[strum(serialize = "disabled")]
    Disabled,
    #[strum(serialize = "muted")]
    Muted,
}

/// Snapshot of a parameter: its address, current value and attributes.
///
/// This is what servers publish for namespace queries and what
/// `Protocol::push_raw` accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullParameterData {
    pub address: String,
    pub value: Value,
    pub value_type: ValueType,
    #[serde(default)]
    pub access: AccessMode,
    #[serde(default)]
    pub bounding: BoundingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<WireDomain>,
    #[serde(default)]
    pub repetition_filter: RepetitionFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub critical: bool,
}

impl FullParameterData {
    /// A bare address/value pair with default attributes.
    pub fn new(address: impl Into<String>, value: Value) -> Self {
        let value_type = value.value_type().unwrap_or(ValueType::Impulse);
        Self {
            address: address.into(),
            value,
            value_type,
            access: AccessMode::default(),
            bounding: BoundingMode::default(),
            domain: None,
            repetition_filter: RepetitionFilter::default(),
            unit: None,
            description: None,
            critical: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ParameterId::next();
        let b = ParameterId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn access_names() {
        assert_eq!(AccessMode::Get.to_string(), "read");
        assert_eq!("read-write".parse::<AccessMode>().ok(), Some(AccessMode::Bi));
        assert_eq!("set".parse::<AccessMode>().ok(), Some(AccessMode::Set));
        assert!(!AccessMode::Set.readable());
        assert!(!AccessMode::Get.writable());
    }

    #[test]
    fn attribute_names() {
        assert_eq!(Attribute::ValueType.to_string(), "type");
        assert_eq!(Attribute::RepetitionFilter.to_string(), "repetition_filter");
    }

    #[test]
    fn snapshot_json_defaults() {
        let json = r#"{"address":"/a","value":{"type":"int","value":3},"value_type":"int"}"#;
        let data: FullParameterData = serde_json::from_str(json).unwrap();
        assert_eq!(data, FullParameterData::new("/a", Value::Int(3)));
        assert_eq!(data.access, AccessMode::Bi);
    }
}
