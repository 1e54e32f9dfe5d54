//! YAML presets: snapshots of parameter values.
//!
//! ```yaml
//! /**:
//!   parameters:
//!     /mixer/gain: 0.5
//!
//! /synth:
//!   parameters:
//!     /osc/freq: 440.0
//!     /osc/wave: "saw"
//!     /osc/detune: [0.1, -0.1]
//! ```
//!
//! Section selectors match `/{device_name}`: `/**` matches every device,
//! `/name` one device. Later sections override earlier ones.
//!
//! When a preset creates a parameter its type is inferred from the YAML
//! value: integers that fit in 32 bits become `int`, other numbers
//! `float`, sequences `list`, and `null` an impulse. Values applied to an
//! existing parameter are converted to its declared type.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value as Yaml};
use tracing::{debug, warn};

use crate::address::selector_matches;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::value::{Value, ValueType};

const PARAMETERS_KEY: &str = "parameters";

/// Address → value, ordered by address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preset {
    values: BTreeMap<String, Value>,
}

impl Preset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: impl Into<String>, value: Value) {
        self.values.insert(address.into(), value);
    }

    pub fn get(&self, address: &str) -> Option<&Value> {
        self.values.get(address)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(a, v)| (a.as_str(), v))
    }

    /// Writes every value into `device` with notifying sets. Missing
    /// parameters are created when `create` is set and skipped otherwise.
    /// Returns how many parameters were written.
    pub fn apply(&self, device: &Device, create: bool) -> usize {
        let mut applied = 0;
        for (address, value) in &self.values {
            let parameter = match device.find_parameter(address) {
                Some(p) => p,
                None if create => {
                    let value_type = value.value_type().unwrap_or(ValueType::Impulse);
                    match device.create_parameter(address, value_type) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(%address, "[PST] cannot create parameter: {e}");
                            continue;
                        }
                    }
                }
                None => {
                    debug!(%address, "[PST] no parameter, skipped");
                    continue;
                }
            };
            parameter.set_value(value.clone());
            applied += 1;
        }
        debug!(device = %device.name(), applied, "[PST] preset applied");
        applied
    }

    /// Captures the current value of every parameter of `device`.
    pub fn capture(device: &Device) -> Self {
        let values = device
            .parameters()
            .into_iter()
            .filter_map(|p| {
                let value = p.value();
                value.valid().then(|| (p.address(), value))
            })
            .collect();
        Self { values }
    }

    /// YAML document with a single section for `device_name`.
    pub fn to_yaml(&self, device_name: &str) -> Result<String> {
        let mut parameters = Mapping::new();
        for (address, value) in &self.values {
            if let Some(yaml) = value_to_yaml(value) {
                parameters.insert(Yaml::String(address.clone()), yaml);
            }
        }
        let mut section = Mapping::new();
        section.insert(Yaml::String(PARAMETERS_KEY.to_owned()), Yaml::Mapping(parameters));
        let mut doc = Mapping::new();
        doc.insert(Yaml::String(format!("/{device_name}")), Yaml::Mapping(section));
        Ok(serde_yaml::to_string(&doc)?)
    }
}

pub fn load_preset_file(path: &Path, device_name: &str) -> Result<Preset> {
    let content = std::fs::read_to_string(path)?;
    load_preset_str(&content, device_name)
}

/// Collects the values of every section whose selector matches
/// `device_name`.
pub fn load_preset_str(yaml: &str, device_name: &str) -> Result<Preset> {
    let doc: Yaml = serde_yaml::from_str(yaml)?;
    let mapping = doc
        .as_mapping()
        .ok_or_else(|| Error::Preset("root must be a mapping".to_owned()))?;
    let target = format!("/{device_name}");

    let mut preset = Preset::new();
    for (key, section) in mapping {
        let selector = key
            .as_str()
            .ok_or_else(|| Error::Preset("selectors must be strings".to_owned()))?;
        if !selector_matches(selector, &target) {
            continue;
        }
        let section = section
            .as_mapping()
            .ok_or_else(|| Error::Preset(format!("section '{selector}' must be a mapping")))?;
        let Some(parameters) = section.get(PARAMETERS_KEY) else {
            continue;
        };
        let parameters = parameters
            .as_mapping()
            .ok_or_else(|| Error::Preset(format!("'{selector}.{PARAMETERS_KEY}' must be a mapping")))?;

        for (address, value) in parameters {
            let address = address
                .as_str()
                .ok_or_else(|| Error::Preset("addresses must be strings".to_owned()))?;
            match yaml_to_value(value) {
                Some(value) => preset.insert(address, value),
                None => warn!(%address, "[PST] unsupported value, skipped"),
            }
        }
    }
    Ok(preset)
}

/// Applies the sections of `yaml` matching the device. See [`Preset::apply`].
pub fn apply_preset(device: &Device, yaml: &str, create: bool) -> Result<usize> {
    Ok(load_preset_str(yaml, device.name())?.apply(device, create))
}

/// Dumps every parameter value of `device` as a preset document.
pub fn dump_preset(device: &Device) -> Result<String> {
    Preset::capture(device).to_yaml(device.name())
}

fn yaml_to_value(yaml: &Yaml) -> Option<Value> {
    match yaml {
        Yaml::Null => Some(Value::Impulse),
        Yaml::Bool(b) => Some(Value::Bool(*b)),
        Yaml::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::from)),
        Yaml::String(s) => Some(Value::String(s.clone())),
        Yaml::Sequence(seq) => seq
            .iter()
            .map(yaml_to_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        Yaml::Mapping(_) | Yaml::Tagged(_) => None,
    }
}

/// `f32` printed the short way, so `0.1` stays `0.1` in the document.
fn widen(f: f32) -> Yaml {
    let wide = f.to_string().parse::<f64>().unwrap_or(f64::from(f));
    Yaml::Number(wide.into())
}

fn value_to_yaml(value: &Value) -> Option<Yaml> {
    Some(match value {
        Value::Invalid => return None,
        Value::Impulse => Yaml::Null,
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Int(i) => Yaml::Number(i64::from(*i).into()),
        Value::Float(f) => widen(*f),
        Value::Char(c) => Yaml::String(c.to_string()),
        Value::String(s) => Yaml::String(s.clone()),
        Value::Vec2f(v) => Yaml::Sequence(v.iter().copied().map(widen).collect()),
        Value::Vec3f(v) => Yaml::Sequence(v.iter().copied().map(widen).collect()),
        Value::Vec4f(v) => Yaml::Sequence(v.iter().copied().map(widen).collect()),
        Value::List(items) => Yaml::Sequence(items.iter().filter_map(value_to_yaml).collect()),
    })
}
