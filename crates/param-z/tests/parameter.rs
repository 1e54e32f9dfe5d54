//! Parameter writes, attributes and the node tree.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use param_z::domain::{BoundingMode, Domain, DomainKind, ScalarDomain, VecDomain, make_domain};
use param_z::parameter::{AccessMode, Attribute, RepetitionFilter};
use param_z::prelude::*;

fn device() -> Device {
    DeviceBuilder::new("test").build().unwrap()
}

fn counter(parameter: &Parameter) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    parameter.add_callback(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[test]
fn round_trip_of_matching_type() {
    let device = device();
    let p = device.create_parameter("/osc/freq", ValueType::Float).unwrap();
    assert_eq!(p.value(), Value::Float(0.0));
    p.set_value(440.0);
    assert_eq!(p.value(), Value::Float(440.0));
    assert_eq!(p.previous_value(), Value::Float(0.0));
    assert_eq!(p.address(), "/osc/freq");
}

#[test]
fn writes_of_another_type_are_converted() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    p.set_value(2.7);
    assert_eq!(p.value(), Value::Int(2));
    p.set_value("12");
    assert_eq!(p.value(), Value::Int(12));
    p.set_value(true);
    assert_eq!(p.value(), Value::Int(1));
}

#[test]
fn invalid_writes_are_dropped() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let calls = counter(&p);
    p.set_value(7);
    p.set_value(Value::Invalid);
    assert_eq!(p.value(), Value::Int(7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn impulse_recommits_the_current_value() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    p.set_value(5);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    p.add_callback(move |v| s.lock().unwrap().push(v.clone()));
    p.set_value(Impulse);
    assert_eq!(p.value().as_int(), Some(5));
    assert_eq!(seen.lock().unwrap().as_slice(), &[Value::Int(5)]);
}

#[test]
fn domain_bounds_and_rejects() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    p.set_domain(Domain::Int(ScalarDomain::new(0, 10)))
        .set_bounding(BoundingMode::Wrap);
    p.set_value(12);
    assert_eq!(p.value(), Value::Int(2));

    p.set_domain(Domain::Int(ScalarDomain::default().with_values([1, 3, 5])))
        .set_bounding(BoundingMode::Clip);
    p.set_value(3);
    p.set_value(4);
    assert_eq!(p.value(), Value::Int(3));
}

#[test]
fn set_domain_is_converted_to_the_declared_type() {
    let device = device();
    let p = device.create_parameter("/f", ValueType::Float).unwrap();
    p.set_domain(make_domain(&Value::Int(0), &Value::Int(1)))
        .set_bounding(BoundingMode::Clip);
    assert!(matches!(p.domain(), Domain::Float(_)));
    p.set_value(3.5);
    assert_eq!(p.value(), Value::Float(1.0));
}

#[test]
fn repetition_filter_suppresses_identical_writes() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    p.set_repetition_filter(RepetitionFilter::On);
    let calls = counter(&p);
    p.set_value(3);
    p.set_value(3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(p.value(), Value::Int(3));
    assert!(p.filter_value(&Value::Int(3)));
    assert!(!p.filter_value(&Value::Int(4)));

    p.set_repetition_filter(RepetitionFilter::Off);
    p.set_value(3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn muted_and_disabled_commit_silently() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let calls = counter(&p);
    p.set_muted(true);
    p.set_value(1);
    assert_eq!(p.value(), Value::Int(1));
    assert!(p.filter_value(&Value::Int(2)));
    p.set_muted(false).set_disabled(true);
    p.set_value(2);
    assert_eq!(p.value(), Value::Int(2));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn quiet_writes_skip_callbacks() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let calls = counter(&p);
    p.set_value_quiet(9);
    assert_eq!(p.value(), Value::Int(9));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn bool_parameters_keep_their_bounding_mode() {
    let device = device();
    let p = device.create_parameter("/on", ValueType::Bool).unwrap();
    let before = p.bounding();
    p.set_bounding(BoundingMode::Wrap);
    assert_eq!(p.bounding(), before);
}

#[test]
fn set_value_type_resets_and_converts() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    p.set_domain(Domain::Int(ScalarDomain::new(0, 10)));
    p.set_value(4);
    p.set_value_type(ValueType::Float);
    assert_eq!(p.value(), Value::Float(0.0));
    assert_eq!(p.domain().max(), Value::Float(10.0));
}

#[test]
fn callbacks_may_read_the_parameter() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let (s, weak) = (Arc::clone(&seen), p.downgrade());
    p.add_callback(move |_| {
        if let Some(p) = weak.upgrade() {
            *s.lock().unwrap() = Some(p.value());
        }
    });
    p.set_value(6);
    assert_eq!(*seen.lock().unwrap(), Some(Value::Int(6)));
}

#[test]
fn removed_callbacks_stop_firing() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let handle = p.add_callback(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    p.set_value(1);
    assert!(p.remove_callback(handle));
    assert!(!p.remove_callback(handle));
    p.set_value(2);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(p.callback_count(), 0);
}

#[test]
fn attribute_changes_are_announced_once() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let changes = Arc::new(Mutex::new(Vec::new()));
    let c = Arc::clone(&changes);
    device
        .signals()
        .attribute_modified
        .add(move |change: &param_z::device::AttributeChange| {
            c.lock().unwrap().push((change.address.clone(), change.attribute));
        });

    p.set_unit(Some("Hz".into()));
    p.set_unit(Some("Hz".into()));
    p.set_access(AccessMode::Get);
    p.set_value(3);

    assert_eq!(
        changes.lock().unwrap().as_slice(),
        &[
            ("/n".to_owned(), Attribute::Unit),
            ("/n".to_owned(), Attribute::Access),
        ]
    );
}

#[test]
fn snapshot_carries_attributes() {
    let device = device();
    let p = device.create_parameter("/gain", ValueType::Float).unwrap();
    p.set_domain(make_domain(&0.0.into(), &1.0.into()))
        .set_bounding(BoundingMode::Clip)
        .set_description(Some("output gain".into()))
        .set_value(0.25);
    let data = p.to_data();
    assert_eq!(data.address, "/gain");
    assert_eq!(data.value, Value::Float(0.25));
    assert_eq!(data.value_type, ValueType::Float);
    assert_eq!(data.bounding, BoundingMode::Clip);
    assert_eq!(data.description.as_deref(), Some("output gain"));
    let domain = data.domain.expect("domain");
    assert_eq!(domain.kind, DomainKind::Float);
    assert_eq!(domain.max, vec![Value::Float(1.0)]);
}

#[test]
fn snapshot_domains_keep_per_component_sets() {
    let device = device();
    let p = device.create_parameter("/pan", ValueType::Vec2f).unwrap();
    let mut domain = VecDomain::<2>::new([-1.0, 0.0], [1.0, 1.0]);
    domain.values[1] = vec![0.0, 0.5, 1.0];
    p.set_domain(Domain::Vec2f(domain)).set_bounding(BoundingMode::Clip);

    let wire = p.to_data().domain.expect("domain");
    assert_eq!(Domain::from(wire), p.domain());
}

#[test]
fn node_names_are_sanitised_and_deduplicated() {
    let device = device();
    let root = device.root();
    let a = root.create_child("my gain").unwrap();
    let b = root.create_child("my gain").unwrap();
    assert_eq!(a.name(), "my_gain");
    assert_eq!(b.name(), "my_gain.1");
    assert_eq!(b.address(), "/my_gain.1");
    assert!(Arc::ptr_eq(&root.find_or_create_child("my_gain").unwrap(), &a));
    assert_eq!(device.create_node("/my_gain").unwrap().name(), "my_gain.2");
}

#[test]
fn lookup_distinguishes_missing_nodes() {
    let device = device();
    device.create_parameter("/a/b", ValueType::Int).unwrap();
    assert!(device.find_node("/a").is_some());
    assert!(device.find_parameter("/a").is_none());
    assert!(device.find_parameter("/a/b").is_some());
    assert!(device.find_parameter("test:/a/b").is_some());
    assert!(matches!(device.remove_node("/nope"), Err(Error::NotFound(_))));
    assert!(matches!(
        device.create_parameter("/", ValueType::Int),
        Err(Error::InvalidAddress(_))
    ));
}

#[test]
fn creating_a_parameter_twice_retypes_it() {
    let device = device();
    let first = device.create_parameter("/x", ValueType::Int).unwrap();
    let second = device.create_parameter("/x", ValueType::String).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.value_type(), ValueType::String);
}

#[test]
fn wildcard_resolver_finds_patterns() {
    let device = DeviceBuilder::new("test")
        .with_resolver(param_z::address::WildcardResolver)
        .build()
        .unwrap();
    for address in ["/ch/1/gain", "/ch/2/gain", "/ch/2/pan", "/master/gain"] {
        device.create_parameter(address, ValueType::Float).unwrap();
    }
    assert_eq!(device.find_nodes("/ch/*/gain").len(), 2);
    assert_eq!(device.find_nodes("/**/gain").len(), 3);
    assert_eq!(device.find_nodes("/ch/2/pan").len(), 1);
}

#[test]
fn removing_a_node_tears_down_its_subtree() {
    let device = device();
    let p = device.create_parameter("/fx/reverb/mix", ValueType::Float).unwrap();
    device.create_parameter("/fx/delay", ValueType::Float).unwrap();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let r = Arc::clone(&removed);
    device
        .signals()
        .parameter_removing
        .add(move |p: &Parameter| r.lock().unwrap().push(p.address()));
    let calls = counter(&p);

    device.remove_node("/fx").unwrap();

    let mut removed = removed.lock().unwrap().clone();
    removed.sort();
    assert_eq!(removed, vec!["/fx/delay".to_owned(), "/fx/reverb/mix".to_owned()]);
    assert!(device.find_node("/fx").is_none());
    assert_eq!(p.callback_count(), 0);
    p.set_value(0.5);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn concurrent_writers_leave_one_of_their_values() {
    let device = device();
    let p = device.create_parameter("/n", ValueType::Int).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let p = Arc::clone(&p);
            std::thread::spawn(move || {
                for i in 0..250 {
                    p.set_value(t * 1000 + i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let last = p.value().as_int().unwrap();
    assert_eq!(last % 1000, 249);
}
