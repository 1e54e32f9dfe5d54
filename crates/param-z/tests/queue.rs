//! Cross-thread delivery queues.

use std::sync::Arc;
use std::time::{Duration, Instant};

use param_z::prelude::*;

fn device() -> Device {
    DeviceBuilder::new("rt").build().unwrap()
}

#[test]
fn registered_writes_are_delivered_in_order() {
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    let queue = MessageQueue::new(&device);
    assert!(queue.try_dequeue().is_none());

    queue.register(&p);
    for i in 0..5 {
        p.set_value(i);
    }
    let drained: Vec<Value> = std::iter::from_fn(|| queue.try_dequeue())
        .map(|m| m.value)
        .collect();
    assert_eq!(drained, (0..5).map(Value::Int).collect::<Vec<_>>());
    assert!(queue.is_empty());
}

#[test]
fn entries_identify_their_parameter() {
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    let queue = MessageQueue::new(&device);
    queue.register(&p);
    p.set_value(1);
    let msg = queue.try_dequeue().unwrap();
    assert_eq!(msg.id, p.id());
    assert!(Arc::ptr_eq(&msg.parameter().unwrap(), &p));
}

#[test]
fn registration_is_reference_counted() {
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    let queue = MessageQueue::new(&device);

    queue.register(&p);
    queue.register(&p);
    assert_eq!(queue.registrations(&p), 2);
    assert_eq!(p.callback_count(), 1);

    queue.unregister(&p);
    p.set_value(1);
    assert_eq!(queue.len(), 1);

    queue.unregister(&p);
    assert_eq!(queue.registrations(&p), 0);
    assert_eq!(p.callback_count(), 0);
    p.set_value(2);
    assert_eq!(queue.len(), 1);

    // unregistering an unknown parameter is a no-op
    queue.unregister(&p);
}

#[test]
fn quiet_writes_only_reach_the_global_queue() {
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    let queue = MessageQueue::new(&device);
    let global = GlobalMessageQueue::new(&device);
    queue.register(&p);

    p.set_value_quiet(3);
    assert!(queue.try_dequeue().is_none());
    assert_eq!(global.try_dequeue().map(|m| m.value), Some(Value::Int(3)));
}

#[test]
fn global_queue_sees_every_parameter() {
    let device = device();
    let a = device.create_parameter("/a", ValueType::Int).unwrap();
    let b = device.create_parameter("/b", ValueType::String).unwrap();
    let global = GlobalMessageQueue::new(&device);
    a.set_value(1);
    b.set_value("x");
    assert_eq!(global.len(), 2);
    let first = global.try_dequeue().unwrap();
    assert_eq!(first.parameter().unwrap().address(), "/a");
    drop(global);
    a.set_value(2);
}

#[test]
fn removed_parameters_are_unregistered() {
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    let queue = MessageQueue::new(&device);
    queue.register(&p);
    p.set_value(1);

    device.remove_node("/x").unwrap();
    assert_eq!(queue.registrations(&p), 0);
    drop(p);

    // the entry enqueued before removal is still safe to drain
    let msg = queue.try_dequeue().unwrap();
    assert_eq!(msg.value, Value::Int(1));
    assert!(msg.parameter().is_none());
}

#[test]
fn dropping_the_queue_removes_its_callbacks() {
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    {
        let queue = MessageQueue::new(&device);
        queue.register(&p);
        assert_eq!(p.callback_count(), 1);
    }
    assert_eq!(p.callback_count(), 0);
    assert!(device.signals().parameter_removing.is_empty());
}

#[test]
fn no_loss_or_duplication_across_threads() {
    const N: i32 = 10_000;
    let device = device();
    let p = device.create_parameter("/x", ValueType::Int).unwrap();
    let queue = MessageQueue::new(&device);
    queue.register(&p);

    let producer = {
        let p = Arc::clone(&p);
        std::thread::spawn(move || {
            for i in 0..N {
                p.set_value(i);
            }
        })
    };

    let mut received = Vec::with_capacity(N as usize);
    let deadline = Instant::now() + Duration::from_secs(30);
    while received.len() < N as usize && Instant::now() < deadline {
        match queue.try_dequeue() {
            Some(msg) => received.push(msg.value.as_int().unwrap()),
            None => std::thread::yield_now(),
        }
    }
    producer.join().unwrap();

    assert_eq!(received, (0..N).collect::<Vec<_>>());
    assert!(queue.try_dequeue().is_none());
}
