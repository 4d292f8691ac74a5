//! VM-level scenarios: the heap and collector, multi-dimensional array
//! views, monitors guarding field access, and the atomic number operations.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dvm::jvm::mem::{value_as_int, Value};
use dvm::jvm::Vm;

#[test]
fn multi_dimensional_array_views_share_storage() {
    let vm = Vm::new();
    let array_obj = vm.heap().make_array("int", vec![3, 3]);
    let array = array_obj.as_array().unwrap();

    // every element starts out null
    for i in 0..3 {
        for j in 0..3 {
            let row = array.view(i).unwrap();
            assert!(matches!(row.get(j).unwrap(), Value::Uninit));
        }
    }

    for i in 0..3 {
        for j in 0..3 {
            array
                .view(i)
                .unwrap()
                .set(j, Value::Word((i * 3 + j + 1) as u32))
                .unwrap();
        }
    }

    // read back through views, bump through the view, verify via the parent
    for i in 0..3 {
        let row = array.view(i).unwrap();
        for j in 0..3 {
            let seen = value_as_int(&row.get(j).unwrap()).unwrap();
            assert_eq!(seen, i * 3 + j + 1);
            row.set(j, Value::Word((seen + 0x10) as u32)).unwrap();
        }
    }
    for i in 0..3 {
        let row = array.view(i).unwrap();
        for j in 0..3 {
            assert_eq!(value_as_int(&row.get(j).unwrap()).unwrap(), i * 3 + j + 0x11);
        }
    }

    vm.shutdown();
}

#[test]
fn collector_reclaims_unreferenced_objects() {
    let vm = Vm::new();
    let heap = vm.heap();

    let baseline = heap.tracked_count();
    let cycles_before = heap.cycles();

    for i in 0..50 {
        // allocated and immediately unreferenced from any root
        let _ = heap.make_number(i);
    }
    assert_eq!(heap.tracked_count(), baseline + 50);

    heap.request_collect();

    let deadline = Instant::now() + Duration::from_secs(5);
    while heap.cycles() == cycles_before {
        assert!(Instant::now() < deadline, "collector never ran");
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(heap.cycles(), cycles_before + 1);
    // the 50 numbers are gone; rooted runtime objects survive
    assert!(heap.tracked_count() <= baseline);

    vm.shutdown();
}

#[test]
fn monitor_serializes_field_access() {
    let vm = Vm::new();
    let class = vm.registry.get_or_load("java.lang.Object").unwrap();
    let obj = vm.make_instance(&class).unwrap();

    obj.monitor().enter();
    obj.set_field("value", Value::Word(42)).unwrap();

    let other = {
        let obj = obj.clone();
        thread::spawn(move || {
            // blocks until the owner releases the monitor
            obj.set_field("value", Value::Word(43)).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert_eq!(value_as_int(&obj.get_field("value").unwrap()).unwrap(), 42);
    obj.set_field("value", Value::Word(2)).unwrap();
    obj.monitor().exit().unwrap();

    other.join().unwrap();
    assert_eq!(value_as_int(&obj.get_field("value").unwrap()).unwrap(), 43);

    vm.shutdown();
}

#[test]
fn wait_and_notify_hand_off_a_value() {
    let vm = Vm::new();
    let class = vm.registry.get_or_load("java.lang.Object").unwrap();
    let obj = vm.make_instance(&class).unwrap();
    obj.set_field("counter", Value::Word(0)).unwrap();

    let waiter = {
        let obj = obj.clone();
        thread::spawn(move || {
            obj.monitor().enter();
            loop {
                let seen = value_as_int(&obj.get_field("counter").unwrap()).unwrap();
                if seen == 42 {
                    obj.monitor().exit().unwrap();
                    return seen;
                }
                obj.monitor().wait(0).unwrap();
            }
        })
    };

    thread::sleep(Duration::from_millis(500));
    obj.monitor().enter();
    obj.set_field("counter", Value::Word(42)).unwrap();
    obj.monitor().notify_all();
    obj.monitor().exit().unwrap();

    assert_eq!(waiter.join().unwrap(), 42);
    vm.shutdown();
}

#[test]
fn compare_and_set_law() {
    use std::sync::atomic::Ordering;

    let vm = Vm::new();
    let number = vm.heap().make_number(7);
    let bits = number.number().unwrap();

    let swapped = bits
        .compare_exchange(7, 99, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok();
    assert!(swapped);
    assert_eq!(bits.load(Ordering::SeqCst), 99);

    let swapped = bits
        .compare_exchange(7, 123, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok();
    assert!(!swapped);
    assert_eq!(bits.load(Ordering::SeqCst), 99);

    vm.shutdown();
}

#[test]
fn instances_are_seeded_with_superclass_fields() {
    let vm = Vm::new();
    // NullPointerException declares nothing itself; `message` comes from
    // Throwable at the root of its chain
    let class = vm
        .registry
        .get_or_load("java.lang.NullPointerException")
        .unwrap();
    let obj = vm.make_instance(&class).unwrap();

    assert!(matches!(obj.get_field("message"), Ok(Value::Uninit)));
    assert!(obj.get_field("no_such_field").is_err());

    assert!(vm
        .registry
        .is_assignable("java.lang.NullPointerException", "java.lang.RuntimeException"));
    assert!(vm
        .registry
        .is_assignable("java.lang.NullPointerException", "java.lang.Throwable"));
    assert!(!vm
        .registry
        .is_assignable("java.lang.Throwable", "java.lang.NullPointerException"));

    vm.shutdown();
}

#[test]
fn exception_objects_carry_their_message() {
    let vm = Vm::new();
    let thrown = vm.exception_object("java.lang.ArithmeticException", "divide by zero");

    assert_eq!(
        thrown.class_name().as_deref(),
        Some("java.lang.ArithmeticException")
    );
    match thrown.get_field("message").unwrap() {
        Value::Ref(message) => assert_eq!(message.as_str(), Some("divide by zero")),
        other => panic!("message field holds {:?}", other),
    }

    vm.shutdown();
}

#[test]
fn interned_strings_are_shared() {
    let vm = Vm::new();
    let a = vm.intern_string("hello");
    let b = vm.intern_string("hello");
    let c = vm.intern_string("other");

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(a.as_str(), Some("hello"));

    vm.shutdown();
}
