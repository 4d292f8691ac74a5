//! `java.util.concurrent.atomic`: AtomicInteger and AtomicLong backed by a
//! Number object's 64-bit atomic payload. The strong operations are
//! sequentially consistent; the weak compare-and-set is relaxed and may fail
//! spuriously.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::class::builder::ClassBuilder;
use crate::class::AccessFlags;
use crate::jvm::error::{Throw, VmError};
use crate::jvm::mem::{ObjectRef, Value};
use crate::jvm::Vm;
use crate::runtime::{arg_int, arg_long, arg_obj};

const PUBLIC: AccessFlags = AccessFlags::PUBLIC;

pub fn register(vm: &Arc<Vm>) {
    register_atomic_integer(vm);
    register_atomic_long(vm);
}

/// The backing Number of an atomic box.
fn backing(args: &[Value], what: &str) -> Result<ObjectRef, Throw> {
    let this = arg_obj(args, 0, what)?;
    match this.get_field("value")? {
        Value::Ref(number) if number.is_number() => Ok(number),
        _ => Err(Throw::Fatal(VmError::TypeMismatch(format!(
            "{}: atomic box has no numeric backing",
            what
        )))),
    }
}

fn bits(number: &ObjectRef) -> &AtomicI64 {
    number.number().expect("checked by backing()")
}

/// 32-bit read-modify-write on the shared 64-bit payload.
fn update_int(number: &ObjectRef, f: impl Fn(i32) -> i32) -> i32 {
    let cell = bits(number);
    loop {
        let old = cell.load(Ordering::SeqCst);
        let new = f(old as i32) as i64;
        if cell
            .compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return old as i32;
        }
    }
}

fn register_atomic_integer(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.util.concurrent.atomic", "AtomicInteger");
    builder.add_field("value", "J", false);

    builder.add_method(
        "<init>",
        "()V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            this.set_field("value", Value::Ref(vm.heap().make_number(0)))
        }),
    );

    builder.add_method(
        "<init>",
        "(I)V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            let seed = arg_int(args, 1)? as i64;
            this.set_field("value", Value::Ref(vm.heap().make_number(seed)))
        }),
    );

    builder.add_virtual_method(
        "get",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "get")?;
            frame.set_return_int(bits(&number).load(Ordering::SeqCst) as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "set",
        "(I)V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let number = backing(args, "set")?;
            bits(&number).store(arg_int(args, 1)? as i64, Ordering::SeqCst);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "getAndSet",
        "(I)I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "getAndSet")?;
            let new = arg_int(args, 1)?;
            frame.set_return_int(update_int(&number, |_| new));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "getAndAdd",
        "(I)I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "getAndAdd")?;
            let delta = arg_int(args, 1)?;
            frame.set_return_int(update_int(&number, |old| old.wrapping_add(delta)));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "addAndGet",
        "(I)I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "addAndGet")?;
            let delta = arg_int(args, 1)?;
            let old = update_int(&number, |old| old.wrapping_add(delta));
            frame.set_return_int(old.wrapping_add(delta));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "incrementAndGet",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "incrementAndGet")?;
            let old = update_int(&number, |old| old.wrapping_add(1));
            frame.set_return_int(old.wrapping_add(1));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "decrementAndGet",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "decrementAndGet")?;
            let old = update_int(&number, |old| old.wrapping_sub(1));
            frame.set_return_int(old.wrapping_sub(1));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "compareAndSet",
        "(II)Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "compareAndSet")?;
            let expected = arg_int(args, 1)? as i64;
            let new = arg_int(args, 2)? as i64;
            let swapped = bits(&number)
                .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            frame.set_return_int(swapped as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "weakCompareAndSet",
        "(II)Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "weakCompareAndSet")?;
            let expected = arg_int(args, 1)? as i64;
            let new = arg_int(args, 2)? as i64;
            let swapped = bits(&number)
                .compare_exchange_weak(expected, new, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok();
            frame.set_return_int(swapped as i32);
            Ok(())
        }),
    );

    builder.finalize();
}

fn register_atomic_long(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.util.concurrent.atomic", "AtomicLong");
    builder.add_field("value", "J", false);

    builder.add_method(
        "<init>",
        "()V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            this.set_field("value", Value::Ref(vm.heap().make_number(0)))
        }),
    );

    builder.add_method(
        "<init>",
        "(J)V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            let seed = arg_long(args, 1)?;
            this.set_field("value", Value::Ref(vm.heap().make_number(seed)))
        }),
    );

    builder.add_virtual_method(
        "get",
        "()J",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let number = backing(args, "get")?;
            let value = bits(&number).load(Ordering::SeqCst);
            frame.set_return_obj(vm.heap().make_number(value));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "set",
        "(J)V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let number = backing(args, "set")?;
            bits(&number).store(arg_long(args, 1)?, Ordering::SeqCst);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "getAndSet",
        "(J)J",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let number = backing(args, "getAndSet")?;
            let old = bits(&number).swap(arg_long(args, 1)?, Ordering::SeqCst);
            frame.set_return_obj(vm.heap().make_number(old));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "getAndAdd",
        "(J)J",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let number = backing(args, "getAndAdd")?;
            let old = bits(&number).fetch_add(arg_long(args, 1)?, Ordering::SeqCst);
            frame.set_return_obj(vm.heap().make_number(old));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "addAndGet",
        "(J)J",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let number = backing(args, "addAndGet")?;
            let delta = arg_long(args, 1)?;
            let old = bits(&number).fetch_add(delta, Ordering::SeqCst);
            frame.set_return_obj(vm.heap().make_number(old.wrapping_add(delta)));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "incrementAndGet",
        "()J",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let number = backing(args, "incrementAndGet")?;
            let old = bits(&number).fetch_add(1, Ordering::SeqCst);
            frame.set_return_obj(vm.heap().make_number(old.wrapping_add(1)));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "compareAndSet",
        "(JJ)Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "compareAndSet")?;
            let expected = arg_long(args, 1)?;
            let new = arg_long(args, 3)?;
            let swapped = bits(&number)
                .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            frame.set_return_int(swapped as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "weakCompareAndSet",
        "(JJ)Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let number = backing(args, "weakCompareAndSet")?;
            let expected = arg_long(args, 1)?;
            let new = arg_long(args, 3)?;
            let swapped = bits(&number)
                .compare_exchange_weak(expected, new, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok();
            frame.set_return_int(swapped as i32);
            Ok(())
        }),
    );

    builder.finalize();
}
