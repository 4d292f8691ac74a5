//! Synthetic `java.io.PrintStream`. Instances carry a `target` field (0 =
//! standard output, 1 = standard error); the print family renders its
//! argument and writes through the VM's swappable streams.

use std::sync::Arc;

use crate::class::builder::ClassBuilder;
use crate::class::{AccessFlags, HostFn};
use crate::jvm::error::Throw;
use crate::jvm::mem::Value;
use crate::jvm::Vm;
use crate::runtime::{arg_double, arg_float, arg_int, arg_long, arg_obj, render};

pub fn register(vm: &Arc<Vm>) {
    register_print_stream(vm);
}

fn emit(vm: &Arc<Vm>, args: &[Value], text: &str) -> Result<(), Throw> {
    let this = arg_obj(args, 0, "print")?;
    let target = match this.get_field("target") {
        Ok(value) => crate::jvm::mem::value_as_int(&value).unwrap_or(0),
        Err(_) => 0,
    };
    if target == 1 {
        vm.write_err(text);
    } else {
        vm.write_out(text);
    }
    Ok(())
}

type Render = fn(&Arc<Vm>, &[Value]) -> Result<String, Throw>;

fn print_with(to_text: Render, newline: bool) -> HostFn {
    Arc::new(move |vm, _, args| {
        let mut text = to_text(vm, args)?;
        if newline {
            text.push('\n');
        }
        emit(vm, args, &text)
    })
}

pub fn register_print_stream(vm: &Arc<Vm>) {
    if vm.registry.get("java.io.PrintStream").is_some() {
        return;
    }

    let mut builder = ClassBuilder::new(&vm.registry, "java.io", "PrintStream");
    builder.add_field("target", "I", false);

    let renderers: &[(&str, Render)] = &[
        ("(Ljava/lang/String;)V", |_, args| {
            let obj = arg_obj(args, 1, "print")?;
            Ok(render(&obj))
        }),
        ("(Ljava/lang/Object;)V", |_, args| {
            let obj = arg_obj(args, 1, "print")?;
            Ok(render(&obj))
        }),
        ("(I)V", |_, args| Ok(arg_int(args, 1)?.to_string())),
        ("(J)V", |_, args| Ok(arg_long(args, 1)?.to_string())),
        ("(Z)V", |_, args| {
            Ok(if arg_int(args, 1)? != 0 { "true" } else { "false" }.to_string())
        }),
        ("(C)V", |_, args| {
            let c = arg_int(args, 1)? as u32;
            Ok(std::char::from_u32(c).unwrap_or('\u{fffd}').to_string())
        }),
        ("(F)V", |_, args| Ok(format!("{:?}", arg_float(args, 1)?))),
        ("(D)V", |_, args| Ok(format!("{:?}", arg_double(args, 1)?))),
    ];

    for &(signature, to_text) in renderers {
        builder.add_virtual_method(
            "print",
            signature,
            AccessFlags::PUBLIC,
            print_with(to_text, false),
        );
        builder.add_virtual_method(
            "println",
            signature,
            AccessFlags::PUBLIC,
            print_with(to_text, true),
        );
    }

    builder.add_virtual_method(
        "println",
        "()V",
        AccessFlags::PUBLIC,
        Arc::new(|vm, _, args| emit(vm, args, "\n")),
    );

    builder.finalize();
}
