//! Synthetic `java.lang` classes: Object, Class, String, StringBuilder,
//! System, Integer, Long, Math, Thread and the throwable hierarchy.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::class::builder::ClassBuilder;
use crate::class::AccessFlags;
use crate::jvm::error::{number_format, Throw, VmError};
use crate::jvm::mem::{object_eq, Value};
use crate::jvm::Vm;
use crate::runtime::{arg_double, arg_int, arg_long, arg_obj, arg_str, render};

const PUBLIC: AccessFlags = AccessFlags::PUBLIC;

fn static_flags() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::STATIC
}

pub fn register(vm: &Arc<Vm>) {
    register_object(vm);
    register_class(vm);
    register_string(vm);
    register_string_builder(vm);
    register_throwables(vm);
    register_system(vm);
    register_integer(vm);
    register_long(vm);
    register_math(vm);
    register_thread(vm);
}

fn register_object(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Object");
    builder.clear_superclass();

    builder.add_method("<init>", "()V", PUBLIC, Arc::new(|_, _, _| Ok(())));

    builder.add_virtual_method(
        "hashCode",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let this = arg_obj(args, 0, "hashCode")?;
            frame.set_return_int(this.identity_hash());
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "equals",
        "(Ljava/lang/Object;)Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let this = arg_obj(args, 0, "equals")?;
            let other = arg_obj(args, 1, "equals")?;
            frame.set_return_int(object_eq(&this, &other) as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "toString",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "toString")?;
            let text = render(&this);
            frame.set_return_obj(vm.heap().make_string(&text));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "getClass",
        "()Ljava/lang/Class;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "getClass")?;
            let name = this
                .class_name()
                .unwrap_or_else(|| "java.lang.Object".to_string());
            frame.set_return_obj(vm.class_mirror(&name));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "wait",
        "()V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let this = arg_obj(args, 0, "wait")?;
            this.monitor().wait(0)
        }),
    );

    builder.add_virtual_method(
        "wait",
        "(J)V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let this = arg_obj(args, 0, "wait")?;
            let timeout = arg_long(args, 1)?;
            this.monitor().wait(timeout)
        }),
    );

    builder.add_virtual_method(
        "notify",
        "()V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let this = arg_obj(args, 0, "notify")?;
            this.monitor().notify_one();
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "notifyAll",
        "()V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let this = arg_obj(args, 0, "notifyAll")?;
            this.monitor().notify_all();
            Ok(())
        }),
    );

    builder.finalize();
}

fn register_class(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Class");

    builder.add_virtual_method(
        "getName",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "getName")?;
            let target = this.mirror_target().unwrap_or_default().to_string();
            frame.set_return_obj(vm.heap().make_string(&target));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "getSimpleName",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "getSimpleName")?;
            let target = this.mirror_target().unwrap_or_default();
            let simple = target.rsplit('.').next().unwrap_or(target);
            frame.set_return_obj(vm.heap().make_string(simple));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "toString",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "toString")?;
            let text = format!("class {}", this.mirror_target().unwrap_or_default());
            frame.set_return_obj(vm.heap().make_string(&text));
            Ok(())
        }),
    );

    builder.finalize();
}

fn register_string(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "String");
    builder.add_field("value", "Ljava/lang/Object;", false);

    builder.add_method("<init>", "()V", PUBLIC, Arc::new(|_, _, _| Ok(())));

    builder.add_virtual_method(
        "length",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let text = arg_str(args, 0, "length")?;
            frame.set_return_int(text.chars().count() as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "isEmpty",
        "()Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let text = arg_str(args, 0, "isEmpty")?;
            frame.set_return_int(text.is_empty() as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "charAt",
        "(I)C",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let text = arg_str(args, 0, "charAt")?;
            let index = arg_int(args, 1)?;
            match text.chars().nth(index.max(0) as usize) {
                Some(c) if index >= 0 => {
                    frame.set_return_int(c as u32 as u16 as i32);
                    Ok(())
                }
                _ => Err(crate::jvm::error::array_bounds(
                    index,
                    text.chars().count() as u32,
                )),
            }
        }),
    );

    builder.add_virtual_method(
        "hashCode",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let text = arg_str(args, 0, "hashCode")?;
            let mut hash = 0i32;
            for unit in text.encode_utf16() {
                hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
            }
            frame.set_return_int(hash);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "equals",
        "(Ljava/lang/Object;)Z",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let this = arg_obj(args, 0, "equals")?;
            let other = arg_obj(args, 1, "equals")?;
            frame.set_return_int(object_eq(&this, &other) as i32);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "toString",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let this = arg_obj(args, 0, "toString")?;
            frame.set_return_obj(this);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "concat",
        "(Ljava/lang/String;)Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let text = arg_str(args, 0, "concat")?;
            let tail = arg_str(args, 1, "concat")?;
            frame.set_return_obj(vm.heap().make_string(&format!("{}{}", text, tail)));
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "substring",
        "(II)Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let text = arg_str(args, 0, "substring")?;
            let begin = arg_int(args, 1)?;
            let end = arg_int(args, 2)?;
            let chars: Vec<char> = text.chars().collect();
            if begin < 0 || end < begin || end as usize > chars.len() {
                return Err(crate::jvm::error::array_bounds(end, chars.len() as u32));
            }
            let slice: String = chars[begin as usize..end as usize].iter().collect();
            frame.set_return_obj(vm.heap().make_string(&slice));
            Ok(())
        }),
    );

    builder.add_method(
        "valueOf",
        "(I)Ljava/lang/String;",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_int(args, 0)?;
            frame.set_return_obj(vm.heap().make_string(&value.to_string()));
            Ok(())
        }),
    );

    builder.finalize();
}

/// Build one `StringBuilder.append` overload: render the argument, extend
/// the held text, and return the builder for chaining.
fn append_with(render_arg: fn(&Arc<Vm>, &[Value]) -> Result<String, Throw>) -> crate::class::HostFn {
    Arc::new(move |vm, frame, args| {
        let this = arg_obj(args, 0, "append")?;
        let current = match this.get_field("value")? {
            Value::Ref(text) => text.as_str().unwrap_or_default().to_string(),
            _ => String::new(),
        };
        let tail = render_arg(vm, args)?;
        this.set_field(
            "value",
            Value::Ref(vm.heap().make_string(&format!("{}{}", current, tail))),
        )?;
        frame.set_return_obj(this);
        Ok(())
    })
}

fn register_string_builder(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "StringBuilder");
    builder.add_field("value", "Ljava/lang/String;", false);

    builder.add_method(
        "<init>",
        "()V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            this.set_field("value", Value::Ref(vm.heap().make_string("")))
        }),
    );

    builder.add_method(
        "<init>",
        "(Ljava/lang/String;)V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            let seed = arg_str(args, 1, "<init>")?;
            this.set_field("value", Value::Ref(vm.heap().make_string(&seed)))
        }),
    );

    builder.add_virtual_method(
        "append",
        "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| {
            let obj = arg_obj(args, 1, "append")?;
            Ok(render(&obj))
        }),
    );
    builder.add_virtual_method(
        "append",
        "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| {
            let obj = arg_obj(args, 1, "append")?;
            Ok(render(&obj))
        }),
    );
    builder.add_virtual_method(
        "append",
        "(I)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| Ok(arg_int(args, 1)?.to_string())),
    );
    builder.add_virtual_method(
        "append",
        "(J)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| Ok(arg_long(args, 1)?.to_string())),
    );
    builder.add_virtual_method(
        "append",
        "(Z)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| {
            Ok(if arg_int(args, 1)? != 0 { "true" } else { "false" }.to_string())
        }),
    );
    builder.add_virtual_method(
        "append",
        "(C)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| {
            let c = arg_int(args, 1)? as u32;
            Ok(std::char::from_u32(c).unwrap_or('\u{fffd}').to_string())
        }),
    );
    builder.add_virtual_method(
        "append",
        "(D)Ljava/lang/StringBuilder;",
        PUBLIC,
        append_with(|_, args| Ok(format!("{:?}", arg_double(args, 1)?))),
    );

    builder.add_virtual_method(
        "toString",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "toString")?;
            match this.get_field("value")? {
                Value::Ref(text) => frame.set_return_obj(text),
                _ => frame.set_return_obj(vm.heap().make_string("")),
            }
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "length",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let this = arg_obj(args, 0, "length")?;
            let length = match this.get_field("value")? {
                Value::Ref(text) => text.as_str().map(|s| s.chars().count()).unwrap_or(0),
                _ => 0,
            };
            frame.set_return_int(length as i32);
            Ok(())
        }),
    );

    builder.finalize();
}

fn register_throwables(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Throwable");
    builder.add_field("message", "Ljava/lang/String;", false);

    builder.add_method("<init>", "()V", PUBLIC, Arc::new(|_, _, _| Ok(())));

    builder.add_method(
        "<init>",
        "(Ljava/lang/String;)V",
        PUBLIC,
        Arc::new(|_, _, args| {
            let this = arg_obj(args, 0, "<init>")?;
            let message = arg_obj(args, 1, "<init>")?;
            this.set_field("message", Value::Ref(message))
        }),
    );

    builder.add_virtual_method(
        "getMessage",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "getMessage")?;
            match this.get_field("message")? {
                Value::Ref(message) => frame.set_return_obj(message),
                _ => frame.set_return_obj(vm.heap().null()),
            }
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "toString",
        "()Ljava/lang/String;",
        PUBLIC,
        Arc::new(|vm, frame, args| {
            let this = arg_obj(args, 0, "toString")?;
            frame.set_return_obj(vm.heap().make_string(&render(&this)));
            Ok(())
        }),
    );

    builder.finalize();

    // The exception kinds the interpreter raises, each an empty subclass
    // inheriting Throwable's constructors through the superclass walk
    let hierarchy: &[(&str, &str)] = &[
        ("Exception", "java.lang.Throwable"),
        ("Error", "java.lang.Throwable"),
        ("RuntimeException", "java.lang.Exception"),
        ("NullPointerException", "java.lang.RuntimeException"),
        ("ArithmeticException", "java.lang.RuntimeException"),
        ("ClassCastException", "java.lang.RuntimeException"),
        ("IndexOutOfBoundsException", "java.lang.RuntimeException"),
        ("ArrayIndexOutOfBoundsException", "java.lang.IndexOutOfBoundsException"),
        ("NegativeArraySizeException", "java.lang.RuntimeException"),
        ("IllegalArgumentException", "java.lang.RuntimeException"),
        ("NumberFormatException", "java.lang.IllegalArgumentException"),
        ("IllegalMonitorStateException", "java.lang.RuntimeException"),
        ("InterruptedException", "java.lang.Exception"),
        ("NoSuchFieldException", "java.lang.Exception"),
        ("OutOfMemoryError", "java.lang.Error"),
        ("NoClassDefFoundError", "java.lang.Error"),
        ("NoSuchMethodError", "java.lang.Error"),
        ("VerifyError", "java.lang.Error"),
        ("ExceptionInInitializerError", "java.lang.Error"),
    ];

    for (name, superclass) in hierarchy {
        let mut builder = ClassBuilder::new(&vm.registry, "java.lang", name);
        builder.set_superclass(superclass);
        builder.finalize();
    }
}

fn register_system(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "System");
    builder.add_field("out", "Ljava/io/PrintStream;", true);
    builder.add_field("err", "Ljava/io/PrintStream;", true);

    builder.add_method(
        "loadLibrary",
        "(Ljava/lang/String;)V",
        static_flags(),
        Arc::new(|vm, _, args| {
            let name = arg_str(args, 0, "loadLibrary")?;
            vm.natives
                .load_library_by_name(&name)
                .map_err(Throw::Fatal)
        }),
    );

    builder.add_method(
        "currentTimeMillis",
        "()J",
        static_flags(),
        Arc::new(|vm, frame, _| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO);
            frame.set_return_obj(vm.heap().make_number(now.as_millis() as i64));
            Ok(())
        }),
    );

    builder.add_method(
        "nanoTime",
        "()J",
        static_flags(),
        Arc::new(|vm, frame, _| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO);
            frame.set_return_obj(vm.heap().make_number(now.as_nanos() as i64));
            Ok(())
        }),
    );

    builder.add_method(
        "identityHashCode",
        "(Ljava/lang/Object;)I",
        static_flags(),
        Arc::new(|_, frame, args| {
            let obj = arg_obj(args, 0, "identityHashCode")?;
            let hash = if obj.is_null() { 0 } else { obj.identity_hash() };
            frame.set_return_int(hash);
            Ok(())
        }),
    );

    builder.add_method(
        "arraycopy",
        "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        static_flags(),
        Arc::new(|_, _, args| {
            let src = arg_obj(args, 0, "arraycopy")?;
            let src_pos = arg_int(args, 1)?;
            let dst = arg_obj(args, 2, "arraycopy")?;
            let dst_pos = arg_int(args, 3)?;
            let count = arg_int(args, 4)?;

            let src = src.as_array().ok_or_else(|| {
                Throw::Fatal(VmError::TypeMismatch("arraycopy source is not an array".into()))
            })?;
            let dst = dst.as_array().ok_or_else(|| {
                Throw::Fatal(VmError::TypeMismatch(
                    "arraycopy destination is not an array".into(),
                ))
            })?;

            for offset in 0..count {
                let value = src.get(src_pos + offset)?;
                dst.set(dst_pos + offset, value)?;
            }
            Ok(())
        }),
    );

    let class = builder.finalize();

    // Standard streams are instances of the synthetic PrintStream
    crate::runtime::io::register_print_stream(vm);
    if let Ok(stream_class) = vm.registry.get_or_load("java.io.PrintStream") {
        if let Ok(out) = vm.make_instance(&stream_class) {
            let _ = out.set_field("target", Value::Word(0));
            class.set_static("out", Value::Ref(out));
        }
        if let Ok(err) = vm.make_instance(&stream_class) {
            let _ = err.set_field("target", Value::Word(1));
            class.set_static("err", Value::Ref(err));
        }
    }
}

fn register_integer(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Integer");
    builder.add_field("value", "I", false);
    builder.add_field("MIN_VALUE", "I", true);
    builder.add_field("MAX_VALUE", "I", true);

    builder.add_method(
        "parseInt",
        "(Ljava/lang/String;)I",
        static_flags(),
        Arc::new(|_, frame, args| {
            let text = arg_str(args, 0, "parseInt")?;
            let value = text
                .parse::<i32>()
                .map_err(|_| number_format(format!("For input string: \"{}\"", text)))?;
            frame.set_return_int(value);
            Ok(())
        }),
    );

    builder.add_method(
        "toString",
        "(I)Ljava/lang/String;",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_int(args, 0)?;
            frame.set_return_obj(vm.heap().make_string(&value.to_string()));
            Ok(())
        }),
    );

    builder.add_method(
        "valueOf",
        "(I)Ljava/lang/Integer;",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let class = vm
                .registry
                .get_or_load("java.lang.Integer")
                .map_err(Throw::Fatal)?;
            let boxed = vm.make_instance(&class).map_err(Throw::Fatal)?;
            boxed.set_field("value", Value::Word(arg_int(args, 0)? as u32))?;
            frame.set_return_obj(boxed);
            Ok(())
        }),
    );

    builder.add_virtual_method(
        "intValue",
        "()I",
        PUBLIC,
        Arc::new(|_, frame, args| {
            let this = arg_obj(args, 0, "intValue")?;
            frame.set_return_int(crate::jvm::mem::value_as_int(&this.get_field("value")?)?);
            Ok(())
        }),
    );

    let class = builder.finalize();
    class.set_static("MIN_VALUE", Value::Word(i32::MIN as u32));
    class.set_static("MAX_VALUE", Value::Word(i32::MAX as u32));
}

fn register_long(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Long");
    builder.add_field("value", "J", false);

    builder.add_method(
        "parseLong",
        "(Ljava/lang/String;)J",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let text = arg_str(args, 0, "parseLong")?;
            let value = text
                .parse::<i64>()
                .map_err(|_| number_format(format!("For input string: \"{}\"", text)))?;
            frame.set_return_obj(vm.heap().make_number(value));
            Ok(())
        }),
    );

    builder.add_method(
        "toString",
        "(J)Ljava/lang/String;",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_long(args, 0)?;
            frame.set_return_obj(vm.heap().make_string(&value.to_string()));
            Ok(())
        }),
    );

    builder.finalize();
}

fn register_math(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Math");

    builder.add_method(
        "abs",
        "(I)I",
        static_flags(),
        Arc::new(|_, frame, args| {
            frame.set_return_int(arg_int(args, 0)?.wrapping_abs());
            Ok(())
        }),
    );

    builder.add_method(
        "abs",
        "(J)J",
        static_flags(),
        Arc::new(|vm, frame, args| {
            frame.set_return_obj(vm.heap().make_number(arg_long(args, 0)?.wrapping_abs()));
            Ok(())
        }),
    );

    builder.add_method(
        "abs",
        "(D)D",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_double(args, 0)?.abs();
            frame.set_return_obj(vm.heap().make_number(value.to_bits() as i64));
            Ok(())
        }),
    );

    builder.add_method(
        "max",
        "(II)I",
        static_flags(),
        Arc::new(|_, frame, args| {
            frame.set_return_int(arg_int(args, 0)?.max(arg_int(args, 1)?));
            Ok(())
        }),
    );

    builder.add_method(
        "min",
        "(II)I",
        static_flags(),
        Arc::new(|_, frame, args| {
            frame.set_return_int(arg_int(args, 0)?.min(arg_int(args, 1)?));
            Ok(())
        }),
    );

    builder.add_method(
        "sqrt",
        "(D)D",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_double(args, 0)?.sqrt();
            frame.set_return_obj(vm.heap().make_number(value.to_bits() as i64));
            Ok(())
        }),
    );

    builder.add_method(
        "pow",
        "(DD)D",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_double(args, 0)?.powf(arg_double(args, 2)?);
            frame.set_return_obj(vm.heap().make_number(value.to_bits() as i64));
            Ok(())
        }),
    );

    builder.add_method(
        "floor",
        "(D)D",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_double(args, 0)?.floor();
            frame.set_return_obj(vm.heap().make_number(value.to_bits() as i64));
            Ok(())
        }),
    );

    builder.add_method(
        "ceil",
        "(D)D",
        static_flags(),
        Arc::new(|vm, frame, args| {
            let value = arg_double(args, 0)?.ceil();
            frame.set_return_obj(vm.heap().make_number(value.to_bits() as i64));
            Ok(())
        }),
    );

    builder.finalize();
}

fn register_thread(vm: &Arc<Vm>) {
    let mut builder = ClassBuilder::new(&vm.registry, "java.lang", "Thread");
    builder.add_field("name", "Ljava/lang/String;", false);

    builder.add_method("<init>", "()V", PUBLIC, Arc::new(|_, _, _| Ok(())));

    builder.add_virtual_method(
        "start",
        "()V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "start")?;
            vm.spawn_java_thread(this)
        }),
    );

    // Default run() does nothing; subclasses override it
    builder.add_virtual_method("run", "()V", PUBLIC, Arc::new(|_, _, _| Ok(())));

    builder.add_virtual_method(
        "join",
        "()V",
        PUBLIC,
        Arc::new(|vm, _, args| {
            let this = arg_obj(args, 0, "join")?;
            vm.join_java_thread(&this);
            Ok(())
        }),
    );

    builder.add_method(
        "sleep",
        "(J)V",
        static_flags(),
        Arc::new(|_, _, args| {
            let millis = arg_long(args, 0)?;
            if millis < 0 {
                return Err(crate::jvm::error::illegal_argument("timeout value is negative"));
            }
            std::thread::sleep(Duration::from_millis(millis as u64));
            Ok(())
        }),
    );

    builder.finalize();
}
