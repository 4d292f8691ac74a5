//! End-to-end interpreter tests over hand-assembled containers. Programs are
//! written as 16-bit code units, little-endian, exactly as a container would
//! deliver them.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::class::AccessFlags;
use crate::dex::{ClassDef, CodeItem, DexFile, EncodedField, EncodedMethod, FieldId, MethodId, Proto, RawTry};
use crate::jvm::interp;
use crate::jvm::thread::JThread;
use crate::jvm::error::VmError;
use crate::jvm::Vm;

fn units(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[derive(Clone, Default)]
struct SharedOut(Arc<Mutex<Vec<u8>>>);

impl SharedOut {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedOut {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn captured_vm() -> (Arc<Vm>, SharedOut) {
    let vm = Vm::new();
    let out = SharedOut::default();
    vm.set_out(Box::new(out.clone()));
    (vm, out)
}

/// A container holding one class with a `main([Ljava/lang/String;)V` plus
/// pool entries for `Integer.parseInt`, `PrintStream.println(I)` and
/// `System.out`.
fn program_container(class: &str, registers: u16, insns: Vec<u8>, tries: Vec<RawTry>) -> DexFile {
    let class_desc = format!("L{};", class);
    DexFile {
        name: format!("test:{}", class),
        strings: vec![
            "main".to_string(),     // 0
            "parseInt".to_string(), // 1
            "println".to_string(),  // 2
            "out".to_string(),      // 3
        ],
        types: vec![
            class_desc,                                     // 0
            "[Ljava/lang/String;".to_string(),              // 1
            "Ljava/lang/String;".to_string(),               // 2
            "I".to_string(),                                // 3
            "V".to_string(),                                // 4
            "Ljava/lang/Integer;".to_string(),              // 5
            "Ljava/io/PrintStream;".to_string(),            // 6
            "Ljava/lang/System;".to_string(),               // 7
            "Ljava/lang/Object;".to_string(),               // 8
            "Ljava/lang/ArithmeticException;".to_string(),  // 9
        ],
        protos: vec![
            Proto {
                shorty: String::new(),
                return_type: "V".to_string(),
                params: vec!["[Ljava/lang/String;".to_string()],
            },
            Proto {
                shorty: String::new(),
                return_type: "I".to_string(),
                params: vec!["Ljava/lang/String;".to_string()],
            },
            Proto {
                shorty: String::new(),
                return_type: "V".to_string(),
                params: vec!["I".to_string()],
            },
        ],
        fields: vec![FieldId {
            class_idx: 7,
            type_idx: 6,
            name_idx: 3,
        }],
        methods: vec![
            MethodId {
                class_idx: 0,
                proto_idx: 0,
                name_idx: 0,
            }, // 0: <class>.main
            MethodId {
                class_idx: 5,
                proto_idx: 1,
                name_idx: 1,
            }, // 1: Integer.parseInt
            MethodId {
                class_idx: 6,
                proto_idx: 2,
                name_idx: 2,
            }, // 2: PrintStream.println(I)
        ],
        classes: vec![ClassDef {
            type_idx: 0,
            access: AccessFlags::PUBLIC.bits(),
            superclass_idx: Some(8),
            direct_methods: vec![EncodedMethod {
                method_idx: 0,
                access: (AccessFlags::PUBLIC | AccessFlags::STATIC).bits(),
                code: Some(CodeItem {
                    registers,
                    insns,
                    tries,
                }),
            }],
            ..ClassDef::default()
        }],
    }
}

#[test]
fn add_program_prints_sum() {
    // main(String[] args): println(parseInt(args[0]) + parseInt(args[1]))
    let insns = units(&[
        0x0012, // const/4 v0, #0
        0x0146, 0x0005, // aget-object v1, v5, v0
        0x1071, 0x0001, 0x0001, // invoke-static {v1}, Integer.parseInt
        0x020a, // move-result v2
        0x1012, // const/4 v0, #1
        0x0146, 0x0005, // aget-object v1, v5, v0
        0x1071, 0x0001, 0x0001, // invoke-static {v1}, Integer.parseInt
        0x030a, // move-result v3
        0x32b0, // add-int/2addr v2, v3
        0x0062, 0x0000, // sget-object v0, System.out
        0x206e, 0x0002, 0x0020, // invoke-virtual {v0, v2}, println(I)
        0x000e, // return-void
    ]);

    let (vm, out) = captured_vm();
    vm.registry
        .add_container(program_container("Add", 6, insns, vec![]));

    vm.run_main("Add", &["5".to_string(), "10".to_string()])
        .unwrap();
    assert_eq!(out.text(), "15\n");
}

#[test]
fn fibonacci_program_prints_first_ten() {
    let insns = units(&[
        0x0012, // const/4 v0, #0        (a)
        0x1112, // const/4 v1, #1        (b)
        0x0212, // const/4 v2, #0        (i)
        0x0313, 0x000a, // const/16 v3, #10
        // loop:
        0x3235, 0x000e, // if-ge v2, v3, +14 -> end
        0x0462, 0x0000, // sget-object v4, System.out
        0x206e, 0x0002, 0x0004, // invoke-virtual {v4, v0}, println(I)
        0x0590, 0x0100, // add-int v5, v0, v1
        0x1001, // move v0, v1
        0x5101, // move v1, v5
        0x02d8, 0x0102, // add-int/lit8 v2, v2, #1
        0xf328, // goto -13 -> loop
        // end:
        0x000e, // return-void
    ]);

    let (vm, out) = captured_vm();
    vm.registry
        .add_container(program_container("Fibonacci", 7, insns, vec![]));

    vm.run_main("Fibonacci", &[]).unwrap();
    assert_eq!(out.text(), "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
}

#[test]
fn arithmetic_exception_is_caught_by_handler() {
    // try { v2 = 5 / 0; println(v2) } catch (ArithmeticException e) { println(-1) }
    let insns = units(&[
        0x5012, // const/4 v0, #5
        0x0112, // const/4 v1, #0
        0x0293, 0x0100, // div-int v2, v0, v1      <- covered by the try range
        0x0062, 0x0000, // sget-object v0, System.out
        0x206e, 0x0002, 0x0020, // invoke-virtual {v0, v2}, println(I)
        0x0928, // goto +9 -> ret
        // handler:
        0x020d, // move-exception v2
        0x0213, 0xffff, // const/16 v2, #-1
        0x0062, 0x0000, // sget-object v0, System.out
        0x206e, 0x0002, 0x0020, // invoke-virtual {v0, v2}, println(I)
        // ret:
        0x000e, // return-void
    ]);

    let tries = vec![RawTry {
        start_addr: 2,
        insn_count: 2,
        handlers: vec![(9, 10)], // ArithmeticException -> unit 10
        catch_all_addr: None,
    }];

    let (vm, out) = captured_vm();
    vm.registry
        .add_container(program_container("Catcher", 4, insns, tries));

    vm.run_main("Catcher", &[]).unwrap();
    assert_eq!(out.text(), "-1\n");
}

#[test]
fn uncaught_exception_stops_the_thread() {
    let insns = units(&[
        0x1012, // const/4 v0, #1
        0x0112, // const/4 v1, #0
        0x0293, 0x0100, // div-int v2, v0, v1
        0x000e, // return-void
    ]);

    let (vm, _out) = captured_vm();
    vm.registry
        .add_container(program_container("Boom", 4, insns, vec![]));

    match vm.run_main("Boom", &[]) {
        Err(VmError::UncaughtException { class, .. }) => {
            assert_eq!(class, "java.lang.ArithmeticException");
        }
        other => panic!("expected an uncaught exception, got {:?}", other.map(|_| ())),
    }
}

/// A container with a `<clinit>` that increments a static counter; the
/// rewind-and-retry protocol must run it exactly once no matter how many
/// static reads trigger it.
#[test]
fn clinit_runs_exactly_once() {
    let clinit = units(&[
        0x0060, 0x0000, // sget v0, seed
        0x00d8, 0x0100, // add-int/lit8 v0, v0, #1
        0x0067, 0x0000, // sput v0, seed
        0x000e, // return-void
    ]);
    let main = units(&[
        0x0060, 0x0000, // sget v0, seed   (triggers <clinit>)
        0x0160, 0x0000, // sget v1, seed
        0x000e, // return-void
    ]);

    let dex = DexFile {
        name: "test:WithInit".to_string(),
        strings: vec![
            "main".to_string(),
            "<clinit>".to_string(),
            "seed".to_string(),
        ],
        types: vec![
            "LWithInit;".to_string(),          // 0
            "[Ljava/lang/String;".to_string(), // 1
            "I".to_string(),                   // 2
            "V".to_string(),                   // 3
            "Ljava/lang/Object;".to_string(),  // 4
        ],
        protos: vec![
            Proto {
                shorty: String::new(),
                return_type: "V".to_string(),
                params: vec!["[Ljava/lang/String;".to_string()],
            },
            Proto {
                shorty: String::new(),
                return_type: "V".to_string(),
                params: vec![],
            },
        ],
        fields: vec![FieldId {
            class_idx: 0,
            type_idx: 2,
            name_idx: 2,
        }],
        methods: vec![
            MethodId {
                class_idx: 0,
                proto_idx: 0,
                name_idx: 0,
            },
            MethodId {
                class_idx: 0,
                proto_idx: 1,
                name_idx: 1,
            },
        ],
        classes: vec![ClassDef {
            type_idx: 0,
            access: AccessFlags::PUBLIC.bits(),
            superclass_idx: Some(4),
            static_fields: vec![EncodedField {
                field_idx: 0,
                access: (AccessFlags::PUBLIC | AccessFlags::STATIC).bits(),
            }],
            direct_methods: vec![
                EncodedMethod {
                    method_idx: 0,
                    access: (AccessFlags::PUBLIC | AccessFlags::STATIC).bits(),
                    code: Some(CodeItem {
                        registers: 2,
                        insns: main,
                        tries: vec![],
                    }),
                },
                EncodedMethod {
                    method_idx: 1,
                    access: (AccessFlags::PUBLIC | AccessFlags::STATIC).bits(),
                    code: Some(CodeItem {
                        registers: 1,
                        insns: clinit,
                        tries: vec![],
                    }),
                },
            ],
            ..ClassDef::default()
        }],
    };

    let (vm, _out) = captured_vm();
    vm.registry.add_container(dex);
    vm.run_main("WithInit", &[]).unwrap();

    let class = vm.registry.get("WithInit").unwrap();
    assert!(class.is_static_initialized());
    let seed = class.get_static("seed").unwrap();
    assert_eq!(crate::jvm::mem::value_as_int(&seed).unwrap(), 1);
}

// Single-step checks against a throwaway frame

fn stepping_vm(registers: u16, insns: Vec<u8>) -> (Arc<Vm>, JThread) {
    let vm = Vm::new();
    let dex = DexFile {
        name: "test:step".to_string(),
        strings: vec!["f".to_string()],
        types: vec![
            "LStep;".to_string(),
            "V".to_string(),
            "Ljava/lang/Object;".to_string(),
            "[I".to_string(),
        ],
        protos: vec![Proto {
            shorty: String::new(),
            return_type: "V".to_string(),
            params: vec![],
        }],
        fields: vec![],
        methods: vec![MethodId {
            class_idx: 0,
            proto_idx: 0,
            name_idx: 0,
        }],
        classes: vec![ClassDef {
            type_idx: 0,
            access: AccessFlags::PUBLIC.bits(),
            superclass_idx: Some(2),
            direct_methods: vec![EncodedMethod {
                method_idx: 0,
                access: (AccessFlags::PUBLIC | AccessFlags::STATIC).bits(),
                code: Some(CodeItem {
                    registers,
                    insns,
                    tries: vec![],
                }),
            }],
            ..ClassDef::default()
        }],
    };
    vm.registry.add_container(dex);

    let class = vm.registry.get_or_load("Step").unwrap();
    let method = class.method("f", "()V").unwrap();
    let mut thread = JThread::new(vm.clone(), "step");
    thread.push_frame(method).unwrap();
    (vm, thread)
}

#[test]
fn const_high16_shifts_the_literal() {
    // const/high16 v0, #0x12340000
    let insns = units(&[0x0015, 0x1234, 0x000e]);
    let (vm, mut thread) = stepping_vm(1, insns);

    interp::step(&vm, &mut thread).unwrap();
    let frame = thread.current_frame().unwrap();
    assert_eq!(frame.get_int(0).unwrap() as u32, 0x1234_0000);
    assert_eq!(frame.pc, 4);
}

#[test]
fn if_eq_branches_when_both_registers_are_null() {
    // if-eq v0, v1, +2 ; return-void ; return-void
    let insns = units(&[0x1032, 0x0002, 0x000e, 0x000e]);
    let (vm, mut thread) = stepping_vm(3, insns);

    interp::step(&vm, &mut thread).unwrap();
    // both null: the branch is taken to the second return-void
    assert_eq!(thread.current_frame().unwrap().pc, 4);
}

#[test]
fn if_eq_falls_through_for_null_against_non_null() {
    let insns = units(&[0x1032, 0x0002, 0x000e, 0x000e]);
    let (vm, mut thread) = stepping_vm(3, insns);

    let text = vm.intern_string("x");
    thread.current_frame().unwrap().set_obj(0, text).unwrap();
    interp::step(&vm, &mut thread).unwrap();
    // one null, one non-null: falls through past the 4-byte branch
    assert_eq!(thread.current_frame().unwrap().pc, 4);
}

#[test]
fn branch_target_differs_between_taken_and_not_taken() {
    // Same comparison but with a farther target so the two outcomes land on
    // different pcs
    let insns = units(&[0x1032, 0x0003, 0x000e, 0x000e, 0x000e]);

    // not taken
    let (vm, mut thread) = stepping_vm(3, insns.clone());
    let text = vm.intern_string("x");
    thread.current_frame().unwrap().set_obj(0, text).unwrap();
    interp::step(&vm, &mut thread).unwrap();
    assert_eq!(thread.current_frame().unwrap().pc, 4);

    // taken
    let (vm, mut thread) = stepping_vm(3, insns);
    interp::step(&vm, &mut thread).unwrap();
    assert_eq!(thread.current_frame().unwrap().pc, 6);
}

#[test]
fn executing_an_unassigned_opcode_is_fatal() {
    let insns = units(&[0x003e]);
    let (vm, mut thread) = stepping_vm(1, insns);

    match interp::step(&vm, &mut thread) {
        Err(VmError::UnknownOpcode { opcode, .. }) => assert_eq!(opcode, 0x3e),
        other => panic!("expected an unknown-opcode error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn negative_array_size_raises() {
    // const/4 v0, #-1 ; new-array v1, v0, [I
    let insns = units(&[0xf012, 0x0123, 0x0003, 0x000e]);
    let (vm, mut thread) = stepping_vm(2, insns);

    interp::step(&vm, &mut thread).unwrap();
    match interp::step(&vm, &mut thread) {
        Err(VmError::UncaughtException { class, .. }) => {
            assert_eq!(class, "java.lang.NegativeArraySizeException");
        }
        other => panic!("expected a raised exception, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn array_access_through_null_raises() {
    // const/4 v0, #0 ; aget v1, v2, v0 with v2 untouched (null)
    let insns = units(&[0x0012, 0x0144, 0x0002, 0x000e]);
    let (vm, mut thread) = stepping_vm(3, insns);

    interp::step(&vm, &mut thread).unwrap();
    match interp::step(&vm, &mut thread) {
        Err(VmError::UncaughtException { class, .. }) => {
            assert_eq!(class, "java.lang.NullPointerException");
        }
        other => panic!("expected a null pointer exception, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn interpreter_advance_matches_disassembler_length() {
    use crate::instruction::dis;

    // const/16 v0 ; add-int v0, v0, v0 ; return-void
    let insns = units(&[0x0013, 0x0007, 0x0090, 0x0000, 0x000e]);
    let (vm, mut thread) = stepping_vm(1, insns.clone());

    let mut pc = 0usize;
    for _ in 0..2 {
        let (_, len) = dis::disassemble(&insns, pc).unwrap();
        interp::step(&vm, &mut thread).unwrap();
        pc += len as usize;
        assert_eq!(thread.current_frame().unwrap().pc as usize, pc);
    }
}
