//! Bytecode disassembler. Rendering goes through the same format and decode
//! tables as the interpreter, so a disassembled instruction is always exactly
//! as long as the one the interpreter executes.

use super::*;

/// Render the instruction at `pc` and report its length in bytes. `None` when
/// the opcode byte is unassigned.
pub fn disassemble(code: &[u8], pc: usize) -> Option<(String, u32)> {
    let op = Opcode::decode(*code.get(pc)?)?;
    let len = op.length();
    if pc + len as usize > code.len() {
        return None;
    }

    let name = op.mnemonic();
    let text = match op.format() {
        Format::F10x => name.to_string(),
        Format::F12x => {
            let (a, b) = decode_12x(code, pc);
            format!("{} v{}, v{}", name, a, b)
        }
        Format::F11n => {
            let (a, lit) = decode_11n(code, pc);
            format!("{} v{}, #{}", name, a, lit)
        }
        Format::F11x => format!("{} v{}", name, decode_11x(code, pc)),
        Format::F10t => format!("{} {:+}", name, decode_10t(code, pc)),
        Format::F20t => format!("{} {:+}", name, decode_20t(code, pc)),
        Format::F30t => format!("{} {:+}", name, decode_30t(code, pc)),
        Format::F22x => {
            let (a, b) = decode_22x(code, pc);
            format!("{} v{}, v{}", name, a, b)
        }
        Format::F32x => {
            let (a, b) = decode_32x(code, pc);
            format!("{} v{}, v{}", name, a, b)
        }
        Format::F21s => {
            let (a, lit) = decode_21s(code, pc);
            format!("{} v{}, #{}", name, a, lit)
        }
        Format::F21h => {
            let (a, lit) = decode_21s(code, pc);
            format!("{} v{}, #{}0000", name, a, lit)
        }
        Format::F21t => {
            let (a, off) = decode_21t(code, pc);
            format!("{} v{}, {:+}", name, a, off)
        }
        Format::F21c => {
            let (a, idx) = decode_21c(code, pc);
            format!("{} v{}, @{}", name, a, idx)
        }
        Format::F23x => {
            let (a, b, c) = decode_23x(code, pc);
            format!("{} v{}, v{}, v{}", name, a, b, c)
        }
        Format::F22b => {
            let (a, b, lit) = decode_22b(code, pc);
            format!("{} v{}, v{}, #{}", name, a, b, lit)
        }
        Format::F22t => {
            let (a, b, off) = decode_22t(code, pc);
            format!("{} v{}, v{}, {:+}", name, a, b, off)
        }
        Format::F22s => {
            let (a, b, lit) = decode_22t(code, pc);
            format!("{} v{}, v{}, #{}", name, a, b, lit)
        }
        Format::F22c => {
            let (a, b, idx) = decode_22c(code, pc);
            format!("{} v{}, v{}, @{}", name, a, b, idx)
        }
        Format::F31i => {
            let (a, lit) = decode_31i(code, pc);
            format!("{} v{}, #{}", name, a, lit)
        }
        Format::F31t => {
            let (a, off) = decode_31t(code, pc);
            format!("{} v{}, {:+}", name, a, off)
        }
        Format::F31c => {
            let (a, idx) = decode_31c(code, pc);
            format!("{} v{}, @{}", name, a, idx)
        }
        Format::F35c => {
            let (regs, idx) = decode_35c(code, pc);
            let list = regs
                .iter()
                .map(|r| format!("v{}", r))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} {{{}}}, @{}", name, list, idx)
        }
        Format::F3rc => {
            let (regs, idx) = decode_3rc(code, pc);
            match (regs.first(), regs.last()) {
                (Some(first), Some(last)) => {
                    format!("{} {{v{} .. v{}}}, @{}", name, first, last, idx)
                }
                _ => format!("{} {{}}, @{}", name, idx),
            }
        }
        Format::F51l => {
            let (a, lit) = decode_51l(code, pc);
            format!("{} v{}, #{}", name, a, lit)
        }
    };

    Some((text, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_forms() {
        let code = [
            0x12, 0x15, // const/4 v5, #1
            0x90, 0x00, 0x01, 0x02, // add-int v0, v1, v2
            0x0e, 0x00, // return-void
        ];
        let (text, len) = disassemble(&code, 0).unwrap();
        assert_eq!(text, "const/4 v5, #1");
        assert_eq!(len, 2);

        let (text, len) = disassemble(&code, 2).unwrap();
        assert_eq!(text, "add-int v0, v1, v2");
        assert_eq!(len, 4);

        let (text, _) = disassemble(&code, 6).unwrap();
        assert_eq!(text, "return-void");
    }

    #[test]
    fn rejects_unassigned_opcodes() {
        assert!(disassemble(&[0x3e, 0x00], 0).is_none());
        assert!(disassemble(&[0xff, 0x00], 0).is_none());
    }

    #[test]
    fn length_always_matches_opcode_table() {
        // Walk every assigned opcode with a zeroed operand buffer and confirm
        // the renderer agrees with the static length table.
        for byte in 0x00u16..=0xe2 {
            let op = match Opcode::decode(byte as u8) {
                Some(op) => op,
                None => continue,
            };
            let mut code = vec![0u8; 10];
            code[0] = byte as u8;
            let (_, len) = disassemble(&code, 0).unwrap();
            assert_eq!(len, op.length(), "length mismatch for {}", op.mnemonic());
        }
    }
}
