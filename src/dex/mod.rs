//! DEX container reader. Parses the `dex\n03x` binary format into indexed
//! string/type/proto/field/method tables plus per-class method bytecode and
//! try/catch tables - the pre-parsed view the resolver and interpreter
//! consume. Only the sections the runtime needs are decoded; annotations,
//! debug info and static value arrays are skipped.

pub mod apk;

use std::io::{Cursor, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::class::type_name;
use crate::jvm::error::VmError;

pub const NO_INDEX: u32 = 0xffff_ffff;

#[derive(Clone, Debug)]
pub struct Proto {
    pub shorty: String,
    pub return_type: String,
    pub params: Vec<String>,
}

impl Proto {
    /// Method signature in descriptor form, e.g. `([Ljava/lang/String;)V`.
    pub fn signature(&self) -> String {
        format!("({}){}", self.params.join(""), self.return_type)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FieldId {
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MethodId {
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: u32,
}

/// One try/catch range as encoded in the container: addresses and lengths in
/// 16-bit code units relative to the method start.
#[derive(Clone, Debug)]
pub struct RawTry {
    pub start_addr: u32,
    pub insn_count: u16,
    /// `(type index, handler address)` pairs in declaration order.
    pub handlers: Vec<(u32, u32)>,
    pub catch_all_addr: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct CodeItem {
    pub registers: u16,
    pub insns: Vec<u8>,
    pub tries: Vec<RawTry>,
}

#[derive(Clone, Debug)]
pub struct EncodedMethod {
    pub method_idx: u32,
    pub access: u32,
    pub code: Option<CodeItem>,
}

#[derive(Clone, Copy, Debug)]
pub struct EncodedField {
    pub field_idx: u32,
    pub access: u32,
}

#[derive(Clone, Debug, Default)]
pub struct ClassDef {
    pub type_idx: u16,
    pub access: u32,
    pub superclass_idx: Option<u16>,
    pub interfaces: Vec<u16>,
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

/// An indexed DEX container. Fields are public so a host embedding (or a
/// test) can assemble the pre-parsed view without going through the binary
/// format.
#[derive(Debug, Default)]
pub struct DexFile {
    pub name: String,
    pub strings: Vec<String>,
    /// Type descriptors, e.g. `Ljava/lang/String;`.
    pub types: Vec<String>,
    pub protos: Vec<Proto>,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub classes: Vec<ClassDef>,
}

impl DexFile {
    pub fn parse(name: &str, data: &[u8]) -> Result<DexFile, VmError> {
        let mut reader = DexReader::new(data);
        reader.parse(name)
    }

    pub fn string(&self, idx: u32) -> Result<&str, VmError> {
        self.strings
            .get(idx as usize)
            .map(|s| s.as_str())
            .ok_or(VmError::BadPoolIndex {
                dex: 0,
                pool: "string",
                index: idx,
            })
    }

    pub fn type_desc(&self, idx: u32) -> Result<&str, VmError> {
        self.types
            .get(idx as usize)
            .map(|s| s.as_str())
            .ok_or(VmError::BadPoolIndex {
                dex: 0,
                pool: "type",
                index: idx,
            })
    }

    /// Canonical (dot-form) name of the type at `idx`.
    pub fn type_name_at(&self, idx: u32) -> Result<String, VmError> {
        Ok(type_name(self.type_desc(idx)?))
    }

    /// Resolve a method pool entry to `(class name, method name, signature)`.
    pub fn method_ref(&self, idx: u32) -> Result<(String, String, String), VmError> {
        let id = self.methods.get(idx as usize).ok_or(VmError::BadPoolIndex {
            dex: 0,
            pool: "method",
            index: idx,
        })?;
        let proto = self
            .protos
            .get(id.proto_idx as usize)
            .ok_or(VmError::BadPoolIndex {
                dex: 0,
                pool: "proto",
                index: id.proto_idx as u32,
            })?;
        Ok((
            self.type_name_at(id.class_idx as u32)?,
            self.string(id.name_idx)?.to_string(),
            proto.signature(),
        ))
    }

    /// Resolve a field pool entry to `(class name, field name, descriptor)`.
    pub fn field_ref(&self, idx: u32) -> Result<(String, String, String), VmError> {
        let id = self.fields.get(idx as usize).ok_or(VmError::BadPoolIndex {
            dex: 0,
            pool: "field",
            index: idx,
        })?;
        Ok((
            self.type_name_at(id.class_idx as u32)?,
            self.string(id.name_idx)?.to_string(),
            self.type_desc(id.type_idx as u32)?.to_string(),
        ))
    }

    /// Class definition for a canonical class name, if this container
    /// provides one.
    pub fn class_def(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|def| {
            self.type_name_at(def.type_idx as u32)
                .map(|n| n == name)
                .unwrap_or(false)
        })
    }

    /// Canonical names of every class defined by this container.
    pub fn class_names(&self) -> Vec<String> {
        self.classes
            .iter()
            .filter_map(|def| self.type_name_at(def.type_idx as u32).ok())
            .collect()
    }
}

struct DexReader<'a> {
    data: &'a [u8],
    cursor: Cursor<&'a [u8]>,
}

impl<'a> DexReader<'a> {
    fn new(data: &'a [u8]) -> DexReader<'a> {
        DexReader {
            data,
            cursor: Cursor::new(data),
        }
    }

    fn seek(&mut self, offset: u32) -> Result<(), VmError> {
        if offset as usize > self.data.len() {
            return Err(VmError::Malformed(format!(
                "offset {:#x} past end of container",
                offset
            )));
        }
        self.cursor.seek(SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, VmError> {
        Ok(self.cursor.read_u8()?)
    }

    fn u16(&mut self) -> Result<u16, VmError> {
        Ok(self.cursor.read_u16::<LittleEndian>()?)
    }

    fn u32(&mut self) -> Result<u32, VmError> {
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    fn uleb128(&mut self) -> Result<u32, VmError> {
        let mut result = 0u32;
        for shift in (0..).step_by(7) {
            if shift >= 35 {
                return Err(VmError::Malformed("uleb128 value too long".to_string()));
            }
            let byte = self.u8()?;
            result |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(result)
    }

    fn sleb128(&mut self) -> Result<i32, VmError> {
        let mut result = 0u32;
        let mut shift = 0;
        loop {
            if shift >= 35 {
                return Err(VmError::Malformed("sleb128 value too long".to_string()));
            }
            let byte = self.u8()?;
            result |= ((byte & 0x7f) as u32) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 32 && byte & 0x40 != 0 {
                    result |= !0u32 << shift;
                }
                break;
            }
        }
        Ok(result as i32)
    }

    fn parse(&mut self, name: &str) -> Result<DexFile, VmError> {
        if self.data.len() < 0x70 {
            return Err(VmError::Malformed("container too small".to_string()));
        }
        if &self.data[0..4] != b"dex\n" {
            return Err(VmError::Malformed("bad magic".to_string()));
        }

        self.seek(40)?;
        let endian_tag = self.u32()?;
        if endian_tag != 0x1234_5678 {
            return Err(VmError::Malformed(format!(
                "unsupported endian tag {:#x}",
                endian_tag
            )));
        }

        self.seek(56)?;
        let string_ids_size = self.u32()?;
        let string_ids_off = self.u32()?;
        let type_ids_size = self.u32()?;
        let type_ids_off = self.u32()?;
        let proto_ids_size = self.u32()?;
        let proto_ids_off = self.u32()?;
        let field_ids_size = self.u32()?;
        let field_ids_off = self.u32()?;
        let method_ids_size = self.u32()?;
        let method_ids_off = self.u32()?;
        let class_defs_size = self.u32()?;
        let class_defs_off = self.u32()?;

        let strings = self.read_strings(string_ids_off, string_ids_size)?;

        let mut types = Vec::with_capacity(type_ids_size as usize);
        self.seek(type_ids_off)?;
        let mut type_string_ids = Vec::with_capacity(type_ids_size as usize);
        for _ in 0..type_ids_size {
            type_string_ids.push(self.u32()?);
        }
        for idx in type_string_ids {
            let desc = strings.get(idx as usize).ok_or(VmError::BadPoolIndex {
                dex: 0,
                pool: "string",
                index: idx,
            })?;
            types.push(desc.clone());
        }

        let protos = self.read_protos(proto_ids_off, proto_ids_size, &types)?;

        let mut fields = Vec::with_capacity(field_ids_size as usize);
        self.seek(field_ids_off)?;
        for _ in 0..field_ids_size {
            fields.push(FieldId {
                class_idx: self.u16()?,
                type_idx: self.u16()?,
                name_idx: self.u32()?,
            });
        }

        let mut methods = Vec::with_capacity(method_ids_size as usize);
        self.seek(method_ids_off)?;
        for _ in 0..method_ids_size {
            methods.push(MethodId {
                class_idx: self.u16()?,
                proto_idx: self.u16()?,
                name_idx: self.u32()?,
            });
        }

        let classes = self.read_class_defs(class_defs_off, class_defs_size)?;

        Ok(DexFile {
            name: name.to_string(),
            strings,
            types,
            protos,
            fields,
            methods,
            classes,
        })
    }

    fn read_strings(&mut self, off: u32, count: u32) -> Result<Vec<String>, VmError> {
        let mut offsets = Vec::with_capacity(count as usize);
        self.seek(off)?;
        for _ in 0..count {
            offsets.push(self.u32()?);
        }

        let mut strings = Vec::with_capacity(count as usize);
        for data_off in offsets {
            self.seek(data_off)?;
            let _utf16_len = self.uleb128()?;
            let start = self.cursor.position() as usize;
            let end = self.data[start..]
                .iter()
                .position(|b| *b == 0)
                .map(|rel| start + rel)
                .ok_or_else(|| VmError::Malformed("unterminated string data".to_string()))?;

            // Strings are MUTF-8 (a.k.a. modified CESU-8)
            let text = cesu8::from_java_cesu8(&self.data[start..end])
                .map_err(|_| VmError::Malformed("invalid MUTF-8 string data".to_string()))?;
            strings.push(text.into_owned());
        }
        Ok(strings)
    }

    fn read_protos(
        &mut self,
        off: u32,
        count: u32,
        types: &[String],
    ) -> Result<Vec<Proto>, VmError> {
        struct RawProto {
            shorty_idx: u32,
            return_idx: u32,
            params_off: u32,
        }

        let mut raw = Vec::with_capacity(count as usize);
        self.seek(off)?;
        for _ in 0..count {
            raw.push(RawProto {
                shorty_idx: self.u32()?,
                return_idx: self.u32()?,
                params_off: self.u32()?,
            });
        }

        let type_at = |idx: u32| -> Result<String, VmError> {
            types
                .get(idx as usize)
                .cloned()
                .ok_or(VmError::BadPoolIndex {
                    dex: 0,
                    pool: "type",
                    index: idx,
                })
        };

        let mut protos = Vec::with_capacity(count as usize);
        for proto in raw {
            let mut params = Vec::new();
            if proto.params_off != 0 {
                self.seek(proto.params_off)?;
                let size = self.u32()?;
                let mut indices = Vec::with_capacity(size as usize);
                for _ in 0..size {
                    indices.push(self.u16()?);
                }
                for idx in indices {
                    params.push(type_at(idx as u32)?);
                }
            }

            // The shorty string itself is unused at runtime but kept for
            // diagnostics
            let shorty_idx = proto.shorty_idx;
            protos.push(Proto {
                shorty: format!("#{}", shorty_idx),
                return_type: type_at(proto.return_idx)?,
                params,
            });
        }
        Ok(protos)
    }

    fn read_class_defs(&mut self, off: u32, count: u32) -> Result<Vec<ClassDef>, VmError> {
        struct RawDef {
            class_idx: u32,
            access: u32,
            superclass_idx: u32,
            interfaces_off: u32,
            class_data_off: u32,
        }

        let mut raw = Vec::with_capacity(count as usize);
        self.seek(off)?;
        for _ in 0..count {
            let class_idx = self.u32()?;
            let access = self.u32()?;
            let superclass_idx = self.u32()?;
            let interfaces_off = self.u32()?;
            let _source_file_idx = self.u32()?;
            let _annotations_off = self.u32()?;
            let class_data_off = self.u32()?;
            let _static_values_off = self.u32()?;
            raw.push(RawDef {
                class_idx,
                access,
                superclass_idx,
                interfaces_off,
                class_data_off,
            });
        }

        let mut defs = Vec::with_capacity(count as usize);
        for def in raw {
            let mut interfaces = Vec::new();
            if def.interfaces_off != 0 {
                self.seek(def.interfaces_off)?;
                let size = self.u32()?;
                for _ in 0..size {
                    interfaces.push(self.u16()?);
                }
            }

            let mut class_def = ClassDef {
                type_idx: def.class_idx as u16,
                access: def.access,
                superclass_idx: if def.superclass_idx == NO_INDEX {
                    None
                } else {
                    Some(def.superclass_idx as u16)
                },
                interfaces,
                ..ClassDef::default()
            };

            if def.class_data_off != 0 {
                self.read_class_data(def.class_data_off, &mut class_def)?;
            }
            defs.push(class_def);
        }
        Ok(defs)
    }

    fn read_class_data(&mut self, off: u32, def: &mut ClassDef) -> Result<(), VmError> {
        self.seek(off)?;
        let static_fields = self.uleb128()?;
        let instance_fields = self.uleb128()?;
        let direct_methods = self.uleb128()?;
        let virtual_methods = self.uleb128()?;

        let mut field_idx = 0u32;
        for _ in 0..static_fields {
            field_idx += self.uleb128()?;
            let access = self.uleb128()?;
            def.static_fields.push(EncodedField { field_idx, access });
        }

        field_idx = 0;
        for _ in 0..instance_fields {
            field_idx += self.uleb128()?;
            let access = self.uleb128()?;
            def.instance_fields.push(EncodedField { field_idx, access });
        }

        // Code items live elsewhere in the data section, so gather the
        // offsets first and decode after the encoded lists are fully read
        let mut gather = |this: &mut Self, count: u32| -> Result<Vec<(u32, u32, u32)>, VmError> {
            let mut out = Vec::with_capacity(count as usize);
            let mut method_idx = 0u32;
            for _ in 0..count {
                method_idx += this.uleb128()?;
                let access = this.uleb128()?;
                let code_off = this.uleb128()?;
                out.push((method_idx, access, code_off));
            }
            Ok(out)
        };

        let direct = gather(self, direct_methods)?;
        let virt = gather(self, virtual_methods)?;

        for (method_idx, access, code_off) in direct {
            let code = self.read_code_item(code_off)?;
            def.direct_methods.push(EncodedMethod {
                method_idx,
                access,
                code,
            });
        }
        for (method_idx, access, code_off) in virt {
            let code = self.read_code_item(code_off)?;
            def.virtual_methods.push(EncodedMethod {
                method_idx,
                access,
                code,
            });
        }
        Ok(())
    }

    fn read_code_item(&mut self, off: u32) -> Result<Option<CodeItem>, VmError> {
        if off == 0 {
            return Ok(None);
        }

        self.seek(off)?;
        let registers = self.u16()?;
        let _ins_size = self.u16()?;
        let _outs_size = self.u16()?;
        let tries_size = self.u16()?;
        let _debug_info_off = self.u32()?;
        let insns_size = self.u32()?;

        let start = self.cursor.position() as usize;
        let byte_len = insns_size as usize * 2;
        if start + byte_len > self.data.len() {
            return Err(VmError::Malformed("code item past end of container".to_string()));
        }
        let insns = self.data[start..start + byte_len].to_vec();
        self.seek((start + byte_len) as u32)?;

        let mut tries = Vec::new();
        if tries_size > 0 {
            if insns_size % 2 == 1 {
                let _padding = self.u16()?;
            }

            struct RawTryEntry {
                start_addr: u32,
                insn_count: u16,
                handler_off: u16,
            }
            let mut entries = Vec::with_capacity(tries_size as usize);
            for _ in 0..tries_size {
                entries.push(RawTryEntry {
                    start_addr: self.u32()?,
                    insn_count: self.u16()?,
                    handler_off: self.u16()?,
                });
            }

            // handler_off is relative to the start of the handler list
            let handlers_base = self.cursor.position() as u32;
            let _handler_list_size = self.uleb128()?;

            for entry in entries {
                self.seek(handlers_base + entry.handler_off as u32)?;
                let size = self.sleb128()?;
                let pair_count = size.unsigned_abs();

                let mut handlers = Vec::with_capacity(pair_count as usize);
                for _ in 0..pair_count {
                    let type_idx = self.uleb128()?;
                    let addr = self.uleb128()?;
                    handlers.push((type_idx, addr));
                }
                let catch_all_addr = if size <= 0 { Some(self.uleb128()?) } else { None };

                tries.push(RawTry {
                    start_addr: entry.start_addr,
                    insn_count: entry.insn_count,
                    handlers,
                    catch_all_addr,
                });
            }
        }

        Ok(Some(CodeItem {
            registers,
            insns,
            tries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage() {
        assert!(DexFile::parse("x", &[]).is_err());
        assert!(DexFile::parse("x", &[0u8; 0x80]).is_err());
        let mut data = vec![0u8; 0x80];
        data[..4].copy_from_slice(b"dex\n");
        // bad endian tag
        assert!(DexFile::parse("x", &data).is_err());
    }

    #[test]
    fn proto_signatures() {
        let proto = Proto {
            shorty: String::new(),
            return_type: "V".to_string(),
            params: vec!["I".to_string(), "[Ljava/lang/String;".to_string()],
        };
        assert_eq!(proto.signature(), "(I[Ljava/lang/String;)V");
    }

    #[test]
    fn pool_lookups_are_range_checked() {
        let dex = DexFile {
            strings: vec!["hello".to_string()],
            ..DexFile::default()
        };
        assert_eq!(dex.string(0).unwrap(), "hello");
        assert!(dex.string(1).is_err());
        assert!(dex.method_ref(0).is_err());
        assert!(dex.field_ref(0).is_err());
    }
}
