use std::fmt;

use crate::descriptor::{FieldType, MethodDescriptor};
use crate::error::{ClassFileError, Result};
use crate::reader::{ByteReader, decode_modified_utf8};

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// One entry of the constant pool, with raw indices into the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::Fieldref { .. } => "Fieldref",
            Constant::Methodref { .. } => "Methodref",
            Constant::InterfaceMethodref { .. } => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module { .. } => "Module",
            Constant::Package { .. } => "Package",
        }
    }

    /// Long and Double take two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// Which flavour of member a `*ref` constant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRefKind {
    Field,
    Method,
    InterfaceMethod,
}

/// A Fieldref/Methodref/InterfaceMethodref with its indirections resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub kind: MemberRefKind,
    /// Internal (slash separated) name of the owning class.
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

impl MemberRef<'_> {
    /// Dotted binary name of the owning class.
    pub fn owner(&self) -> String {
        internal_to_binary(self.class_name)
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MemberRefKind::Method && self.name == "<init>"
    }

    pub fn is_method(&self) -> bool {
        matches!(
            self.kind,
            MemberRefKind::Method | MemberRefKind::InterfaceMethod
        )
    }

    pub fn field_type(&self) -> Result<FieldType> {
        FieldType::parse(self.descriptor)
    }

    pub fn method_descriptor(&self) -> Result<MethodDescriptor> {
        MethodDescriptor::parse(self.descriptor)
    }
}

/// Converts `java/util/Map$Entry` to `java.util.Map$Entry`.
pub fn internal_to_binary(name: &str) -> String {
    name.replace('/', ".")
}

/// The 1-based constant pool. Slot 0 and the upper half of wide constants are
/// unusable and stored as `None`.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u2()?;
        let mut entries: Vec<Option<Constant>> = Vec::with_capacity(count as usize);
        entries.push(None);

        let mut index: u16 = 1;
        while index < count {
            let offset = reader.position();
            let tag = reader.u1()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = reader.u2()? as usize;
                    let data_offset = reader.position();
                    let bytes = reader.bytes(len)?;
                    let text = decode_modified_utf8(bytes).ok_or(ClassFileError::Utf8 {
                        index,
                        offset: data_offset,
                    })?;
                    Constant::Utf8(text)
                }
                TAG_INTEGER => Constant::Integer(reader.u4()? as i32),
                TAG_FLOAT => Constant::Float(f32::from_bits(reader.u4()?)),
                TAG_LONG => Constant::Long(reader.u8()? as i64),
                TAG_DOUBLE => Constant::Double(f64::from_bits(reader.u8()?)),
                TAG_CLASS => Constant::Class {
                    name_index: reader.u2()?,
                },
                TAG_STRING => Constant::String {
                    string_index: reader.u2()?,
                },
                TAG_FIELDREF => Constant::Fieldref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_METHODREF => Constant::Methodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name_index: reader.u2()?,
                    descriptor_index: reader.u2()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    reference_kind: reader.u1()?,
                    reference_index: reader.u2()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType {
                    descriptor_index: reader.u2()?,
                },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                TAG_MODULE => Constant::Module {
                    name_index: reader.u2()?,
                },
                TAG_PACKAGE => Constant::Package {
                    name_index: reader.u2()?,
                },
                other => return Err(ClassFileError::UnknownTag { tag: other, offset }),
            };

            let wide = constant.is_wide();
            entries.push(Some(constant));
            index += 1;
            if wide {
                // A wide constant in the last slot would claim index == count
                if index >= count {
                    return Err(ClassFileError::BadIndex { index, count });
                }
                entries.push(None);
                index += 1;
            }
        }

        let pool = Self { entries };
        pool.resolve_references()?;
        Ok(pool)
    }

    /// Checks every indirection so later accessors only fail on caller misuse.
    fn resolve_references(&self) -> Result<()> {
        for (_, constant) in self.iter() {
            match constant {
                Constant::Class { name_index }
                | Constant::Module { name_index }
                | Constant::Package { name_index } => {
                    self.utf8(*name_index)?;
                }
                Constant::String { string_index } => {
                    self.utf8(*string_index)?;
                }
                Constant::Fieldref {
                    class_index,
                    name_and_type_index,
                }
                | Constant::Methodref {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    self.class_name(*class_index)?;
                    self.name_and_type(*name_and_type_index)?;
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    self.utf8(*name_index)?;
                    self.utf8(*descriptor_index)?;
                }
                Constant::MethodType { descriptor_index } => {
                    self.utf8(*descriptor_index)?;
                }
                Constant::Dynamic {
                    name_and_type_index,
                    ..
                }
                | Constant::InvokeDynamic {
                    name_and_type_index,
                    ..
                } => {
                    self.name_and_type(*name_and_type_index)?;
                }
                Constant::MethodHandle {
                    reference_index, ..
                } => {
                    self.get(*reference_index)?;
                }
                Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_) => {}
            }
        }
        Ok(())
    }

    /// The `constant_pool_count` value: valid indices are `1..count`.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        let count = self.count();
        if index == 0 || index >= count {
            return Err(ClassFileError::BadIndex { index, count });
        }
        self.entries[index as usize]
            .as_ref()
            .ok_or(ClassFileError::WideSlot { index })
    }

    /// Usable entries in index order; wide upper halves are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i as u16, c)))
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s.as_str()),
            other => Err(wrong_kind(index, "Utf8", other)),
        }
    }

    /// Internal name of the Class constant at `index`.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            other => Err(wrong_kind(index, "Class", other)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(wrong_kind(index, "NameAndType", other)),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (kind, class_index, nat_index) = match self.get(index)? {
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            } => (MemberRefKind::Field, *class_index, *name_and_type_index),
            Constant::Methodref {
                class_index,
                name_and_type_index,
            } => (MemberRefKind::Method, *class_index, *name_and_type_index),
            Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (
                MemberRefKind::InterfaceMethod,
                *class_index,
                *name_and_type_index,
            ),
            other => return Err(wrong_kind(index, "member reference", other)),
        };
        let class_name = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(MemberRef {
            kind,
            class_name,
            name,
            descriptor,
        })
    }

    /// Renders an entry the way `kiln inspect` prints it.
    pub fn describe(&self, index: u16) -> Result<String> {
        let constant = self.get(index)?;
        let detail = match constant {
            Constant::Utf8(s) => format!("\"{}\"", s.escape_debug()),
            Constant::Integer(v) => v.to_string(),
            Constant::Float(v) => format!("{v}f"),
            Constant::Long(v) => format!("{v}L"),
            Constant::Double(v) => format!("{v}d"),
            Constant::Class { .. } => self.class_name(index)?.to_string(),
            Constant::String { string_index } => {
                format!("\"{}\"", self.utf8(*string_index)?.escape_debug())
            }
            Constant::Fieldref { .. }
            | Constant::Methodref { .. }
            | Constant::InterfaceMethodref { .. } => {
                let m = self.member_ref(index)?;
                format!("{}.{}:{}", m.class_name, m.name, m.descriptor)
            }
            Constant::NameAndType { .. } => {
                let (name, descriptor) = self.name_and_type(index)?;
                format!("{name}:{descriptor}")
            }
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => format!("kind={reference_kind} #{reference_index}"),
            Constant::MethodType { descriptor_index } => self.utf8(*descriptor_index)?.to_string(),
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                format!("#{bootstrap_method_attr_index}:{name}:{descriptor}")
            }
            Constant::Module { name_index } | Constant::Package { name_index } => {
                self.utf8(*name_index)?.to_string()
            }
        };
        Ok(format!("{} {}", constant.kind_name(), detail))
    }
}

impl fmt::Display for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, _) in self.iter() {
            match self.describe(index) {
                Ok(line) => writeln!(f, "#{index:<5} {line}")?,
                Err(e) => writeln!(f, "#{index:<5} <{e}>")?,
            }
        }
        Ok(())
    }
}

fn wrong_kind(index: u16, expected: &'static str, found: &Constant) -> ClassFileError {
    ClassFileError::WrongKind {
        index,
        expected,
        found: found.kind_name(),
    }
}
