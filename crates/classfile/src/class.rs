use std::fmt;

use crate::error::{ClassFileError, Result};
use crate::pool::{ConstantPool, internal_to_binary};
use crate::reader::ByteReader;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

const SIGNATURE_ATTRIBUTE: &str = "Signature";

/// A field or method table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    /// Generic `Signature` attribute, when the compiler emitted one.
    pub signature: Option<String>,
}

impl MemberInfo {
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }
}

/// A decoded compiled class.
///
/// Only the `Signature` attribute is retained; every other attribute is
/// skipped by length.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    /// Zero for `java.lang.Object` and module descriptors.
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub signature: Option<String>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let mut class = Self::read_header(&mut reader)?;

        let interface_count = reader.u2()?;
        class.interfaces = (0..interface_count)
            .map(|_| reader.u2())
            .collect::<Result<_>>()?;

        class.fields = read_members(&mut reader, &class.constant_pool)?;
        class.methods = read_members(&mut reader, &class.constant_pool)?;
        class.signature = read_attributes(&mut reader, &class.constant_pool)?;
        Ok(class)
    }

    /// Parses up to and including the super class index. Interfaces, members
    /// and attributes are left empty.
    pub fn parse_header(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        Self::read_header(&mut reader)
    }

    fn read_header(reader: &mut ByteReader<'_>) -> Result<Self> {
        let magic = reader.u4()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic { found: magic });
        }
        let minor_version = reader.u2()?;
        let major_version = reader.u2()?;
        let constant_pool = ConstantPool::parse(reader)?;
        let access_flags = reader.u2()?;
        let this_class = reader.u2()?;
        let super_class = reader.u2()?;

        constant_pool.class_name(this_class)?;
        if super_class != 0 {
            constant_pool.class_name(super_class)?;
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            signature: None,
        })
    }

    /// Internal (slash separated) name of this class.
    pub fn this_class_name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Dotted binary name, e.g. `com.acme.Outer$Inner`.
    pub fn binary_name(&self) -> Result<String> {
        self.this_class_name().map(internal_to_binary)
    }

    pub fn super_class_name(&self) -> Result<Option<String>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool
            .class_name(self.super_class)
            .map(|n| Some(internal_to_binary(n)))
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .iter()
            .map(|i| self.constant_pool.class_name(*i).map(internal_to_binary))
            .collect()
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }
}

impl fmt::Display for ClassFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.binary_name().unwrap_or_else(|e| format!("<{e}>"));
        writeln!(f, "class {name}")?;
        writeln!(f, "  version: {}.{}", self.major_version, self.minor_version)?;
        writeln!(f, "  access: 0x{:04X}", self.access_flags)?;
        if let Ok(Some(sup)) = self.super_class_name() {
            writeln!(f, "  super: {sup}")?;
        }
        if let Ok(ifaces) = self.interface_names() {
            for iface in ifaces {
                writeln!(f, "  implements: {iface}")?;
            }
        }
        if let Some(sig) = &self.signature {
            writeln!(f, "  signature: {sig}")?;
        }
        for field in &self.fields {
            writeln!(f, "  field {} {}", field.name, field.descriptor)?;
        }
        for method in &self.methods {
            writeln!(f, "  method {}{}", method.name, method.descriptor)?;
        }
        writeln!(f, "constant pool ({} slots):", self.constant_pool.count())?;
        write!(f, "{}", self.constant_pool)
    }
}

fn read_members(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Vec<MemberInfo>> {
    let count = reader.u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = reader.u2()?;
        let name = pool.utf8(reader.u2()?)?.to_string();
        let descriptor = pool.utf8(reader.u2()?)?.to_string();
        let signature = read_attributes(reader, pool)?;
        members.push(MemberInfo {
            access_flags,
            name,
            descriptor,
            signature,
        });
    }
    Ok(members)
}

/// Reads an attribute table and returns the `Signature` value, if present.
fn read_attributes(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Option<String>> {
    let count = reader.u2()?;
    let mut signature = None;
    for _ in 0..count {
        let name = pool.utf8(reader.u2()?)?;
        let length = reader.u4()? as usize;
        if name == SIGNATURE_ATTRIBUTE && length == 2 {
            signature = Some(pool.utf8(reader.u2()?)?.to_string());
        } else {
            reader.skip(length)?;
        }
    }
    Ok(signature)
}
