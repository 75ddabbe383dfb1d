//! A small class file assembler for tests and fixtures.
//!
//! Produces conforming class bytes with an explicit constant pool, so
//! reader and extractor behaviour can be exercised without a compiler.

use std::collections::HashMap;

use crate::pool::{
    TAG_CLASS, TAG_DOUBLE, TAG_FIELDREF, TAG_INTEGER, TAG_INTERFACE_METHODREF, TAG_LONG,
    TAG_METHODREF, TAG_NAME_AND_TYPE, TAG_STRING, TAG_UTF8,
};

#[derive(Debug, Clone)]
struct PendingMember {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
}

/// Builds class bytes. Names are internal (slash separated).
#[derive(Debug, Clone)]
pub struct ClassAssembler {
    entries: Vec<Vec<u8>>,
    next_index: u16,
    interned: HashMap<(u8, Vec<u8>), u16>,
    access: u16,
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<PendingMember>,
    methods: Vec<PendingMember>,
    signature: Option<String>,
    source_file: Option<String>,
    major_version: u16,
}

impl ClassAssembler {
    pub fn new(this_class: &str) -> Self {
        Self {
            entries: Vec::new(),
            next_index: 1,
            interned: HashMap::new(),
            access: 0x0021,
            this_class: this_class.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            signature: None,
            source_file: None,
            major_version: 61,
        }
    }

    pub fn with_access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn with_super(mut self, super_class: Option<&str>) -> Self {
        self.super_class = super_class.map(str::to_string);
        self
    }

    pub fn with_interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// Adds a `SourceFile` attribute, which the reader skips by length.
    pub fn with_source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    pub fn with_field(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
    ) -> Self {
        self.fields.push(PendingMember {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: signature.map(str::to_string),
        });
        self
    }

    pub fn with_method(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
    ) -> Self {
        self.methods.push(PendingMember {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: signature.map(str::to_string),
        });
        self
    }

    pub fn with_class_ref(mut self, name: &str) -> Self {
        self.class(name);
        self
    }

    pub fn with_field_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.member(TAG_FIELDREF, owner, name, descriptor);
        self
    }

    pub fn with_method_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.member(TAG_METHODREF, owner, name, descriptor);
        self
    }

    pub fn with_interface_method_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.member(TAG_INTERFACE_METHODREF, owner, name, descriptor);
        self
    }

    pub fn with_string(mut self, value: &str) -> Self {
        let utf8 = self.utf8(value);
        self.push(TAG_STRING, &utf8.to_be_bytes(), 1);
        self
    }

    pub fn with_integer(mut self, value: i32) -> Self {
        self.push(TAG_INTEGER, &value.to_be_bytes(), 1);
        self
    }

    pub fn with_long(mut self, value: i64) -> Self {
        self.push(TAG_LONG, &value.to_be_bytes(), 2);
        self
    }

    pub fn with_double(mut self, value: f64) -> Self {
        self.push(TAG_DOUBLE, &value.to_bits().to_be_bytes(), 2);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let this_name = self.this_class.clone();
        let this_index = self.class(&this_name);
        let super_index = match self.super_class.clone() {
            Some(name) => self.class(&name),
            None => 0,
        };
        let interfaces = std::mem::take(&mut self.interfaces);
        let interface_indices: Vec<u16> = interfaces.iter().map(|i| self.class(i)).collect();
        let field_list = std::mem::take(&mut self.fields);
        let method_list = std::mem::take(&mut self.methods);
        let fields = self.encode_members(&field_list);
        let methods = self.encode_members(&method_list);

        let mut class_attributes = Vec::new();
        let mut class_attribute_count = 0u16;
        if let Some(source) = self.source_file.clone() {
            let name = self.utf8("SourceFile");
            let value = self.utf8(&source);
            class_attributes.extend(attribute(name, value));
            class_attribute_count += 1;
        }
        if let Some(sig) = self.signature.clone() {
            let name = self.utf8("Signature");
            let value = self.utf8(&sig);
            class_attributes.extend(attribute(name, value));
            class_attribute_count += 1;
        }

        let mut out = Vec::new();
        out.extend(0xCAFE_BABEu32.to_be_bytes());
        out.extend(0u16.to_be_bytes());
        out.extend(self.major_version.to_be_bytes());
        out.extend(self.next_index.to_be_bytes());
        for entry in &self.entries {
            out.extend(entry);
        }
        out.extend(self.access.to_be_bytes());
        out.extend(this_index.to_be_bytes());
        out.extend(super_index.to_be_bytes());
        out.extend((interface_indices.len() as u16).to_be_bytes());
        for i in interface_indices {
            out.extend(i.to_be_bytes());
        }
        out.extend(fields);
        out.extend(methods);
        out.extend(class_attribute_count.to_be_bytes());
        out.extend(class_attributes);
        out
    }

    fn encode_members(&mut self, members: &[PendingMember]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend((members.len() as u16).to_be_bytes());
        for m in members {
            let name = self.utf8(&m.name);
            let descriptor = self.utf8(&m.descriptor);
            out.extend(m.access.to_be_bytes());
            out.extend(name.to_be_bytes());
            out.extend(descriptor.to_be_bytes());
            match &m.signature {
                Some(sig) => {
                    let attr_name = self.utf8("Signature");
                    let value = self.utf8(sig);
                    out.extend(1u16.to_be_bytes());
                    out.extend(attribute(attr_name, value));
                }
                None => out.extend(0u16.to_be_bytes()),
            }
        }
        out
    }

    fn push(&mut self, tag: u8, payload: &[u8], width: u16) -> u16 {
        let key = (tag, payload.to_vec());
        if let Some(index) = self.interned.get(&key) {
            return *index;
        }
        let index = self.next_index;
        let mut entry = vec![tag];
        entry.extend_from_slice(payload);
        self.entries.push(entry);
        self.next_index += width;
        self.interned.insert(key, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let bytes = encode_modified_utf8(value);
        let mut payload = (bytes.len() as u16).to_be_bytes().to_vec();
        payload.extend(bytes);
        self.push(TAG_UTF8, &payload, 1)
    }

    fn class(&mut self, name: &str) -> u16 {
        let utf8 = self.utf8(name);
        self.push(TAG_CLASS, &utf8.to_be_bytes(), 1)
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut nat = name.to_be_bytes().to_vec();
        nat.extend(descriptor.to_be_bytes());
        let nat = self.push(TAG_NAME_AND_TYPE, &nat, 1);
        let mut payload = class.to_be_bytes().to_vec();
        payload.extend(nat.to_be_bytes());
        self.push(tag, &payload, 1)
    }
}

fn attribute(name: u16, value: u16) -> Vec<u8> {
    let mut out = name.to_be_bytes().to_vec();
    out.extend(2u32.to_be_bytes());
    out.extend(value.to_be_bytes());
    out
}

fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
