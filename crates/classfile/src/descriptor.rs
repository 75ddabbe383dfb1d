//! Field and method descriptor grammar (`I`, `[Ljava/lang/String;`, `(IJ)V`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ClassFileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            b'B' => BaseType::Byte,
            b'C' => BaseType::Char,
            b'D' => BaseType::Double,
            b'F' => BaseType::Float,
            b'I' => BaseType::Int,
            b'J' => BaseType::Long,
            b'S' => BaseType::Short,
            b'Z' => BaseType::Boolean,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }
}

/// True for the Java primitive type names, including `void`.
pub fn is_primitive_name(name: &str) -> bool {
    matches!(
        name,
        "byte" | "char" | "double" | "float" | "int" | "long" | "short" | "boolean" | "void"
    )
}

/// Most array dimensions a descriptor may declare.
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// A decoded field descriptor. Class names are dotted binary names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut parser = DescriptorParser::new(descriptor);
        let ty = parser.parse_type()?;
        parser.finish()?;
        Ok(ty)
    }

    /// Innermost non-array component.
    pub fn element(&self) -> &FieldType {
        match self {
            FieldType::Array(inner) => inner.element(),
            other => other,
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            FieldType::Array(inner) => 1 + inner.dimensions(),
            _ => 0,
        }
    }

    /// Class named by this type or by its array element, if any.
    pub fn class_name(&self) -> Option<&str> {
        match self.element() {
            FieldType::Object(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(b) => f.write_str(b.name()),
            FieldType::Object(name) => f.write_str(name),
            FieldType::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

/// A decoded method descriptor; `return_type` is `None` for `void`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut parser = DescriptorParser::new(descriptor);
        parser.expect(b'(')?;
        let mut parameters = Vec::new();
        while !parser.peek_is(b')')? {
            parameters.push(parser.parse_type()?);
        }
        parser.expect(b')')?;
        let return_type = if parser.peek_is(b'V')? {
            parser.pos += 1;
            None
        } else {
            Some(parser.parse_type()?)
        };
        parser.finish()?;
        Ok(Self {
            parameters,
            return_type,
        })
    }

    /// Readable parameter type names, e.g. `["int", "java.lang.String[]"]`.
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.return_type {
            Some(ty) => write!(f, "{ty} (")?,
            None => f.write_str("void (")?,
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

struct DescriptorParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self) -> ClassFileError {
        ClassFileError::Descriptor {
            descriptor: self.text.to_string(),
            position: self.pos,
        }
    }

    fn peek_is(&self, ch: u8) -> Result<bool> {
        match self.bytes.get(self.pos) {
            Some(b) => Ok(*b == ch),
            None => Err(self.error()),
        }
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        if self.peek_is(ch)? {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn parse_type(&mut self) -> Result<FieldType> {
        let mut dimensions = 0;
        while self.bytes.get(self.pos) == Some(&b'[') {
            if dimensions == MAX_ARRAY_DIMENSIONS {
                return Err(self.error());
            }
            dimensions += 1;
            self.pos += 1;
        }
        let mut ty = self.parse_element()?;
        for _ in 0..dimensions {
            ty = FieldType::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_element(&mut self) -> Result<FieldType> {
        let tag = *self.bytes.get(self.pos).ok_or_else(|| self.error())?;
        if let Some(base) = BaseType::from_tag(tag) {
            self.pos += 1;
            return Ok(FieldType::Base(base));
        }
        match tag {
            b'L' => {
                self.pos += 1;
                let start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
                    self.pos += 1;
                }
                if self.pos >= self.bytes.len() || self.pos == start {
                    return Err(self.error());
                }
                let name = self.text[start..self.pos].replace('/', ".");
                self.pos += 1;
                Ok(FieldType::Object(name))
            }
            _ => Err(self.error()),
        }
    }
}
