//! Generic `Signature` attribute grammar.
//!
//! Class, field and method signatures carry the generic shape that erasure
//! drops from descriptors: type parameters and their bounds, parameterized
//! supertypes, wildcards and type variables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::{BaseType, FieldType};
use crate::error::{ClassFileError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericType {
    Primitive(BaseType),
    /// A raw or non-generic class, by dotted binary name.
    Class(String),
    Parameterized {
        raw: String,
        /// Enclosing parameterized type for `Outer<A>.Inner<B>`.
        owner: Option<Box<GenericType>>,
        arguments: Vec<GenericType>,
    },
    /// A use of a type variable. `bounds` is empty straight out of the parser
    /// and filled in when the variable is resolved against its declaration.
    TypeVariable {
        name: String,
        bounds: Vec<GenericType>,
    },
    /// `?`, `? extends X` (upper) or `? super X` (lower).
    Wildcard {
        upper: Vec<GenericType>,
        lower: Vec<GenericType>,
    },
    Array(Box<GenericType>),
}

impl GenericType {
    pub fn type_variable(name: impl Into<String>) -> Self {
        GenericType::TypeVariable {
            name: name.into(),
            bounds: Vec::new(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, GenericType::Primitive(_))
    }

    /// The erased class name this type would have in a descriptor, if any.
    pub fn raw_class(&self) -> Option<&str> {
        match self {
            GenericType::Class(name) => Some(name),
            GenericType::Parameterized { raw, .. } => Some(raw),
            GenericType::Array(inner) => inner.raw_class(),
            _ => None,
        }
    }
}

impl From<&FieldType> for GenericType {
    fn from(ty: &FieldType) -> Self {
        match ty {
            FieldType::Base(b) => GenericType::Primitive(*b),
            FieldType::Object(name) => GenericType::Class(name.clone()),
            FieldType::Array(inner) => GenericType::Array(Box::new(inner.as_ref().into())),
        }
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericType::Primitive(b) => f.write_str(b.name()),
            GenericType::Class(name) => f.write_str(name),
            GenericType::Parameterized { raw, arguments, .. } => {
                write!(f, "{raw}<")?;
                write_list(f, arguments)?;
                f.write_str(">")
            }
            GenericType::TypeVariable { name, .. } => f.write_str(name),
            GenericType::Wildcard { upper, lower } => {
                f.write_str("?")?;
                if let Some(first) = lower.first() {
                    write!(f, " super {first}")?;
                } else if let Some(first) = upper.first() {
                    write!(f, " extends {first}")?;
                }
                Ok(())
            }
            GenericType::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[GenericType]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// A declared type parameter; the class bound (if any) comes first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    pub bounds: Vec<GenericType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: GenericType,
    pub interfaces: Vec<GenericType>,
}

impl ClassSignature {
    pub fn parse(signature: &str) -> Result<Self> {
        let mut p = SignatureParser::new(signature);
        let type_parameters = p.type_parameters()?;
        let superclass = p.class_type()?;
        let mut interfaces = Vec::new();
        while !p.at_end() {
            interfaces.push(p.class_type()?);
        }
        Ok(Self {
            type_parameters,
            superclass,
            interfaces,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<GenericType>,
    /// `None` for `void`.
    pub return_type: Option<GenericType>,
    pub throws: Vec<GenericType>,
}

impl MethodSignature {
    pub fn parse(signature: &str) -> Result<Self> {
        let mut p = SignatureParser::new(signature);
        let type_parameters = p.type_parameters()?;
        p.expect(b'(')?;
        let mut parameters = Vec::new();
        while p.peek()? != b')' {
            parameters.push(p.java_type()?);
        }
        p.expect(b')')?;
        let return_type = if p.peek()? == b'V' {
            p.pos += 1;
            None
        } else {
            Some(p.java_type()?)
        };
        let mut throws = Vec::new();
        while !p.at_end() {
            p.expect(b'^')?;
            throws.push(p.reference_type()?);
        }
        Ok(Self {
            type_parameters,
            parameters,
            return_type,
            throws,
        })
    }
}

/// Parses a field `Signature` attribute (a single reference type).
pub fn parse_field_signature(signature: &str) -> Result<GenericType> {
    let mut p = SignatureParser::new(signature);
    let ty = p.reference_type()?;
    if !p.at_end() {
        return Err(p.error());
    }
    Ok(ty)
}

/// Deepest nesting of reference types (arrays, type arguments, bounds and
/// inner-class segments) a signature may have.
pub const MAX_NESTING: usize = 512;

struct SignatureParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self) -> ClassFileError {
        ClassFileError::Signature {
            signature: self.text.to_string(),
            position: self.pos,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Result<u8> {
        self.bytes.get(self.pos).copied().ok_or_else(|| self.error())
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        if self.peek()? == ch {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn identifier(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while let Some(b) = self.bytes.get(self.pos) {
            if matches!(b, b'.' | b';' | b'[' | b'/' | b'<' | b'>' | b':') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error());
        }
        Ok(&self.text[start..self.pos])
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>> {
        let mut params = Vec::new();
        if self.at_end() || self.peek()? != b'<' {
            return Ok(params);
        }
        self.pos += 1;
        loop {
            let name = self.identifier()?.to_string();
            let mut bounds = Vec::new();
            // Class bound; may be empty when only interface bounds follow
            self.expect(b':')?;
            if !matches!(self.peek()?, b':' | b'>') {
                bounds.push(self.reference_type()?);
            }
            while self.peek()? == b':' {
                self.pos += 1;
                bounds.push(self.reference_type()?);
            }
            params.push(TypeParameter { name, bounds });
            if self.peek()? == b'>' {
                self.pos += 1;
                break;
            }
        }
        Ok(params)
    }

    fn java_type(&mut self) -> Result<GenericType> {
        let tag = self.peek()?;
        if let Some(base) = BaseType::from_tag(tag) {
            self.pos += 1;
            return Ok(GenericType::Primitive(base));
        }
        self.reference_type()
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth == MAX_NESTING {
            return Err(self.error());
        }
        self.depth += 1;
        Ok(())
    }

    fn reference_type(&mut self) -> Result<GenericType> {
        self.enter()?;
        let ty = self.nested_reference_type()?;
        self.depth -= 1;
        Ok(ty)
    }

    fn nested_reference_type(&mut self) -> Result<GenericType> {
        match self.peek()? {
            b'L' => self.class_type(),
            b'T' => {
                self.pos += 1;
                let name = self.identifier()?.to_string();
                self.expect(b';')?;
                Ok(GenericType::type_variable(name))
            }
            b'[' => {
                self.pos += 1;
                Ok(GenericType::Array(Box::new(self.java_type()?)))
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<GenericType> {
        self.expect(b'L')?;
        let mut name = String::new();
        // Package specifier and first simple name
        loop {
            name.push_str(self.identifier()?);
            if self.peek()? == b'/' {
                self.pos += 1;
                name.push('.');
            } else {
                break;
            }
        }
        let mut current = self.finish_segment(name, None)?;
        let outer_depth = self.depth;
        while self.peek()? == b'.' {
            self.enter()?;
            self.pos += 1;
            let segment = self.identifier()?;
            let raw = match &current {
                GenericType::Class(n) => format!("{n}${segment}"),
                GenericType::Parameterized { raw, .. } => format!("{raw}${segment}"),
                _ => return Err(self.error()),
            };
            let owner = match current {
                p @ GenericType::Parameterized { .. } => Some(Box::new(p)),
                _ => None,
            };
            current = self.finish_segment(raw, owner)?;
        }
        self.depth = outer_depth;
        self.expect(b';')?;
        Ok(current)
    }

    fn finish_segment(
        &mut self,
        raw: String,
        owner: Option<Box<GenericType>>,
    ) -> Result<GenericType> {
        let arguments = if self.peek()? == b'<' {
            self.type_arguments()?
        } else {
            Vec::new()
        };
        if arguments.is_empty() && owner.is_none() {
            Ok(GenericType::Class(raw))
        } else {
            Ok(GenericType::Parameterized {
                raw,
                owner,
                arguments,
            })
        }
    }

    fn type_arguments(&mut self) -> Result<Vec<GenericType>> {
        self.expect(b'<')?;
        let mut args = Vec::new();
        while self.peek()? != b'>' {
            let arg = match self.peek()? {
                b'*' => {
                    self.pos += 1;
                    GenericType::Wildcard {
                        upper: Vec::new(),
                        lower: Vec::new(),
                    }
                }
                b'+' => {
                    self.pos += 1;
                    GenericType::Wildcard {
                        upper: vec![self.reference_type()?],
                        lower: Vec::new(),
                    }
                }
                b'-' => {
                    self.pos += 1;
                    GenericType::Wildcard {
                        upper: Vec::new(),
                        lower: vec![self.reference_type()?],
                    }
                }
                _ => self.reference_type()?,
            };
            args.push(arg);
        }
        if args.is_empty() {
            return Err(self.error());
        }
        self.pos += 1;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> GenericType {
        GenericType::Class(name.to_string())
    }

    #[test]
    fn test_field_signature_with_wildcards() {
        let ty = parse_field_signature("Ljava/util/Map<Ljava/lang/String;+Lcom/acme/Baz;>;").unwrap();
        assert_eq!(
            ty,
            GenericType::Parameterized {
                raw: "java.util.Map".into(),
                owner: None,
                arguments: vec![
                    class("java.lang.String"),
                    GenericType::Wildcard {
                        upper: vec![class("com.acme.Baz")],
                        lower: vec![],
                    },
                ],
            }
        );
        assert_eq!(ty.to_string(), "java.util.Map<java.lang.String, ? extends com.acme.Baz>");
    }

    #[test]
    fn test_class_signature_with_bounds() {
        let sig = ClassSignature::parse(
            "<K::Ljava/lang/Comparable<TK;>;V:Ljava/lang/Object;>Lcom/acme/Base<TV;>;Ljava/io/Serializable;",
        )
        .unwrap();
        assert_eq!(sig.type_parameters.len(), 2);
        assert_eq!(sig.type_parameters[0].name, "K");
        assert_eq!(sig.type_parameters[0].bounds[0].raw_class(), Some("java.lang.Comparable"));
        assert_eq!(sig.type_parameters[1].bounds, vec![class("java.lang.Object")]);
        assert_eq!(sig.superclass.raw_class(), Some("com.acme.Base"));
        assert_eq!(sig.interfaces, vec![class("java.io.Serializable")]);
    }

    #[test]
    fn test_nested_parameterized_owner() {
        let ty = parse_field_signature("Lcom/acme/Outer<TT;>.Inner<-Ljava/lang/Number;>;").unwrap();
        match ty {
            GenericType::Parameterized { raw, owner, arguments } => {
                assert_eq!(raw, "com.acme.Outer$Inner");
                assert_eq!(owner.unwrap().raw_class(), Some("com.acme.Outer"));
                assert_eq!(arguments.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_method_signature_with_throws() {
        let sig = MethodSignature::parse("<E:Ljava/lang/Exception;>([TE;I)Ljava/util/List<*>;^TE;").unwrap();
        assert_eq!(sig.type_parameters[0].name, "E");
        assert_eq!(
            sig.parameters,
            vec![
                GenericType::Array(Box::new(GenericType::type_variable("E"))),
                GenericType::Primitive(BaseType::Int),
            ]
        );
        assert_eq!(sig.return_type.unwrap().to_string(), "java.util.List<?>");
        assert_eq!(sig.throws, vec![GenericType::type_variable("E")]);
    }

    #[test]
    fn test_malformed_signature() {
        assert!(matches!(
            parse_field_signature("Ljava/util/List<>;"),
            Err(ClassFileError::Signature { position: 16, .. })
        ));
        assert!(MethodSignature::parse("(I").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let arrays = format!("{}I", "[".repeat(65000));
        assert!(matches!(
            parse_field_signature(&arrays),
            Err(ClassFileError::Signature { position: MAX_NESTING, .. })
        ));

        let depth = 20000;
        let arguments = format!("{}TT;{}", "Lx<".repeat(depth), ">;".repeat(depth));
        assert!(matches!(
            parse_field_signature(&arguments),
            Err(ClassFileError::Signature { .. })
        ));

        let owners = format!("La<TT;>{};", ".b<TT;>".repeat(depth));
        assert!(matches!(
            parse_field_signature(&owners),
            Err(ClassFileError::Signature { .. })
        ));

        let shallow = format!("{}I", "[".repeat(MAX_NESTING));
        assert!(parse_field_signature(&shallow).is_ok());
    }
}
