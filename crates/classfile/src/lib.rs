//! Reader for compiled JVM class files.
//!
//! Decodes the header, constant pool, member tables and `Signature`
//! attributes of a class file, and the descriptor and generic signature
//! grammars that describe its types.

#[cfg(any(test, feature = "assembler"))]
pub mod assemble;
pub mod class;
pub mod descriptor;
pub mod error;
pub mod pool;
mod reader;
pub mod shape;
pub mod signature;

pub use class::{ClassFile, MemberInfo};
pub use descriptor::{BaseType, FieldType, MethodDescriptor, is_primitive_name};
pub use error::{ClassFileError, Result};
pub use pool::{Constant, ConstantPool, MemberRef, MemberRefKind, internal_to_binary};
pub use shape::{FieldShape, MethodShape, TypeShape, is_anonymous_name};
pub use signature::{ClassSignature, GenericType, MethodSignature, TypeParameter};
