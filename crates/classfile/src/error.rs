use thiserror::Error;

/// Errors raised while decoding a compiled class.
///
/// Every variant that can be tied to a position in the input carries the byte
/// offset at which decoding failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    #[error("unexpected end of class data at offset {offset} (wanted {wanted} more bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },
    #[error("invalid magic 0x{found:08X} at offset 0")]
    BadMagic { found: u32 },
    #[error("unknown constant pool tag {tag} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },
    #[error("constant pool index {index} out of range (pool size {count})")]
    BadIndex { index: u16, count: u16 },
    #[error("constant pool index {index} is the unusable upper half of a wide constant")]
    WideSlot { index: u16 },
    #[error("constant pool entry {index} is {found}, expected {expected}")]
    WrongKind {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    #[error("malformed modified UTF-8 in constant {index} at offset {offset}")]
    Utf8 { index: u16, offset: usize },
    #[error("malformed descriptor `{descriptor}` at position {position}")]
    Descriptor { descriptor: String, position: usize },
    #[error("malformed generic signature `{signature}` at position {position}")]
    Signature { signature: String, position: usize },
}

pub type Result<T> = std::result::Result<T, ClassFileError>;
