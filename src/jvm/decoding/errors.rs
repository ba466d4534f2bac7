//! Errors raised while decoding a class file.

use crate::types::descriptor::InvalidDescriptor;
use crate::types::signature::SignatureError;

/// An error raised while decoding a class file.
///
/// Every variant is fatal for the decode that raised it: partial results
/// are discarded and nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream ended before the structure being decoded did.
    #[error("Unexpected end of input at offset {offset}")]
    MalformedInput {
        /// The buffer position at which the read failed.
        offset: usize,
    },
    /// The stream does not start with the class-file magic number.
    #[error("Not a class file: magic is {found:#010x}")]
    InvalidMagic {
        /// The four bytes found instead.
        found: u32,
    },
    /// A constant pool index is zero, out of range, or addresses the
    /// unusable second slot of a `Long` or `Double` entry.
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    /// A constant pool lookup found an entry of the wrong kind.
    #[error("Mismatched constant pool entry, expected {expected}, but found {found}")]
    UnexpectedConstantPoolTag {
        /// The kind of entry the lookup required.
        expected: &'static str,
        /// The kind of entry actually stored at the index.
        found: &'static str,
    },
    /// The constant pool table contains a tag no decoder exists for.
    #[error("Unknown constant pool tag {0}")]
    UnknownConstantPoolTag(u8),
    /// A string required for building metadata is not valid modified
    /// UTF-8.
    #[error("Invalid modified UTF-8 string in constant pool")]
    BrokenUtf8,
    /// A descriptor string violates the descriptor grammar.
    #[error(transparent)]
    InvalidDescriptor(#[from] InvalidDescriptor),
    /// A signature string violates the signature grammar or references an
    /// undeclared type variable.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// The body of a recognized attribute disagrees with its declared
    /// layout.
    #[error("Malformed {name} attribute: {message}")]
    MalformedAttribute {
        /// The attribute name.
        name: &'static str,
        /// What was wrong with the body.
        message: &'static str,
    },
    /// A flag word contains bits no known flag covers.
    #[error("Unknown access flags {flags:#06x} for {target}")]
    UnknownAccessFlags {
        /// The raw flag word.
        flags: u16,
        /// What the flags were decoded for.
        target: &'static str,
    },
    /// A structure is inconsistent in a way no more specific variant
    /// covers.
    #[error("Malformed class file: {0}")]
    MalformedClassFile(&'static str),
    /// An operation was invoked on a reader whose state no longer permits
    /// it.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
}

/// The result type of decode operations.
pub type Result<T> = std::result::Result<T, Error>;
