#![warn(
    clippy::pedantic,
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rust_2021_compatibility
)]
#![deny(rustdoc::broken_intra_doc_links)]

//! `classmeta` decodes the binary representation of compiled JVM classes
//! into a resolved, navigable type-metadata graph: type definitions,
//! fields, methods, attributes, and generic signatures.
//!
//! The decoder is split into two phases. [`jvm::decoding::ClassReader::new`]
//! consumes the class-file header (magic, versions, constant pool, access
//! flags, this/super/interfaces) and stops; the remainder of the stream is
//! decoded lazily by [`jvm::decoding::ClassReader::accept`], which drives a
//! [`jvm::decoding::ClassVisitor`] and populates a shared
//! [`jvm::TypeDefinition`]. Forward references between classes are
//! tolerated through the [`jvm::resolver::MetadataResolver`] frame stack;
//! a class under construction resolves to itself from within its own
//! descriptors and signatures.

pub mod jvm;
pub(crate) mod macros;
pub mod types;
pub(crate) mod utils;
