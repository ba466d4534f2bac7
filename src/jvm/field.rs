//! Fields, constant values, and the strings that carry them.

use bitflags::bitflags;

use crate::types::descriptor::MethodDescriptor;
use crate::types::type_reference::TypeReference;

use super::decoding::attribute::Attribute;
use super::references::MethodHandle;

/// A string from the constant pool.
///
/// Class files encode strings in modified UTF-8; byte sequences that fail
/// to decode are preserved verbatim instead of being lost.
#[derive(Debug, PartialEq, Clone)]
pub enum JavaString {
    /// A string that decoded cleanly.
    Utf8(String),
    /// The raw bytes of a string that is not valid modified UTF-8.
    InvalidUtf8(Vec<u8>),
}

/// A compile-time constant as carried by the constant pool.
#[derive(Debug, PartialEq, Clone)]
pub enum ConstantValue {
    /// An `int` (also `boolean`, `byte`, `char`, and `short`) constant.
    Integer(i32),
    /// A `long` constant.
    Long(i64),
    /// A `float` constant.
    Float(f32),
    /// A `double` constant.
    Double(f64),
    /// A string constant.
    String(JavaString),
    /// A class literal.
    Class(TypeReference),
    /// A method type constant.
    MethodType(MethodDescriptor),
    /// A method handle constant.
    Handle(MethodHandle),
    /// A dynamically computed constant: bootstrap method index, name, and
    /// type.
    Dynamic(u16, String, TypeReference),
}

bitflags! {
    /// The access flags of a field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; never directly assigned to after construction.
        const FINAL = 0x0010;
        /// Declared `volatile`; cannot be cached.
        const VOLATILE = 0x0040;
        /// Declared `transient`; skipped by persistent object managers.
        const TRANSIENT = 0x0080;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an `enum` class.
        const ENUM = 0x4000;
    }
}

/// A field decoded from a class file.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// The access flags of the field.
    pub access_flags: AccessFlags,
    /// The name of the field.
    pub name: String,
    /// The raw descriptor string.
    pub descriptor: String,
    /// The declared type, parsed from the descriptor.
    pub field_type: TypeReference,
    /// The generic type from a `Signature` attribute, when present.
    pub generic_type: Option<TypeReference>,
    /// The value of a `ConstantValue` attribute, when present.
    pub constant_value: Option<ConstantValue>,
    /// All attributes of the field, typed where recognized.
    pub attributes: Vec<Attribute>,
}
