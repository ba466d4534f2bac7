//! Methods decoded from class files.

use bitflags::bitflags;

use crate::types::descriptor::MethodDescriptor;
use crate::types::signature::MethodSignature;

use super::decoding::attribute::Attribute;

bitflags! {
    /// The access flags of a method.
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
        /// Declared `final`; must not be overridden.
        const FINAL = 0x0010;
        /// Declared `synchronized`; invocation is wrapped by a monitor.
        const SYNCHRONIZED = 0x0020;
        /// A bridge method generated by the compiler.
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments.
        const VARARGS = 0x0080;
        /// Declared `native`; implemented outside the managed runtime.
        const NATIVE = 0x0100;
        /// Declared `abstract`; no implementation is provided.
        const ABSTRACT = 0x0400;
        /// Declared `strictfp`; floating-point mode is FP-strict.
        const STRICT = 0x0800;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
    }
}

/// A method decoded from a class file.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// The access flags of the method.
    pub access_flags: AccessFlags,
    /// The name of the method.
    pub name: String,
    /// The descriptor, parsed into parameter and return types.
    pub descriptor: MethodDescriptor,
    /// The generic signature from a `Signature` attribute, when present.
    pub signature: Option<MethodSignature>,
    /// Internal names of the declared checked exceptions.
    pub exceptions: Vec<String>,
    /// All attributes of the method, typed where recognized.
    pub attributes: Vec<Attribute>,
    pub(crate) code_index: Option<usize>,
}

impl MethodInfo {
    /// The name of a constructor.
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";

    /// The name of a static initializer block.
    pub const CLASS_INITIALIZER_NAME: &'static str = "<clinit>";

    /// The `Code` attribute of the method, when present. Its body is kept
    /// as an opaque blob.
    #[must_use]
    pub fn code(&self) -> Option<&Attribute> {
        self.code_index.and_then(|index| self.attributes.get(index))
    }

    /// Checks whether the method is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == Self::CONSTRUCTOR_NAME
    }

    /// Checks whether the method is a static initializer block.
    #[must_use]
    pub fn is_static_initializer_block(&self) -> bool {
        self.name == Self::CLASS_INITIALIZER_NAME && self.descriptor.parameter_types.is_empty()
    }
}
