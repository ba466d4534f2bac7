//! Type definitions materialized from class files.

use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::types::signature::ClassSignature;
use crate::types::type_reference::GenericParameter;

use super::decoding::attribute::Attribute;
use super::field::FieldInfo;
use super::method::MethodInfo;

bitflags! {
    /// The access flags of a class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `final`; no subclasses allowed.
        const FINAL = 0x0010;
        /// Treat superclass methods specially when dispatching
        /// `invokespecial`.
        const SUPER = 0x0020;
        /// Is an interface, not a class.
        const INTERFACE = 0x0200;
        /// Declared `abstract`; must not be instantiated.
        const ABSTRACT = 0x0400;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an `enum` class.
        const ENUM = 0x4000;
        /// Is a module, not a class or interface.
        const MODULE = 0x8000;
    }
}

/// The version of a class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassVersion {
    /// The major version.
    pub major: u16,
    /// The minor version.
    pub minor: u16,
}

impl ClassVersion {
    /// Returns `true` if this class file was compiled with
    /// `--enable-preview`.
    #[must_use]
    pub const fn is_preview_enabled(&self) -> bool {
        self.minor == 65535
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TypeIdentity {
    pub(crate) package_name: String,
    pub(crate) simple_name: String,
    pub(crate) internal_name: String,
    pub(crate) version: ClassVersion,
    pub(crate) access_flags: AccessFlags,
    pub(crate) super_name: Option<String>,
    pub(crate) interface_names: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct TypeBody {
    pub(crate) formal_parameters: Vec<Arc<GenericParameter>>,
    pub(crate) signature: Option<ClassSignature>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) attributes: Vec<Attribute>,
}

/// A type definition under construction or fully built.
///
/// A definition is created empty, handed to
/// [`ClassReader::accept`](super::decoding::ClassReader::accept), and
/// filled in two one-shot steps: the identity (names, version, flags,
/// supertypes) first, then the body (members and attributes). Between the
/// two steps the definition is already reachable through the resolver, so
/// members of the class may refer to the class itself. Accessors return
/// `None` or empty slices for parts not yet filled.
#[derive(Debug, Default)]
pub struct TypeDefinition {
    identity: OnceLock<TypeIdentity>,
    body: OnceLock<TypeBody>,
}

impl TypeDefinition {
    /// Creates an empty definition ready to be populated.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The package name with `.` separators; empty for the default
    /// package.
    #[must_use]
    pub fn package_name(&self) -> Option<&str> {
        self.identity.get().map(|it| it.package_name.as_str())
    }

    /// The simple name of the class, without any package prefix.
    #[must_use]
    pub fn simple_name(&self) -> Option<&str> {
        self.identity.get().map(|it| it.simple_name.as_str())
    }

    /// The name of the class with `/` as the package separator.
    #[must_use]
    pub fn internal_name(&self) -> Option<&str> {
        self.identity.get().map(|it| it.internal_name.as_str())
    }

    /// The class-file version.
    #[must_use]
    pub fn version(&self) -> Option<ClassVersion> {
        self.identity.get().map(|it| it.version)
    }

    /// The access flags of the class.
    #[must_use]
    pub fn access_flags(&self) -> Option<AccessFlags> {
        self.identity.get().map(|it| it.access_flags)
    }

    /// The internal name of the superclass; `None` before population or
    /// for a class without one.
    #[must_use]
    pub fn super_name(&self) -> Option<&str> {
        self.identity
            .get()
            .and_then(|it| it.super_name.as_deref())
    }

    /// The internal names of the directly implemented interfaces.
    #[must_use]
    pub fn interface_names(&self) -> &[String] {
        self.identity
            .get()
            .map_or(&[], |it| it.interface_names.as_slice())
    }

    /// The formal type parameters declared by the class.
    #[must_use]
    pub fn formal_parameters(&self) -> &[Arc<GenericParameter>] {
        self.body
            .get()
            .map_or(&[], |it| it.formal_parameters.as_slice())
    }

    /// The parsed generic signature of the class, when it has one.
    #[must_use]
    pub fn class_signature(&self) -> Option<&ClassSignature> {
        self.body.get().and_then(|it| it.signature.as_ref())
    }

    /// The fields declared by the class.
    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        self.body.get().map_or(&[], |it| it.fields.as_slice())
    }

    /// The methods declared by the class.
    #[must_use]
    pub fn methods(&self) -> &[MethodInfo] {
        self.body.get().map_or(&[], |it| it.methods.as_slice())
    }

    /// The class-level attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        self.body.get().map_or(&[], |it| it.attributes.as_slice())
    }

    /// Whether both population steps have completed.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.body.get().is_some()
    }

    /// Checks whether the class is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access_flags()
            .is_some_and(|flags| flags.contains(AccessFlags::INTERFACE))
    }

    pub(crate) fn install_identity(&self, identity: TypeIdentity) {
        let _ = self.identity.set(identity);
    }

    pub(crate) fn install_body(&self, body: TypeBody) {
        let _ = self.body.set(body);
    }
}
