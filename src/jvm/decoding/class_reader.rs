//! The top-level class-file decoder.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use itertools::Itertools;
use log::{debug, trace};

use crate::jvm::class::{ClassVersion, TypeBody, TypeDefinition, TypeIdentity};
use crate::jvm::field::FieldInfo;
use crate::jvm::method::MethodInfo;
use crate::jvm::resolver::{MetadataResolver, ResolverFrame};
use crate::jvm::{class, field, method};
use crate::types::descriptor::MethodDescriptor;
use crate::types::signature::{self, GenericContext};
use crate::types::type_reference::{ClassType, TypeReference};
use crate::utils::lock;

use super::attribute::Attribute;
use super::buffer::Buffer;
use super::constant_pool::ConstantPool;
use super::errors::{Error, Result};

const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

/// A consumer of the type-definition view produced by
/// [`ClassReader::accept`], invoked exactly once per call.
pub trait ClassVisitor {
    /// Called with the header of the class once its members have been
    /// decoded. `type_definition` is the definition passed to `accept`;
    /// its identity is installed, its body is not yet.
    #[allow(clippy::too_many_arguments)]
    fn visit(
        &mut self,
        type_definition: &Arc<TypeDefinition>,
        version: ClassVersion,
        access_flags: class::AccessFlags,
        internal_name: &str,
        signature: Option<&str>,
        super_name: Option<&str>,
        interface_names: &[String],
    );
}

/// The raw shape of a `field_info` or `method_info` record.
#[doc = crate::macros::see_jvm_spec!(4, 5)]
#[derive(Debug)]
struct RawMember {
    access_flags: u16,
    name: String,
    descriptor: String,
    attributes: Vec<Attribute>,
    code_index: Option<usize>,
}

impl RawMember {
    fn decode(buffer: &mut Buffer, pool: &ConstantPool) -> Result<Self> {
        let access_flags = buffer.read_value()?;
        let name_index: u16 = buffer.read_value()?;
        let name = pool.utf8(name_index)?.to_owned();
        let descriptor_index: u16 = buffer.read_value()?;
        let descriptor = pool.utf8(descriptor_index)?.to_owned();
        let attributes = Attribute::decode_list(buffer, pool)?;
        let code_index = attributes
            .iter()
            .position(|attribute| matches!(attribute, Attribute::Blob { name, .. } if name == "Code"));
        Ok(Self {
            access_flags,
            name,
            descriptor,
            attributes,
            code_index,
        })
    }

    fn signature(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::Signature(it) => Some(it.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug)]
struct ClassMembers {
    fields: Vec<RawMember>,
    methods: Vec<RawMember>,
    attributes: Vec<Attribute>,
    signature: Option<String>,
}

#[derive(Debug)]
struct DecodeState {
    buffer: Buffer,
    members: Option<ClassMembers>,
}

/// Decodes a class file and drives a [`ClassVisitor`] over the result.
///
/// Construction reads the header (magic, versions, constant pool, access
/// flags, this/super/interfaces) and stops there. The rest of the stream
/// (fields, methods, attributes) is decoded by the first call to
/// [`ClassReader::accept`]; the one-shot completion latch makes later
/// calls reuse the decoded members without touching the buffer again,
/// while still invoking the visitor.
///
/// A reader is driven by one thread at a time; separate readers sharing a
/// [`MetadataResolver`] may run in parallel.
#[derive(Debug)]
pub struct ClassReader {
    resolver: Arc<MetadataResolver>,
    frame: Arc<ResolverFrame>,
    pool: ConstantPool,
    version: ClassVersion,
    access_flags: class::AccessFlags,
    internal_name: String,
    package_name: String,
    simple_name: String,
    super_name: Option<String>,
    interface_names: Vec<String>,
    state: Mutex<DecodeState>,
    populated: AtomicBool,
}

impl ClassReader {
    /// Decodes the class-file header from `buffer`.
    ///
    /// # Errors
    /// [`Error::InvalidMagic`] when the stream does not start with
    /// `0xCAFEBABE`; otherwise see [`Error`].
    pub fn new(resolver: Arc<MetadataResolver>, mut buffer: Buffer) -> Result<Self> {
        let magic: u32 = buffer.read_value()?;
        if magic != CLASS_FILE_MAGIC {
            return Err(Error::InvalidMagic { found: magic });
        }
        let minor = buffer.read_value()?;
        let major = buffer.read_value()?;
        let version = ClassVersion { major, minor };
        let pool = ConstantPool::decode(&mut buffer)?;
        let flag_bits: u16 = buffer.read_value()?;
        let access_flags =
            class::AccessFlags::from_bits(flag_bits).ok_or(Error::UnknownAccessFlags {
                flags: flag_bits,
                target: "class",
            })?;
        let this_class: u16 = buffer.read_value()?;
        // Index 0 names nothing; the definition keeps the empty name.
        let internal_name = if this_class == 0 {
            String::new()
        } else {
            pool.class_name(this_class)?.to_owned()
        };
        let super_class: u16 = buffer.read_value()?;
        let super_name = if super_class == 0 {
            None
        } else {
            Some(pool.class_name(super_class)?.to_owned())
        };
        let interface_count: u16 = buffer.read_value()?;
        let interface_names = (0..interface_count)
            .map(|_| -> Result<String> {
                let index = buffer.read_value()?;
                pool.class_name(index).map(str::to_owned)
            })
            .try_collect()?;
        let (package_name, simple_name) = split_internal_name(&internal_name);
        debug!(
            "Decoded class file header for `{internal_name}` (version {}.{})",
            version.major, version.minor
        );
        Ok(Self {
            resolver,
            frame: ResolverFrame::new(),
            pool,
            version,
            access_flags,
            internal_name,
            package_name,
            simple_name,
            super_name,
            interface_names,
            state: Mutex::new(DecodeState {
                buffer,
                members: None,
            }),
            populated: AtomicBool::new(false),
        })
    }

    /// Decodes the members of the class (first call only), populates
    /// `type_definition`, and invokes the visitor.
    ///
    /// The reader's resolver frame is pushed for the duration of the call
    /// and the in-progress definition is registered in it, so descriptors
    /// and signatures inside this class file that name the class resolve
    /// to `type_definition` itself. Both the frame and the registration
    /// are released on every exit path.
    ///
    /// # Errors
    /// See [`Error`]. Errors are fatal: a later call to a reader whose
    /// first decode failed reports [`Error::InvalidState`].
    pub fn accept<V: ClassVisitor>(
        &self,
        type_definition: &Arc<TypeDefinition>,
        visitor: &mut V,
    ) -> Result<()> {
        let _frame_guard = self.resolver.push_frame(self.frame.clone());
        let first_call = self
            .populated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        let mut state = lock(&self.state);
        if first_call {
            let members = self.decode_members(&mut state.buffer)?;
            // Blob payloads may be re-read later against a fresh cursor.
            state.buffer.reset(0)?;
            state.members = Some(members);
        }
        let members = state.members.as_ref().ok_or(Error::InvalidState(
            "a previous decode of this class file failed",
        ))?;

        self.install_identity(type_definition);
        let self_reference = ClassType::new(self.internal_name.clone());
        self_reference.attach_definition(type_definition);
        let _registration = self.frame.register_type(
            self.internal_name.clone(),
            TypeReference::Class(self_reference),
        );

        visitor.visit(
            type_definition,
            self.version,
            self.access_flags,
            &self.internal_name,
            members.signature.as_deref(),
            self.super_name.as_deref(),
            &self.interface_names,
        );

        if first_call {
            match self.build_body(members) {
                Ok(body) => type_definition.install_body(body),
                Err(error) => {
                    // Partial results are discarded; later calls report
                    // InvalidState instead of half-built members.
                    state.members = None;
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// The name of the class with `/` as the package separator.
    #[must_use]
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    /// The package name with `.` separators; empty for the default
    /// package.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The simple name of the class.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    /// The class-file version.
    #[must_use]
    pub fn version(&self) -> ClassVersion {
        self.version
    }

    /// The access flags of the class.
    #[must_use]
    pub fn access_flags(&self) -> class::AccessFlags {
        self.access_flags
    }

    /// The internal name of the superclass, absent when `super_class` is
    /// index 0.
    #[must_use]
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    /// The internal names of the directly implemented interfaces.
    #[must_use]
    pub fn interface_names(&self) -> &[String] {
        &self.interface_names
    }

    /// The decoded constant pool.
    #[must_use]
    pub fn constant_pool(&self) -> &ConstantPool {
        &self.pool
    }

    /// The resolver this reader pushes its frame onto.
    #[must_use]
    pub fn resolver(&self) -> &Arc<MetadataResolver> {
        &self.resolver
    }

    fn decode_members(&self, buffer: &mut Buffer) -> Result<ClassMembers> {
        let field_count: u16 = buffer.read_value()?;
        let fields = (0..field_count)
            .map(|_| RawMember::decode(buffer, &self.pool))
            .try_collect()?;
        let method_count: u16 = buffer.read_value()?;
        let methods = (0..method_count)
            .map(|_| RawMember::decode(buffer, &self.pool))
            .try_collect()?;
        let attributes = Attribute::decode_list(buffer, &self.pool)?;
        let signature = attributes.iter().find_map(|attribute| match attribute {
            Attribute::Signature(it) => Some(it.clone()),
            _ => None,
        });
        trace!(
            "Decoded members of `{}`: {field_count} fields, {method_count} methods",
            self.internal_name
        );
        Ok(ClassMembers {
            fields,
            methods,
            attributes,
            signature,
        })
    }

    fn install_identity(&self, type_definition: &Arc<TypeDefinition>) {
        type_definition.install_identity(TypeIdentity {
            package_name: self.package_name.clone(),
            simple_name: self.simple_name.clone(),
            internal_name: self.internal_name.clone(),
            version: self.version,
            access_flags: self.access_flags,
            super_name: self.super_name.clone(),
            interface_names: self.interface_names.clone(),
        });
    }

    fn build_body(&self, members: &ClassMembers) -> Result<TypeBody> {
        let mut context = GenericContext::new();
        let signature = members
            .signature
            .as_deref()
            .map(|it| {
                signature::parse_class_signature(
                    it,
                    &self.internal_name,
                    &mut context,
                    Some(self.resolver.as_ref()),
                )
            })
            .transpose()?;
        let formal_parameters = signature
            .as_ref()
            .map(|it| it.formal_parameters.clone())
            .unwrap_or_default();

        // The class scope covers every member signature; the frame makes
        // the parameters visible to lookups arriving through the resolver.
        context.push_scope(self.internal_name.clone(), formal_parameters.clone());
        for parameter in &formal_parameters {
            self.frame.add_type_variable(parameter.clone());
        }
        let members_result = self.build_members(members, &mut context);
        for parameter in &formal_parameters {
            self.frame.remove_type_variable(parameter.name());
        }
        let (fields, methods) = members_result?;

        Ok(TypeBody {
            formal_parameters,
            signature,
            fields,
            methods,
            attributes: members.attributes.clone(),
        })
    }

    fn build_members(
        &self,
        members: &ClassMembers,
        context: &mut GenericContext,
    ) -> Result<(Vec<FieldInfo>, Vec<MethodInfo>)> {
        let fields = members
            .fields
            .iter()
            .map(|raw| self.build_field(raw, context))
            .try_collect()?;
        let methods = members
            .methods
            .iter()
            .map(|raw| self.build_method(raw, context))
            .try_collect()?;
        Ok((fields, methods))
    }

    fn build_field(&self, raw: &RawMember, context: &mut GenericContext) -> Result<FieldInfo> {
        let access_flags =
            field::AccessFlags::from_bits(raw.access_flags).ok_or(Error::UnknownAccessFlags {
                flags: raw.access_flags,
                target: "field",
            })?;
        let field_type = TypeReference::from_str(&raw.descriptor)?;
        let generic_type = raw
            .signature()
            .map(|it| signature::parse_field_signature(it, context, Some(self.resolver.as_ref())))
            .transpose()?;
        let constant_value = raw.attributes.iter().find_map(|attribute| match attribute {
            Attribute::ConstantValue(it) => Some(it.clone()),
            _ => None,
        });
        Ok(FieldInfo {
            access_flags,
            name: raw.name.clone(),
            descriptor: raw.descriptor.clone(),
            field_type,
            generic_type,
            constant_value,
            attributes: raw.attributes.clone(),
        })
    }

    fn build_method(&self, raw: &RawMember, context: &mut GenericContext) -> Result<MethodInfo> {
        let access_flags =
            method::AccessFlags::from_bits(raw.access_flags).ok_or(Error::UnknownAccessFlags {
                flags: raw.access_flags,
                target: "method",
            })?;
        let descriptor = MethodDescriptor::from_str(&raw.descriptor)?;
        let owner = format!("{}::{}", self.internal_name, raw.name);
        let signature = raw
            .signature()
            .map(|it| {
                signature::parse_method_signature(it, &owner, context, Some(self.resolver.as_ref()))
            })
            .transpose()?;
        let exceptions = raw
            .attributes
            .iter()
            .find_map(|attribute| match attribute {
                Attribute::Exceptions(names) => Some(names.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(MethodInfo {
            access_flags,
            name: raw.name.clone(),
            descriptor,
            signature,
            exceptions,
            attributes: raw.attributes.clone(),
            code_index: raw.code_index,
        })
    }
}

fn split_internal_name(internal_name: &str) -> (String, String) {
    match internal_name.rsplit_once('/') {
        Some((package, simple)) => (package.replace('/', "."), simple.to_owned()),
        None => (String::new(), internal_name.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::split_internal_name;

    #[test]
    fn internal_name_splits_at_last_slash() {
        assert_eq!(
            split_internal_name("java/util/Map"),
            ("java.util".to_owned(), "Map".to_owned())
        );
        assert_eq!(
            split_internal_name("Standalone"),
            (String::new(), "Standalone".to_owned())
        );
        assert_eq!(split_internal_name(""), (String::new(), String::new()));
    }
}
