//! The per-class table of shared constants referenced by index from every
//! other structure in the class file.
#![doc = see_jvm_spec!(4, 4)]

use std::str::FromStr;

use crate::jvm::field::{ConstantValue, JavaString};
use crate::jvm::references::{FieldRef, MethodHandle, MethodRef};
use crate::macros::see_jvm_spec;
use crate::types::descriptor::MethodDescriptor;
use crate::types::type_reference::{ClassType, TypeReference};

use super::buffer::Buffer;
use super::errors::{Error, Result};

/// A decoded constant pool.
///
/// Entries are indexed from 1; index 0 is reserved and always invalid.
/// `Long` and `Double` entries occupy two consecutive slots and the second
/// slot is unusable. Entries that carry indices into the pool (a class
/// entry naming its UTF-8 name, for instance) resolve those indices lazily
/// at lookup time, so an entry may refer to a slot decoded after it.
#[derive(Debug)]
pub struct ConstantPool {
    entries: Vec<Option<ConstantPoolEntry>>,
}

impl ConstantPool {
    /// Decodes the pool: a `u2` count `N` followed by `N - 1` usable
    /// entries.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn decode(buffer: &mut Buffer) -> Result<Self> {
        let count: u16 = buffer.read_value()?;
        let mut entries = vec![None; count as usize];
        let mut index: u16 = 1;
        while index < count {
            let entry = ConstantPoolEntry::decode(buffer)?;
            let width = entry.slot_width();
            entries[index as usize] = Some(entry);
            index = index.saturating_add(width);
        }
        Ok(Self { entries })
    }

    /// The entry at `index`.
    ///
    /// # Errors
    /// [`Error::InvalidConstantPoolIndex`] for index 0, an out-of-range
    /// index, or the second slot of a `Long` or `Double`.
    pub fn entry(&self, index: u16) -> Result<&ConstantPoolEntry> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    /// The string carried by the `Utf8` entry at `index`.
    ///
    /// # Errors
    /// See [`Error`]; strings that are not valid modified UTF-8 raise
    /// [`Error::BrokenUtf8`].
    pub fn utf8(&self, index: u16) -> Result<&str> {
        let entry = self.entry(index)?;
        match entry {
            ConstantPoolEntry::Utf8(JavaString::Utf8(string)) => Ok(string),
            ConstantPoolEntry::Utf8(JavaString::InvalidUtf8(_)) => Err(Error::BrokenUtf8),
            _ => Err(mismatch("Utf8", entry)),
        }
    }

    /// The internal name carried by the `Class` entry at `index`.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn class_name(&self, index: u16) -> Result<&str> {
        let entry = self.entry(index)?;
        let &ConstantPoolEntry::Class { name_index } = entry else {
            return Err(mismatch("Class", entry));
        };
        self.utf8(name_index)
    }

    /// The `(name, descriptor)` pair carried by the `NameAndType` entry at
    /// `index`.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        let entry = self.entry(index)?;
        let &ConstantPoolEntry::NameAndType {
            name_index,
            descriptor_index,
        } = entry
        else {
            return Err(mismatch("NameAndType", entry));
        };
        Ok((self.utf8(name_index)?, self.utf8(descriptor_index)?))
    }

    /// The loadable constant at `index`.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn constant_value(&self, index: u16) -> Result<ConstantValue> {
        let entry = self.entry(index)?;
        match *entry {
            ConstantPoolEntry::Integer(it) => Ok(ConstantValue::Integer(it)),
            ConstantPoolEntry::Long(it) => Ok(ConstantValue::Long(it)),
            ConstantPoolEntry::Float(it) => Ok(ConstantValue::Float(it)),
            ConstantPoolEntry::Double(it) => Ok(ConstantValue::Double(it)),
            ConstantPoolEntry::String { string_index } => {
                let string_entry = self.entry(string_index)?;
                if let ConstantPoolEntry::Utf8(string) = string_entry {
                    Ok(ConstantValue::String(string.clone()))
                } else {
                    Err(mismatch("Utf8", string_entry))
                }
            }
            ConstantPoolEntry::Class { .. } => {
                self.class_literal(index).map(ConstantValue::Class)
            }
            ConstantPoolEntry::MethodType { descriptor_index } => {
                let descriptor = MethodDescriptor::from_str(self.utf8(descriptor_index)?)?;
                Ok(ConstantValue::MethodType(descriptor))
            }
            ConstantPoolEntry::MethodHandle { .. } => {
                self.method_handle(index).map(ConstantValue::Handle)
            }
            ConstantPoolEntry::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(name_and_type_index)?;
                let constant_type = TypeReference::from_str(descriptor)?;
                Ok(ConstantValue::Dynamic(
                    bootstrap_method_attr_index,
                    name.to_owned(),
                    constant_type,
                ))
            }
            ref unexpected => Err(mismatch(
                "Integer | Long | Float | Double | String | Class | MethodType | MethodHandle | Dynamic",
                unexpected,
            )),
        }
    }

    /// The field reference at `index`.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn field_ref(&self, index: u16) -> Result<FieldRef> {
        let entry = self.entry(index)?;
        let &ConstantPoolEntry::FieldRef {
            class_index,
            name_and_type_index,
        } = entry
        else {
            return Err(mismatch("FieldRef", entry));
        };
        let owner = ClassType::new(self.class_name(class_index)?);
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        let field_type = TypeReference::from_str(descriptor)?;
        Ok(FieldRef {
            owner,
            name: name.to_owned(),
            field_type,
        })
    }

    /// The method or interface-method reference at `index`.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn method_ref(&self, index: u16) -> Result<MethodRef> {
        let entry = self.entry(index)?;
        let (&ConstantPoolEntry::MethodRef {
            class_index,
            name_and_type_index,
        }
        | &ConstantPoolEntry::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        }) = entry
        else {
            return Err(mismatch("MethodRef | InterfaceMethodRef", entry));
        };
        let owner = ClassType::new(self.class_name(class_index)?);
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        let descriptor = MethodDescriptor::from_str(descriptor)?;
        Ok(MethodRef {
            owner,
            name: name.to_owned(),
            descriptor,
        })
    }

    /// The method handle at `index`.
    ///
    /// # Errors
    /// See [`Error`].
    pub fn method_handle(&self, index: u16) -> Result<MethodHandle> {
        let entry = self.entry(index)?;
        let &ConstantPoolEntry::MethodHandle {
            reference_kind,
            reference_index,
        } = entry
        else {
            return Err(mismatch("MethodHandle", entry));
        };
        let handle = match reference_kind {
            1 => MethodHandle::GetField(self.field_ref(reference_index)?),
            2 => MethodHandle::GetStatic(self.field_ref(reference_index)?),
            3 => MethodHandle::PutField(self.field_ref(reference_index)?),
            4 => MethodHandle::PutStatic(self.field_ref(reference_index)?),
            5 => MethodHandle::InvokeVirtual(self.method_ref(reference_index)?),
            6 => MethodHandle::InvokeStatic(self.method_ref(reference_index)?),
            7 => MethodHandle::InvokeSpecial(self.method_ref(reference_index)?),
            8 => MethodHandle::NewInvokeSpecial(self.method_ref(reference_index)?),
            9 => MethodHandle::InvokeInterface(self.method_ref(reference_index)?),
            _ => {
                return Err(Error::MalformedClassFile(
                    "Invalid reference kind in method handle",
                ));
            }
        };
        Ok(handle)
    }

    // A class entry may name an array type, in which case its "name" is a
    // descriptor rather than an internal name.
    fn class_literal(&self, index: u16) -> Result<TypeReference> {
        let name = self.class_name(index)?;
        if name.starts_with('[') {
            Ok(TypeReference::from_str(name)?)
        } else {
            Ok(TypeReference::Class(ClassType::new(name)))
        }
    }
}

fn mismatch(expected: &'static str, entry: &ConstantPoolEntry) -> Error {
    Error::UnexpectedConstantPoolTag {
        expected,
        found: entry.constant_kind(),
    }
}

/// An entry in the [`ConstantPool`].
#[derive(Debug, Clone)]
pub enum ConstantPoolEntry {
    /// A string in modified UTF-8.
    Utf8(JavaString),
    /// An `int` constant.
    Integer(i32),
    /// A `float` constant.
    Float(f32),
    /// A `long` constant. Occupies two slots.
    Long(i64),
    /// A `double` constant. Occupies two slots.
    Double(f64),
    /// A class, referencing its internal name.
    Class {
        /// Index of the `Utf8` entry holding the internal name.
        name_index: u16,
    },
    /// A string constant, referencing its contents.
    String {
        /// Index of the `Utf8` entry holding the contents.
        string_index: u16,
    },
    /// A reference to a field.
    FieldRef {
        /// Index of the `Class` entry for the declaring class.
        class_index: u16,
        /// Index of the `NameAndType` entry for the field.
        name_and_type_index: u16,
    },
    /// A reference to a class method.
    MethodRef {
        /// Index of the `Class` entry for the declaring class.
        class_index: u16,
        /// Index of the `NameAndType` entry for the method.
        name_and_type_index: u16,
    },
    /// A reference to an interface method.
    InterfaceMethodRef {
        /// Index of the `Class` entry for the declaring interface.
        class_index: u16,
        /// Index of the `NameAndType` entry for the method.
        name_and_type_index: u16,
    },
    /// A name paired with a descriptor.
    NameAndType {
        /// Index of the `Utf8` entry holding the name.
        name_index: u16,
        /// Index of the `Utf8` entry holding the descriptor.
        descriptor_index: u16,
    },
    /// A method handle.
    MethodHandle {
        /// The kind of the handle (1 through 9).
        reference_kind: u8,
        /// Index of the member-reference entry the handle points at.
        reference_index: u16,
    },
    /// A method type.
    MethodType {
        /// Index of the `Utf8` entry holding the method descriptor.
        descriptor_index: u16,
    },
    /// A dynamically computed constant.
    Dynamic {
        /// Index into the bootstrap method table.
        bootstrap_method_attr_index: u16,
        /// Index of the `NameAndType` entry for the constant.
        name_and_type_index: u16,
    },
    /// An `invokedynamic` call site.
    InvokeDynamic {
        /// Index into the bootstrap method table.
        bootstrap_method_attr_index: u16,
        /// Index of the `NameAndType` entry for the call site.
        name_and_type_index: u16,
    },
    /// A module.
    Module {
        /// Index of the `Utf8` entry holding the module name.
        name_index: u16,
    },
    /// A package.
    Package {
        /// Index of the `Utf8` entry holding the package name.
        name_index: u16,
    },
}

impl ConstantPoolEntry {
    fn decode(buffer: &mut Buffer) -> Result<Self> {
        let tag: u8 = buffer.read_value()?;
        let entry = match tag {
            1 => {
                let length: u16 = buffer.read_value()?;
                let content = buffer.read_bytes(length as usize)?;
                match cesu8::from_java_cesu8(&content) {
                    Ok(string) => Self::Utf8(JavaString::Utf8(string.into_owned())),
                    Err(_) => Self::Utf8(JavaString::InvalidUtf8(content)),
                }
            }
            3 => Self::Integer(buffer.read_value()?),
            4 => Self::Float(buffer.read_value()?),
            5 => Self::Long(buffer.read_value()?),
            6 => Self::Double(buffer.read_value()?),
            7 => Self::Class {
                name_index: buffer.read_value()?,
            },
            8 => Self::String {
                string_index: buffer.read_value()?,
            },
            9 => Self::FieldRef {
                class_index: buffer.read_value()?,
                name_and_type_index: buffer.read_value()?,
            },
            10 => Self::MethodRef {
                class_index: buffer.read_value()?,
                name_and_type_index: buffer.read_value()?,
            },
            11 => Self::InterfaceMethodRef {
                class_index: buffer.read_value()?,
                name_and_type_index: buffer.read_value()?,
            },
            12 => Self::NameAndType {
                name_index: buffer.read_value()?,
                descriptor_index: buffer.read_value()?,
            },
            15 => Self::MethodHandle {
                reference_kind: buffer.read_value()?,
                reference_index: buffer.read_value()?,
            },
            16 => Self::MethodType {
                descriptor_index: buffer.read_value()?,
            },
            17 => Self::Dynamic {
                bootstrap_method_attr_index: buffer.read_value()?,
                name_and_type_index: buffer.read_value()?,
            },
            18 => Self::InvokeDynamic {
                bootstrap_method_attr_index: buffer.read_value()?,
                name_and_type_index: buffer.read_value()?,
            },
            19 => Self::Module {
                name_index: buffer.read_value()?,
            },
            20 => Self::Package {
                name_index: buffer.read_value()?,
            },
            it => return Err(Error::UnknownConstantPoolTag(it)),
        };
        Ok(entry)
    }

    const fn slot_width(&self) -> u16 {
        match self {
            Self::Long(_) | Self::Double(_) => 2,
            _ => 1,
        }
    }

    /// The kind of this entry, as named by the class-file format.
    #[must_use]
    pub const fn constant_kind<'a>(&self) -> &'a str {
        match self {
            Self::Utf8(_) => "CONSTANT_Utf8",
            Self::Integer(_) => "CONSTANT_Integer",
            Self::Float(_) => "CONSTANT_Float",
            Self::Long(_) => "CONSTANT_Long",
            Self::Double(_) => "CONSTANT_Double",
            Self::Class { .. } => "CONSTANT_Class",
            Self::String { .. } => "CONSTANT_String",
            Self::FieldRef { .. } => "CONSTANT_Fieldref",
            Self::MethodRef { .. } => "CONSTANT_Methodref",
            Self::InterfaceMethodRef { .. } => "CONSTANT_InterfaceMethodref",
            Self::NameAndType { .. } => "CONSTANT_NameAndType",
            Self::MethodHandle { .. } => "CONSTANT_MethodHandle",
            Self::MethodType { .. } => "CONSTANT_MethodType",
            Self::Dynamic { .. } => "CONSTANT_Dynamic",
            Self::InvokeDynamic { .. } => "CONSTANT_InvokeDynamic",
            Self::Module { .. } => "CONSTANT_Module",
            Self::Package { .. } => "CONSTANT_Package",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_entry(text: &str) -> Vec<u8> {
        let mut bytes = vec![1];
        bytes.extend(u16::try_from(text.len()).unwrap().to_be_bytes());
        bytes.extend(text.as_bytes());
        bytes
    }

    fn pool_bytes(count: u16, entries: &[Vec<u8>]) -> Buffer {
        let mut bytes = count.to_be_bytes().to_vec();
        for entry in entries {
            bytes.extend(entry);
        }
        Buffer::new(bytes)
    }

    #[test]
    fn index_zero_is_invalid() {
        let pool = ConstantPool::decode(&mut pool_bytes(1, &[])).unwrap();
        assert!(matches!(
            pool.entry(0),
            Err(Error::InvalidConstantPoolIndex(0))
        ));
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let pool = ConstantPool::decode(&mut pool_bytes(2, &[utf8_entry("a")])).unwrap();
        assert!(pool.entry(1).is_ok());
        assert!(matches!(
            pool.entry(2),
            Err(Error::InvalidConstantPoolIndex(2))
        ));
    }

    #[test]
    fn long_occupies_two_slots() {
        let mut long_entry = vec![5];
        long_entry.extend(42i64.to_be_bytes());
        let pool =
            ConstantPool::decode(&mut pool_bytes(4, &[long_entry, utf8_entry("a")])).unwrap();
        assert!(matches!(
            pool.entry(1),
            Ok(ConstantPoolEntry::Long(42))
        ));
        assert!(matches!(
            pool.entry(2),
            Err(Error::InvalidConstantPoolIndex(2))
        ));
        assert_eq!(pool.utf8(3).unwrap(), "a");
    }

    #[test]
    fn forward_reference_within_the_table_resolves() {
        // The class entry at index 1 names the UTF-8 entry at index 2,
        // which is decoded after it.
        let class_entry = vec![7, 0x00, 0x02];
        let pool = ConstantPool::decode(&mut pool_bytes(
            3,
            &[class_entry, utf8_entry("org/pkg/Later")],
        ))
        .unwrap();
        assert_eq!(pool.class_name(1).unwrap(), "org/pkg/Later");
    }

    #[test]
    fn typed_lookup_reports_mismatch() {
        let pool = ConstantPool::decode(&mut pool_bytes(2, &[utf8_entry("a")])).unwrap();
        let err = pool.class_name(1).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedConstantPoolTag {
                expected: "Class",
                found: "CONSTANT_Utf8",
            }
        ));
    }

    #[test]
    fn string_constant_resolves_lazily() {
        let string_entry = vec![8, 0x00, 0x02];
        let pool = ConstantPool::decode(&mut pool_bytes(
            3,
            &[string_entry, utf8_entry("hello")],
        ))
        .unwrap();
        assert_eq!(
            pool.constant_value(1).unwrap(),
            ConstantValue::String(JavaString::Utf8("hello".to_owned()))
        );
    }

    #[test]
    fn array_class_literal_parses_as_descriptor() {
        let class_entry = vec![7, 0x00, 0x02];
        let pool =
            ConstantPool::decode(&mut pool_bytes(3, &[class_entry, utf8_entry("[I")])).unwrap();
        let ConstantValue::Class(TypeReference::Array(element)) = pool.constant_value(1).unwrap()
        else {
            panic!("Expected an array class literal");
        };
        assert_eq!(
            *element,
            TypeReference::Primitive(crate::types::type_reference::PrimitiveKind::Int)
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bogus = vec![2, 0x00, 0x00];
        let result = ConstantPool::decode(&mut pool_bytes(2, &[bogus]));
        assert!(matches!(result, Err(Error::UnknownConstantPoolTag(2))));
    }

    #[test]
    fn truncated_entry_is_malformed() {
        let truncated = vec![3, 0x00];
        let result = ConstantPool::decode(&mut pool_bytes(2, &[truncated]));
        assert!(matches!(result, Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn method_handle_resolves_reference_chain() {
        let entries = vec![
            vec![15, 6, 0x00, 0x02],             // 1: MethodHandle invokestatic -> 2
            vec![10, 0x00, 0x03, 0x00, 0x05],    // 2: MethodRef -> class 3, nat 5
            vec![7, 0x00, 0x04],                 // 3: Class -> 4
            utf8_entry("org/pkg/Util"),          // 4
            vec![12, 0x00, 0x06, 0x00, 0x07],    // 5: NameAndType -> 6, 7
            utf8_entry("nop"),                   // 6
            utf8_entry("()V"),                   // 7
        ];
        let pool = ConstantPool::decode(&mut pool_bytes(8, &entries)).unwrap();
        let MethodHandle::InvokeStatic(method) = pool.method_handle(1).unwrap() else {
            panic!("Expected an invokestatic handle");
        };
        assert_eq!(method.owner.internal_name(), "org/pkg/Util");
        assert_eq!(method.name, "nop");
        assert_eq!(method.descriptor.to_string(), "()V");
    }
}
