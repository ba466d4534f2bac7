//! The polymorphic type graph produced by descriptor and signature parsing.

use std::fmt::{self, Display};
use std::sync::{Arc, OnceLock, RwLock, Weak};

use itertools::Itertools;

use crate::jvm::TypeDefinition;
use crate::types::descriptor::InvalidDescriptor;
use crate::utils::{read_lock, write_lock};

/// A primitive type in Java.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum PrimitiveKind {
    /// The `boolean` type.
    Boolean,
    /// The `char` type.
    Char,
    /// The `float` type.
    Float,
    /// The `double` type.
    Double,
    /// The `byte` type.
    Byte,
    /// The `short` type.
    Short,
    /// The `int` type.
    Int,
    /// The `long` type.
    Long,
}

impl PrimitiveKind {
    pub(crate) fn descriptor_str(self) -> &'static str {
        match self {
            Self::Boolean => "Z",
            Self::Char => "C",
            Self::Float => "F",
            Self::Double => "D",
            Self::Byte => "B",
            Self::Short => "S",
            Self::Int => "I",
            Self::Long => "J",
        }
    }
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Char => write!(f, "char"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Byte => write!(f, "byte"),
            Self::Short => write!(f, "short"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
        }
    }
}

impl TryFrom<char> for PrimitiveKind {
    type Error = InvalidDescriptor;

    fn try_from(descriptor: char) -> Result<Self, Self::Error> {
        match descriptor {
            'Z' => Ok(Self::Boolean),
            'C' => Ok(Self::Char),
            'F' => Ok(Self::Float),
            'D' => Ok(Self::Double),
            'B' => Ok(Self::Byte),
            'S' => Ok(Self::Short),
            'I' => Ok(Self::Int),
            'J' => Ok(Self::Long),
            unexpected => Err(InvalidDescriptor(unexpected.to_string())),
        }
    }
}

/// A reference to a class type by internal name, optionally resolved to the
/// [`TypeDefinition`] it names.
///
/// Two `ClassType`s compare equal when their internal names match; the
/// resolution target never participates in equality. The target is held
/// weakly so that a definition whose members mention the defining class
/// does not keep itself alive.
#[derive(Debug)]
pub struct ClassType {
    internal_name: String,
    definition: OnceLock<Weak<TypeDefinition>>,
}

impl ClassType {
    /// Creates an unresolved class type reference.
    pub fn new<S: Into<String>>(internal_name: S) -> Arc<Self> {
        Arc::new(Self {
            internal_name: internal_name.into(),
            definition: OnceLock::new(),
        })
    }

    /// The name of the class with `/` as the package separator.
    #[must_use]
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    /// The definition this reference resolves to, if one has been attached
    /// and is still alive.
    #[must_use]
    pub fn definition(&self) -> Option<Arc<TypeDefinition>> {
        self.definition.get().and_then(Weak::upgrade)
    }

    /// Attaches the resolution target. Later attachments are ignored; the
    /// first one wins.
    pub fn attach_definition(&self, definition: &Arc<TypeDefinition>) {
        let _ = self.definition.set(Arc::downgrade(definition));
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.internal_name == other.internal_name
    }
}

impl Eq for ClassType {}

impl Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.internal_name)
    }
}

/// A named, scoped placeholder introduced by a generic declaration.
///
/// Bounds are filled in after construction because a bound may refer to the
/// parameter being declared (`T extends Comparable<T>`).
pub struct GenericParameter {
    name: String,
    owner: String,
    bounds: RwLock<Vec<TypeReference>>,
}

impl GenericParameter {
    /// Creates a parameter with no bounds yet.
    pub fn new<S: Into<String>, O: Into<String>>(name: S, owner: O) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            owner: owner.into(),
            bounds: RwLock::new(Vec::new()),
        })
    }

    /// The declared name of the parameter.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope that declares the parameter.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The upper bounds; empty means the implicit top type.
    #[must_use]
    pub fn bounds(&self) -> Vec<TypeReference> {
        read_lock(&self.bounds).clone()
    }

    pub(crate) fn set_bounds(&self, bounds: Vec<TypeReference>) {
        *write_lock(&self.bounds) = bounds;
    }
}

impl PartialEq for GenericParameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.owner == other.owner
    }
}

impl Eq for GenericParameter {}

// Bounds may contain the parameter itself, so the derived impl would
// recurse forever.
impl fmt::Debug for GenericParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericParameter")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Display for GenericParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The bound of a wildcard type argument.
#[derive(Debug, PartialEq, Clone)]
pub enum WildcardBound {
    /// `?`
    Unbounded,
    /// `? extends T`
    Extends(Box<TypeReference>),
    /// `? super T`
    Super(Box<TypeReference>),
}

/// A polymorphic type descriptor.
///
/// Equality is structural: class types compare by internal name plus type
/// arguments, never by resolution target.
#[derive(Debug, PartialEq, Clone)]
pub enum TypeReference {
    /// A primitive type.
    Primitive(PrimitiveKind),
    /// A class or interface type.
    Class(Arc<ClassType>),
    /// An array type.
    Array(Box<TypeReference>),
    /// A generic type application such as `Map<String, Integer>`.
    Parameterized {
        /// The raw class type being applied.
        raw: Arc<ClassType>,
        /// The type arguments, wildcards included.
        type_arguments: Vec<TypeReference>,
    },
    /// A wildcard type argument.
    Wildcard(WildcardBound),
    /// A reference to a type variable in an enclosing generic scope.
    Variable(Arc<GenericParameter>),
    /// A capture-converted wildcard.
    Captured {
        /// The wildcard that was captured.
        wildcard: WildcardBound,
        /// The bound the capture was narrowed to.
        bound: Box<TypeReference>,
    },
}

impl TypeReference {
    /// Creates an array type with this type as its elements.
    #[must_use]
    pub fn make_array_type(&self) -> Self {
        Self::Array(Box::new(self.clone()))
    }

    /// Prints the erased descriptor of the type.
    ///
    /// For types expressible in the descriptor grammar this reproduces the
    /// descriptor byte-for-byte; generic constructs print their erasure.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.descriptor_str().to_owned(),
            Self::Class(class) => format!("L{};", class.internal_name()),
            Self::Array(element) => format!("[{}", element.descriptor()),
            Self::Parameterized { raw, .. } => format!("L{};", raw.internal_name()),
            Self::Variable(parameter) => parameter
                .bounds()
                .first()
                .map_or_else(|| "Ljava/lang/Object;".to_owned(), Self::descriptor),
            Self::Wildcard(WildcardBound::Extends(bound)) | Self::Captured { bound, .. } => {
                bound.descriptor()
            }
            Self::Wildcard(_) => "Ljava/lang/Object;".to_owned(),
        }
    }
}

impl Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => kind.fmt(f),
            Self::Class(class) => class.fmt(f),
            Self::Array(element) => write!(f, "{element}[]"),
            Self::Parameterized {
                raw,
                type_arguments,
            } => {
                write!(f, "{raw}<{}>", type_arguments.iter().join(", "))
            }
            Self::Wildcard(WildcardBound::Unbounded) => write!(f, "?"),
            Self::Wildcard(WildcardBound::Extends(bound)) => write!(f, "? extends {bound}"),
            Self::Wildcard(WildcardBound::Super(bound)) => write!(f, "? super {bound}"),
            Self::Variable(parameter) => parameter.fmt(f),
            Self::Captured { wildcard, bound } => {
                let wildcard = Self::Wildcard(wildcard.clone());
                write!(f, "capture of {wildcard} as {bound}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_descriptor_str() {
        assert_eq!(PrimitiveKind::Boolean.descriptor_str(), "Z");
        assert_eq!(PrimitiveKind::Char.descriptor_str(), "C");
        assert_eq!(PrimitiveKind::Float.descriptor_str(), "F");
        assert_eq!(PrimitiveKind::Double.descriptor_str(), "D");
        assert_eq!(PrimitiveKind::Byte.descriptor_str(), "B");
        assert_eq!(PrimitiveKind::Short.descriptor_str(), "S");
        assert_eq!(PrimitiveKind::Int.descriptor_str(), "I");
        assert_eq!(PrimitiveKind::Long.descriptor_str(), "J");
    }

    #[test]
    fn class_type_equality_ignores_resolution() {
        let unresolved = ClassType::new("java/lang/String");
        let resolved = ClassType::new("java/lang/String");
        resolved.attach_definition(&TypeDefinition::new());
        assert_eq!(unresolved, resolved);
    }

    #[test]
    fn attach_definition_first_wins() {
        let class = ClassType::new("org/pkg/A");
        let first = TypeDefinition::new();
        let second = TypeDefinition::new();
        class.attach_definition(&first);
        class.attach_definition(&second);
        assert!(
            class
                .definition()
                .is_some_and(|it| Arc::ptr_eq(&it, &first))
        );
    }

    #[test]
    fn array_display() {
        let ints = TypeReference::Primitive(PrimitiveKind::Int).make_array_type();
        assert_eq!(ints.to_string(), "int[]");
        assert_eq!(ints.descriptor(), "[I");
    }

    #[test]
    fn parameterized_display() {
        let string = TypeReference::Class(ClassType::new("java/lang/String"));
        let list = TypeReference::Parameterized {
            raw: ClassType::new("java/util/List"),
            type_arguments: vec![TypeReference::Wildcard(WildcardBound::Extends(Box::new(
                string,
            )))],
        };
        assert_eq!(list.to_string(), "java/util/List<? extends java/lang/String>");
        assert_eq!(list.descriptor(), "Ljava/util/List;");
    }

    #[test]
    fn variable_erases_to_first_bound() {
        let parameter = GenericParameter::new("T", "org/pkg/A");
        assert_eq!(
            TypeReference::Variable(parameter.clone()).descriptor(),
            "Ljava/lang/Object;"
        );
        parameter.set_bounds(vec![TypeReference::Class(ClassType::new(
            "java/lang/Number",
        ))]);
        assert_eq!(
            TypeReference::Variable(parameter).descriptor(),
            "Ljava/lang/Number;"
        );
    }
}
