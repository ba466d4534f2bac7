//! The non-generic descriptor grammar.
#![doc = see_jvm_spec!(4, 3)]

use std::fmt::{self, Display};
use std::str::FromStr;

use itertools::Itertools;

use crate::macros::see_jvm_spec;

use super::type_reference::{ClassType, PrimitiveKind, TypeReference};

const PARAM_START: char = '(';
const PARAM_END: char = ')';
const ARRAY_MARKER: char = '[';
const OBJECT_MARKER: char = 'L';
const OBJECT_END: char = ';';

/// An error indicating that a descriptor string is invalid.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("Invalid descriptor: {0}")]
pub struct InvalidDescriptor(
    /// The offending descriptor text.
    pub String,
);

impl FromStr for TypeReference {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let mut chars = descriptor.chars();
        match chars.next() {
            Some(ARRAY_MARKER) => Self::from_str(chars.as_str())
                .map(|element| element.make_array_type())
                .map_err(|_| InvalidDescriptor(descriptor.to_owned())),
            Some(OBJECT_MARKER) => {
                let internal_name = chars
                    .take_while_ref(|it| it != &OBJECT_END)
                    .collect::<String>();
                match (chars.next(), chars.next()) {
                    (Some(OBJECT_END), None) => Ok(Self::Class(ClassType::new(internal_name))),
                    _ => Err(InvalidDescriptor(descriptor.to_owned())),
                }
            }
            Some(primitive) => match chars.next() {
                None => PrimitiveKind::try_from(primitive)
                    .map(Self::Primitive)
                    .map_err(|_| InvalidDescriptor(descriptor.to_owned())),
                _ => Err(InvalidDescriptor(descriptor.to_owned())),
            },
            None => Err(InvalidDescriptor(descriptor.to_owned())),
        }
    }
}

/// Denotes the return type of a method.
#[derive(Debug, PartialEq, Clone, derive_more::Display, derive_more::From)]
pub enum ReturnType {
    /// The method returns a specific type.
    #[display("{_0}")]
    Some(TypeReference),
    /// The return type of the method is `void`.
    #[display("void")]
    Void,
}

impl ReturnType {
    /// Prints the descriptor of the return type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Some(it) => it.descriptor(),
            Self::Void => "V".to_owned(),
        }
    }
}

impl FromStr for ReturnType {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        if descriptor == "V" {
            Ok(Self::Void)
        } else {
            TypeReference::from_str(descriptor).map(Self::Some)
        }
    }
}

/// The descriptor of a method: its parameter types and return type.
#[doc = see_jvm_spec!(4, 3, 3)]
#[derive(Debug, PartialEq, Clone)]
pub struct MethodDescriptor {
    /// The types of the parameters.
    pub parameter_types: Vec<TypeReference>,
    /// The return type.
    pub return_type: ReturnType,
}

impl Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}){}",
            self.parameter_types
                .iter()
                .map(TypeReference::descriptor)
                .join(""),
            self.return_type.descriptor()
        )
    }
}

impl FromStr for MethodDescriptor {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let remaining = descriptor
            .strip_prefix(PARAM_START)
            .ok_or_else(|| InvalidDescriptor(descriptor.to_owned()))?;
        let (parameter_types, remaining) =
            parse_parameters(remaining).map_err(|_| InvalidDescriptor(descriptor.to_owned()))?;
        let return_type = ReturnType::from_str(remaining)
            .map_err(|_| InvalidDescriptor(descriptor.to_owned()))?;
        Ok(Self {
            parameter_types,
            return_type,
        })
    }
}

fn parse_parameters(mut remaining: &str) -> Result<(Vec<TypeReference>, &str), InvalidDescriptor> {
    let mut parameter_types = Vec::new();
    loop {
        if let Some(remaining) = remaining.strip_prefix(PARAM_END) {
            return Ok((parameter_types, remaining));
        }
        let (dimensions, after_dimensions) = parse_array_dimensions(remaining)?;
        let (base_type, after_parameter) = parse_next_parameter(after_dimensions)?;
        let parameter = (0..dimensions).fold(base_type, |element, _| element.make_array_type());
        parameter_types.push(parameter);
        remaining = after_parameter;
    }
}

fn parse_next_parameter(input: &str) -> Result<(TypeReference, &str), InvalidDescriptor> {
    let (first_char, remaining) = input
        .chars()
        .next()
        .map(|c| (c, &input[c.len_utf8()..]))
        .ok_or_else(|| InvalidDescriptor(input.to_owned()))?;

    match first_char {
        OBJECT_MARKER => {
            let (internal_name, rest) = remaining
                .split_once(OBJECT_END)
                .ok_or_else(|| InvalidDescriptor(input.to_owned()))?;
            Ok((TypeReference::Class(ClassType::new(internal_name)), rest))
        }
        primitive => {
            let parameter = PrimitiveKind::try_from(primitive).map(TypeReference::Primitive)?;
            Ok((parameter, remaining))
        }
    }
}

fn parse_array_dimensions(input: &str) -> Result<(u8, &str), InvalidDescriptor> {
    let count = input.chars().take_while(|&c| c == ARRAY_MARKER).count();
    let remaining = &input[count..];
    let dimensions = u8::try_from(count).map_err(|_| InvalidDescriptor(input.to_owned()))?;
    Ok((dimensions, remaining))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tests::{arb_class_name, arb_field_type};

    const MAX_PARAMS: usize = 10;

    fn arb_return_type() -> impl Strategy<Value = ReturnType> {
        prop_oneof![
            Just(ReturnType::Void),
            arb_field_type().prop_map(ReturnType::Some),
        ]
    }

    proptest! {
        #[test]
        fn field_descriptor_round_trip(field_type in arb_field_type()) {
            let descriptor = field_type.descriptor();
            let parsed = TypeReference::from_str(&descriptor)
                .expect("Failed to parse field descriptor");
            prop_assert_eq!(parsed.descriptor(), descriptor);
        }

        #[test]
        fn method_descriptor_round_trip(
            parameters in prop::collection::vec(arb_field_type(), 0..MAX_PARAMS),
            ret in arb_return_type(),
        ) {
            let descriptor = format!(
                "({}){}",
                parameters.iter().map(TypeReference::descriptor).join(""),
                ret.descriptor()
            );
            let parsed = MethodDescriptor::from_str(&descriptor)
                .expect("Failed to parse method descriptor");
            prop_assert_eq!(&parsed.return_type, &ret);
            prop_assert_eq!(&parsed.parameter_types, &parameters);
            prop_assert_eq!(parsed.to_string(), descriptor);
        }

        #[test]
        fn field_descriptor_from_class_name(class_name in arb_class_name()) {
            let descriptor = format!("L{class_name};");
            let expected = TypeReference::Class(ClassType::new(class_name));
            prop_assert_eq!(TypeReference::from_str(&descriptor), Ok(expected));
        }

        #[test]
        fn trailing_return_types_rejected(
            parameters in prop::collection::vec(arb_field_type(), 0..MAX_PARAMS),
            returns in prop::collection::vec(arb_return_type(), 2..5),
        ) {
            let descriptor = format!(
                "({}){}",
                parameters.iter().map(TypeReference::descriptor).join(""),
                returns.iter().map(ReturnType::descriptor).join(""),
            );
            prop_assert!(MethodDescriptor::from_str(&descriptor).is_err());
        }
    }

    #[test]
    fn mixed_method_descriptor() {
        let parsed = MethodDescriptor::from_str("(ILjava/lang/String;[I)V")
            .expect("Failed to parse method descriptor");
        assert_eq!(
            parsed.parameter_types,
            vec![
                TypeReference::Primitive(PrimitiveKind::Int),
                TypeReference::Class(ClassType::new("java/lang/String")),
                TypeReference::Primitive(PrimitiveKind::Int).make_array_type(),
            ]
        );
        assert_eq!(parsed.return_type, ReturnType::Void);
        assert_eq!(parsed.to_string(), "(ILjava/lang/String;[I)V");
    }

    #[test]
    fn empty_descriptor() {
        assert!(MethodDescriptor::from_str("").is_err());
    }

    #[test]
    fn incomplete_return_type() {
        assert!(MethodDescriptor::from_str("()Ljava/lang").is_err());
    }

    #[test]
    fn missing_return_type() {
        assert!(MethodDescriptor::from_str("(I)").is_err());
    }

    #[test]
    fn missing_semicolon() {
        assert!(MethodDescriptor::from_str("(I[Ljava/lang/StringJ)V").is_err());
    }

    #[test]
    fn void_parameter_rejected() {
        assert!(MethodDescriptor::from_str("(V[Ljava/lang/String;J)V").is_err());
    }

    #[test]
    fn void_field_descriptor_rejected() {
        assert!(TypeReference::from_str("V").is_err());
    }
}
