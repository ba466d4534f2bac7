//! The generic signature grammar, a superset of the descriptor grammar
//! carried in `Signature` attributes.
#![doc = see_jvm_spec!(4, 7, 9, 1)]
//!
//! Parsing is a single forward pass with at most one character of
//! lookahead. Type variables resolve against a [`GenericContext`], a stack
//! of formal-type-parameter scopes maintained by the caller; names not
//! declared by any enclosing scope fall back to the resolver and are an
//! error when that misses too.

use std::sync::Arc;

use crate::jvm::resolver::MetadataResolver;
use crate::macros::see_jvm_spec;

use super::descriptor::ReturnType;
use super::type_reference::{
    ClassType, GenericParameter, PrimitiveKind, TypeReference, WildcardBound,
};

/// An error raised while parsing a generic signature.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The signature violates the grammar.
    #[error("Malformed signature at offset {offset}: expected {expected}")]
    Malformed {
        /// Byte offset of the violation within the signature string.
        offset: usize,
        /// What the grammar expected at that offset.
        expected: &'static str,
    },
    /// The signature references a type variable no enclosing scope declares.
    #[error("Unresolved type variable `{name}` at offset {offset}")]
    UnresolvedTypeVariable {
        /// The undeclared variable name.
        name: String,
        /// Byte offset of the reference within the signature string.
        offset: usize,
    },
}

/// The generic signature of a class: formal type parameters, the generic
/// superclass, and the generic superinterfaces.
#[derive(Debug, PartialEq, Clone)]
pub struct ClassSignature {
    /// The formal type parameters declared by the class.
    pub formal_parameters: Vec<Arc<GenericParameter>>,
    /// The possibly parameterized superclass.
    pub super_class: TypeReference,
    /// The possibly parameterized superinterfaces.
    pub interfaces: Vec<TypeReference>,
}

/// The generic signature of a method.
///
/// The formal type parameters scope over the parameter types, the return
/// type, and the thrown types.
#[derive(Debug, PartialEq, Clone)]
pub struct MethodSignature {
    /// The formal type parameters declared by the method.
    pub formal_parameters: Vec<Arc<GenericParameter>>,
    /// The generic parameter types.
    pub parameter_types: Vec<TypeReference>,
    /// The generic return type.
    pub return_type: ReturnType,
    /// The generic thrown types.
    pub thrown_types: Vec<TypeReference>,
}

/// A stack of formal-type-parameter scopes, innermost last.
#[derive(Debug, Default)]
pub struct GenericContext {
    scopes: Vec<GenericScope>,
}

#[derive(Debug)]
struct GenericScope {
    owner: String,
    parameters: Vec<Arc<GenericParameter>>,
}

impl GenericContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a scope owned by `owner` with the given parameters.
    pub fn push_scope<S: Into<String>>(&mut self, owner: S, parameters: Vec<Arc<GenericParameter>>) {
        self.scopes.push(GenericScope {
            owner: owner.into(),
            parameters,
        });
    }

    /// Leaves the innermost scope, returning its parameters.
    pub fn pop_scope(&mut self) -> Option<Vec<Arc<GenericParameter>>> {
        self.scopes.pop().map(|scope| scope.parameters)
    }

    /// Adds a parameter to the innermost scope. Parameters become visible
    /// as soon as they are added, so a bound may refer to the parameter it
    /// belongs to.
    pub fn add_parameter(&mut self, parameter: Arc<GenericParameter>) {
        debug_assert!(!self.scopes.is_empty(), "no scope to add a parameter to");
        if let Some(scope) = self.scopes.last_mut() {
            scope.parameters.push(parameter);
        }
    }

    /// Resolves a type-variable name against the scopes, innermost first.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<GenericParameter>> {
        self.scopes.iter().rev().find_map(|scope| {
            scope
                .parameters
                .iter()
                .find(|parameter| parameter.name() == name)
                .cloned()
        })
    }

    /// The number of scopes currently entered.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn innermost_owner(&self) -> Option<&str> {
        self.scopes.last().map(|scope| scope.owner.as_str())
    }
}

/// Parses a class signature. A fresh scope owned by `owner` is entered for
/// the duration of the parse and its parameters are returned in the result;
/// the scope is left again even when parsing fails.
///
/// # Errors
/// See [`SignatureError`].
pub fn parse_class_signature(
    signature: &str,
    owner: &str,
    context: &mut GenericContext,
    resolver: Option<&MetadataResolver>,
) -> Result<ClassSignature, SignatureError> {
    context.push_scope(owner, Vec::new());
    let result = SignatureParser::new(signature, context, resolver).class_signature();
    let formal_parameters = context.pop_scope().unwrap_or_default();
    let (super_class, interfaces) = result?;
    Ok(ClassSignature {
        formal_parameters,
        super_class,
        interfaces,
    })
}

/// Parses a method signature under the scopes already entered in `context`
/// (typically the declaring class's). The method's own scope is entered and
/// left internally.
///
/// # Errors
/// See [`SignatureError`].
pub fn parse_method_signature(
    signature: &str,
    owner: &str,
    context: &mut GenericContext,
    resolver: Option<&MetadataResolver>,
) -> Result<MethodSignature, SignatureError> {
    context.push_scope(owner, Vec::new());
    let result = SignatureParser::new(signature, context, resolver).method_signature();
    let formal_parameters = context.pop_scope().unwrap_or_default();
    let (parameter_types, return_type, thrown_types) = result?;
    Ok(MethodSignature {
        formal_parameters,
        parameter_types,
        return_type,
        thrown_types,
    })
}

/// Parses a field type signature (the signature of a field, local
/// variable, or record component).
///
/// # Errors
/// See [`SignatureError`].
pub fn parse_field_signature(
    signature: &str,
    context: &mut GenericContext,
    resolver: Option<&MetadataResolver>,
) -> Result<TypeReference, SignatureError> {
    let mut parser = SignatureParser::new(signature, context, resolver);
    let result = parser.field_type_signature()?;
    parser.finish()?;
    Ok(result)
}

struct SignatureParser<'i, 'c> {
    input: &'i str,
    offset: usize,
    context: &'c mut GenericContext,
    resolver: Option<&'c MetadataResolver>,
}

impl<'i, 'c> SignatureParser<'i, 'c> {
    fn new(
        input: &'i str,
        context: &'c mut GenericContext,
        resolver: Option<&'c MetadataResolver>,
    ) -> Self {
        Self {
            input,
            offset: 0,
            context,
            resolver,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.offset += c.len_utf8();
        }
    }

    fn expect(&mut self, expected_char: char, expected: &'static str) -> Result<(), SignatureError> {
        if self.peek() == Some(expected_char) {
            self.bump();
            Ok(())
        } else {
            Err(self.malformed(expected))
        }
    }

    fn malformed(&self, expected: &'static str) -> SignatureError {
        SignatureError::Malformed {
            offset: self.offset,
            expected,
        }
    }

    fn finish(&self) -> Result<(), SignatureError> {
        if self.offset == self.input.len() {
            Ok(())
        } else {
            Err(self.malformed("end of signature"))
        }
    }

    fn class_signature(mut self) -> Result<(TypeReference, Vec<TypeReference>), SignatureError> {
        self.formal_type_parameters()?;
        let super_class = self.class_type_signature()?;
        let mut interfaces = Vec::new();
        while self.offset < self.input.len() {
            interfaces.push(self.class_type_signature()?);
        }
        Ok((super_class, interfaces))
    }

    #[allow(clippy::type_complexity)]
    fn method_signature(
        mut self,
    ) -> Result<(Vec<TypeReference>, ReturnType, Vec<TypeReference>), SignatureError> {
        self.formal_type_parameters()?;
        self.expect('(', "`(`")?;
        let mut parameter_types = Vec::new();
        while self.peek() != Some(')') {
            parameter_types.push(self.type_signature()?);
        }
        self.bump();
        let return_type = if self.peek() == Some('V') {
            self.bump();
            ReturnType::Void
        } else {
            ReturnType::Some(self.type_signature()?)
        };
        let mut thrown_types = Vec::new();
        while self.peek() == Some('^') {
            self.bump();
            let thrown = if self.peek() == Some('T') {
                self.type_variable_signature()?
            } else {
                self.class_type_signature()?
            };
            thrown_types.push(thrown);
        }
        self.finish()?;
        Ok((parameter_types, return_type, thrown_types))
    }

    fn formal_type_parameters(&mut self) -> Result<(), SignatureError> {
        if self.peek() != Some('<') {
            return Ok(());
        }
        self.bump();
        let owner = self
            .context
            .innermost_owner()
            .map(str::to_owned)
            .unwrap_or_default();
        let mut declared = 0usize;
        while self.peek() != Some('>') {
            let name = self.identifier("a type parameter name")?;
            let parameter = GenericParameter::new(name, owner.clone());
            // Visible to its own bounds from here on.
            self.context.add_parameter(parameter.clone());
            self.expect(':', "`:` starting the class bound")?;
            let mut bounds = Vec::new();
            if matches!(self.peek(), Some('L' | '[' | 'T')) {
                bounds.push(self.field_type_signature()?);
            }
            while self.peek() == Some(':') {
                self.bump();
                bounds.push(self.field_type_signature()?);
            }
            parameter.set_bounds(bounds);
            declared += 1;
        }
        self.bump();
        if declared == 0 {
            return Err(self.malformed("at least one formal type parameter"));
        }
        Ok(())
    }

    fn type_signature(&mut self) -> Result<TypeReference, SignatureError> {
        match self.peek() {
            Some(base @ ('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z')) => {
                self.bump();
                PrimitiveKind::try_from(base)
                    .map(TypeReference::Primitive)
                    .map_err(|_| self.malformed("a base type"))
            }
            _ => self.field_type_signature(),
        }
    }

    fn field_type_signature(&mut self) -> Result<TypeReference, SignatureError> {
        match self.peek() {
            Some('L') => self.class_type_signature(),
            Some('[') => {
                self.bump();
                let element = self.type_signature()?;
                Ok(TypeReference::Array(Box::new(element)))
            }
            Some('T') => self.type_variable_signature(),
            _ => Err(self.malformed("a field type signature")),
        }
    }

    fn class_type_signature(&mut self) -> Result<TypeReference, SignatureError> {
        self.expect('L', "`L` starting a class type signature")?;
        let mut internal_name = self.qualified_name()?;
        let mut type_arguments = self.maybe_type_arguments()?;
        while self.peek() == Some('.') {
            self.bump();
            let segment = self.identifier("an inner class name")?;
            internal_name.push('$');
            internal_name.push_str(&segment);
            type_arguments = self.maybe_type_arguments()?;
        }
        self.expect(';', "`;` closing a class type signature")?;
        let raw = self.resolve_class(&internal_name);
        Ok(match type_arguments {
            Some(type_arguments) => TypeReference::Parameterized {
                raw,
                type_arguments,
            },
            None => TypeReference::Class(raw),
        })
    }

    fn maybe_type_arguments(&mut self) -> Result<Option<Vec<TypeReference>>, SignatureError> {
        if self.peek() != Some('<') {
            return Ok(None);
        }
        self.bump();
        let mut arguments = Vec::new();
        while self.peek() != Some('>') {
            arguments.push(self.type_argument()?);
        }
        self.bump();
        if arguments.is_empty() {
            return Err(self.malformed("at least one type argument"));
        }
        Ok(Some(arguments))
    }

    fn type_argument(&mut self) -> Result<TypeReference, SignatureError> {
        match self.peek() {
            Some('*') => {
                self.bump();
                Ok(TypeReference::Wildcard(WildcardBound::Unbounded))
            }
            Some('+') => {
                self.bump();
                let bound = self.field_type_signature()?;
                Ok(TypeReference::Wildcard(WildcardBound::Extends(Box::new(
                    bound,
                ))))
            }
            Some('-') => {
                self.bump();
                let bound = self.field_type_signature()?;
                Ok(TypeReference::Wildcard(WildcardBound::Super(Box::new(
                    bound,
                ))))
            }
            _ => self.field_type_signature(),
        }
    }

    fn type_variable_signature(&mut self) -> Result<TypeReference, SignatureError> {
        let start = self.offset;
        self.expect('T', "`T` starting a type variable")?;
        let name = self.identifier("a type variable name")?;
        self.expect(';', "`;` closing a type variable")?;
        self.context
            .find(&name)
            .or_else(|| self.resolver.and_then(|r| r.find_type_variable(&name)))
            .map(TypeReference::Variable)
            .ok_or(SignatureError::UnresolvedTypeVariable {
                name,
                offset: start,
            })
    }

    fn resolve_class(&self, internal_name: &str) -> Arc<ClassType> {
        match self.resolver.and_then(|r| r.find_type(internal_name)) {
            Some(TypeReference::Class(existing)) => existing,
            _ => ClassType::new(internal_name),
        }
    }

    fn identifier(&mut self, expected: &'static str) -> Result<String, SignatureError> {
        let name = self.name_chars(|c| !matches!(c, '.' | ';' | '[' | '/' | '<' | '>' | ':'));
        if name.is_empty() {
            return Err(self.malformed(expected));
        }
        Ok(name)
    }

    fn qualified_name(&mut self) -> Result<String, SignatureError> {
        let name = self.name_chars(|c| !matches!(c, '.' | ';' | '[' | '<' | '>' | ':'));
        if name.is_empty() {
            return Err(self.malformed("a class name"));
        }
        Ok(name)
    }

    fn name_chars(&mut self, keep: impl Fn(char) -> bool) -> String {
        let start = self.offset;
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            self.bump();
        }
        self.input[start..self.offset].to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_field(signature: &str) -> Result<TypeReference, SignatureError> {
        let mut context = GenericContext::new();
        parse_field_signature(signature, &mut context, None)
    }

    #[test]
    fn map_with_extends_wildcard() {
        let parsed = parse_field("Ljava/util/Map<Ljava/lang/String;+Ljava/lang/Number;>;")
            .expect("Failed to parse signature");
        let TypeReference::Parameterized {
            raw,
            type_arguments,
        } = parsed
        else {
            panic!("Expected a parameterized type");
        };
        assert_eq!(raw.internal_name(), "java/util/Map");
        assert_eq!(
            type_arguments,
            vec![
                TypeReference::Class(ClassType::new("java/lang/String")),
                TypeReference::Wildcard(WildcardBound::Extends(Box::new(TypeReference::Class(
                    ClassType::new("java/lang/Number")
                )))),
            ]
        );
    }

    #[test]
    fn unbounded_and_super_wildcards() {
        let parsed = parse_field("Ljava/util/Map<*-Ljava/lang/Integer;>;")
            .expect("Failed to parse signature");
        let TypeReference::Parameterized { type_arguments, .. } = parsed else {
            panic!("Expected a parameterized type");
        };
        assert_eq!(
            type_arguments,
            vec![
                TypeReference::Wildcard(WildcardBound::Unbounded),
                TypeReference::Wildcard(WildcardBound::Super(Box::new(TypeReference::Class(
                    ClassType::new("java/lang/Integer")
                )))),
            ]
        );
    }

    #[test]
    fn generic_array_element() {
        let parsed =
            parse_field("[Ljava/util/List<Ljava/lang/String;>;").expect("Failed to parse");
        let TypeReference::Array(element) = parsed else {
            panic!("Expected an array type");
        };
        assert!(matches!(*element, TypeReference::Parameterized { .. }));
    }

    #[test]
    fn inner_class_segments_join_with_dollar() {
        let parsed = parse_field("Ljava/util/Map<TK;TV;>.Entry<TK;TV;>;");
        // No scope declares K or V here.
        assert!(matches!(
            parsed,
            Err(SignatureError::UnresolvedTypeVariable { .. })
        ));

        let mut context = GenericContext::new();
        let k = GenericParameter::new("K", "java/util/Map");
        let v = GenericParameter::new("V", "java/util/Map");
        context.push_scope("java/util/Map", vec![k, v]);
        let parsed =
            parse_field_signature("Ljava/util/Map<TK;TV;>.Entry<TK;TV;>;", &mut context, None)
                .expect("Failed to parse");
        let TypeReference::Parameterized { raw, .. } = parsed else {
            panic!("Expected a parameterized type");
        };
        assert_eq!(raw.internal_name(), "java/util/Map$Entry");
    }

    #[test]
    fn class_signature_with_formal_parameters() {
        let mut context = GenericContext::new();
        let parsed = parse_class_signature(
            "<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Comparable<TT;>;",
            "org/pkg/Holder",
            &mut context,
            None,
        )
        .expect("Failed to parse class signature");
        assert_eq!(parsed.formal_parameters.len(), 1);
        let parameter = &parsed.formal_parameters[0];
        assert_eq!(parameter.name(), "T");
        assert_eq!(parameter.owner(), "org/pkg/Holder");
        assert_eq!(
            parsed.super_class,
            TypeReference::Class(ClassType::new("java/lang/Object"))
        );
        assert_eq!(parsed.interfaces.len(), 1);
        // The scope is left again once parsing is done.
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn f_bounded_parameter_sees_itself() {
        let mut context = GenericContext::new();
        let parsed = parse_class_signature(
            "<T::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;",
            "org/pkg/Sorted",
            &mut context,
            None,
        )
        .expect("Failed to parse class signature");
        let parameter = &parsed.formal_parameters[0];
        let bounds = parameter.bounds();
        assert_eq!(bounds.len(), 1);
        let TypeReference::Parameterized { type_arguments, .. } = &bounds[0] else {
            panic!("Expected a parameterized bound");
        };
        assert_eq!(
            type_arguments[0],
            TypeReference::Variable(parameter.clone())
        );
    }

    #[test]
    fn empty_class_bound_means_implicit_top_type() {
        let mut context = GenericContext::new();
        let parsed = parse_class_signature(
            "<T::Ljava/io/Serializable;>Ljava/lang/Object;",
            "org/pkg/Box",
            &mut context,
            None,
        )
        .expect("Failed to parse class signature");
        assert_eq!(parsed.formal_parameters[0].bounds().len(), 1);
    }

    #[test]
    fn method_signature_with_throws() {
        let mut context = GenericContext::new();
        let parsed = parse_method_signature(
            "<X:Ljava/lang/Exception;>(TX;I)V^TX;^Ljava/io/IOException;",
            "org/pkg/A::run",
            &mut context,
            None,
        )
        .expect("Failed to parse method signature");
        assert_eq!(parsed.formal_parameters.len(), 1);
        assert_eq!(parsed.parameter_types.len(), 2);
        assert_eq!(parsed.return_type, ReturnType::Void);
        assert_eq!(parsed.thrown_types.len(), 2);
        assert_eq!(
            parsed.thrown_types[1],
            TypeReference::Class(ClassType::new("java/io/IOException"))
        );
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn method_scope_sees_enclosing_class_scope() {
        let mut context = GenericContext::new();
        let t = GenericParameter::new("T", "org/pkg/Holder");
        context.push_scope("org/pkg/Holder", vec![t.clone()]);
        let parsed =
            parse_method_signature("()TT;", "org/pkg/Holder::get", &mut context, None)
                .expect("Failed to parse method signature");
        assert_eq!(parsed.return_type, ReturnType::Some(TypeReference::Variable(t)));
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn shadowing_resolves_innermost_first() {
        let mut context = GenericContext::new();
        let outer = GenericParameter::new("T", "org/pkg/Outer");
        context.push_scope("org/pkg/Outer", vec![outer]);
        let parsed = parse_method_signature(
            "<T:Ljava/lang/Number;>(TT;)V",
            "org/pkg/Outer::narrow",
            &mut context,
            None,
        )
        .expect("Failed to parse method signature");
        let TypeReference::Variable(parameter) = &parsed.parameter_types[0] else {
            panic!("Expected a type variable");
        };
        assert_eq!(parameter.owner(), "org/pkg/Outer::narrow");
    }

    #[test]
    fn malformed_signature_carries_offset() {
        let result = parse_field("Ljava/util/List<");
        let Err(SignatureError::Malformed { offset, .. }) = result else {
            panic!("Expected a malformed signature error");
        };
        assert_eq!(offset, 16);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(matches!(
            parse_field("Ljava/lang/String;X"),
            Err(SignatureError::Malformed { offset: 18, .. })
        ));
    }

    #[test]
    fn scope_is_left_on_parse_failure() {
        let mut context = GenericContext::new();
        let result = parse_class_signature(
            "<T:Ljava/lang/Object;>Lbroken",
            "org/pkg/Broken",
            &mut context,
            None,
        );
        assert!(result.is_err());
        assert_eq!(context.depth(), 0);
    }
}
