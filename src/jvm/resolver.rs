//! Scoped type and type-variable lookups used while class files are being
//! decoded.
//!
//! Lookups are answered by a stack of [`ResolverFrame`]s scanned top-down,
//! falling through to an optional outer [`TypeResolver`]. Frames stay
//! mutable while on the stack: a reader inserts the definition it is
//! currently building into its own frame, so descriptors and signatures
//! inside the same class file that name the enclosing type resolve to that
//! in-progress definition instead of triggering another load.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use log::trace;

use crate::types::type_reference::{GenericParameter, TypeReference};
use crate::utils::{read_lock, write_lock};

/// An outer source of type information for names no frame answers,
/// typically backed by a class path or a cache of previously decoded
/// classes.
pub trait TypeResolver: Send + Sync {
    /// Resolves an internal name to a type reference.
    fn resolve_type(&self, internal_name: &str) -> Option<TypeReference>;

    /// Resolves a type-variable name from an enclosing context outside the
    /// current class file.
    fn resolve_type_variable(&self, _name: &str) -> Option<Arc<GenericParameter>> {
        None
    }
}

/// A scoped mapping from internal names to type references and from
/// type-variable names to generic parameters.
#[derive(Debug, Default)]
pub struct ResolverFrame {
    types: RwLock<HashMap<String, TypeReference>>,
    type_variables: RwLock<HashMap<String, Arc<GenericParameter>>>,
}

impl ResolverFrame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `internal_name` resolve to `type_reference` while this frame
    /// is consulted.
    pub fn add_type<S: Into<String>>(&self, internal_name: S, type_reference: TypeReference) {
        write_lock(&self.types).insert(internal_name.into(), type_reference);
    }

    /// Removes a name from the frame, returning what it resolved to.
    pub fn remove_type(&self, internal_name: &str) -> Option<TypeReference> {
        write_lock(&self.types).remove(internal_name)
    }

    /// Adds a type-variable binding under the parameter's own name.
    pub fn add_type_variable(&self, parameter: Arc<GenericParameter>) {
        write_lock(&self.type_variables).insert(parameter.name().to_owned(), parameter);
    }

    /// Removes a type-variable binding.
    pub fn remove_type_variable(&self, name: &str) -> Option<Arc<GenericParameter>> {
        write_lock(&self.type_variables).remove(name)
    }

    /// Looks up an internal name in this frame alone.
    #[must_use]
    pub fn find_type(&self, internal_name: &str) -> Option<TypeReference> {
        read_lock(&self.types).get(internal_name).cloned()
    }

    /// Looks up a type-variable name in this frame alone.
    #[must_use]
    pub fn find_type_variable(&self, name: &str) -> Option<Arc<GenericParameter>> {
        read_lock(&self.type_variables).get(name).cloned()
    }

    /// Registers a type and returns a guard that removes it again when
    /// dropped, so the binding cannot outlive the scope it belongs to.
    pub fn register_type<S: Into<String>>(
        &self,
        internal_name: S,
        type_reference: TypeReference,
    ) -> TypeRegistration<'_> {
        let internal_name = internal_name.into();
        self.add_type(internal_name.clone(), type_reference);
        TypeRegistration {
            frame: self,
            internal_name,
        }
    }
}

/// Removes a type binding from its frame on drop.
#[must_use = "the binding is removed as soon as the registration is dropped"]
#[derive(Debug)]
pub struct TypeRegistration<'a> {
    frame: &'a ResolverFrame,
    internal_name: String,
}

impl Drop for TypeRegistration<'_> {
    fn drop(&mut self) {
        self.frame.remove_type(&self.internal_name);
    }
}

/// A stack of resolver frames over an optional outer resolver.
///
/// The stack is safe to share between readers running on different
/// threads: lookups take a shared view, frame pushes and pops an exclusive
/// one.
#[derive(Default)]
pub struct MetadataResolver {
    frames: RwLock<Vec<Arc<ResolverFrame>>>,
    delegate: Option<Box<dyn TypeResolver>>,
}

impl MetadataResolver {
    /// Creates a resolver with no outer delegate.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a resolver that falls back to `delegate` for names no frame
    /// answers.
    #[must_use]
    pub fn with_delegate(delegate: Box<dyn TypeResolver>) -> Arc<Self> {
        Arc::new(Self {
            frames: RwLock::new(Vec::new()),
            delegate: Some(delegate),
        })
    }

    /// Pushes a frame and returns a guard that pops it again when dropped.
    /// Guards must be dropped in reverse push order.
    pub fn push_frame(&self, frame: Arc<ResolverFrame>) -> FrameGuard<'_> {
        let mut frames = write_lock(&self.frames);
        frames.push(frame.clone());
        trace!("Pushed resolver frame (depth {})", frames.len());
        FrameGuard {
            resolver: self,
            frame,
        }
    }

    /// The number of frames currently on the stack.
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        read_lock(&self.frames).len()
    }

    /// Resolves an internal name against the frames, top-down, then the
    /// delegate.
    #[must_use]
    pub fn find_type(&self, internal_name: &str) -> Option<TypeReference> {
        let frames = read_lock(&self.frames);
        frames
            .iter()
            .rev()
            .find_map(|frame| frame.find_type(internal_name))
            .or_else(|| {
                self.delegate
                    .as_ref()
                    .and_then(|delegate| delegate.resolve_type(internal_name))
            })
    }

    /// Resolves a type-variable name against the frames, top-down, then
    /// the delegate.
    #[must_use]
    pub fn find_type_variable(&self, name: &str) -> Option<Arc<GenericParameter>> {
        let frames = read_lock(&self.frames);
        frames
            .iter()
            .rev()
            .find_map(|frame| frame.find_type_variable(name))
            .or_else(|| {
                self.delegate
                    .as_ref()
                    .and_then(|delegate| delegate.resolve_type_variable(name))
            })
    }

    fn pop_frame(&self, expected: &Arc<ResolverFrame>) {
        let mut frames = write_lock(&self.frames);
        let popped = frames.pop();
        trace!("Popped resolver frame (depth {})", frames.len());
        debug_assert!(
            popped.is_some_and(|it| Arc::ptr_eq(&it, expected)),
            "resolver frames must be released in reverse push order"
        );
    }
}

impl fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("frames", &self.frames)
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}

/// Pops its frame from the resolver on drop, so the push/pop discipline
/// holds on every exit path.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FrameGuard<'a> {
    resolver: &'a MetadataResolver,
    frame: Arc<ResolverFrame>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.resolver.pop_frame(&self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::type_reference::ClassType;

    fn class_reference(internal_name: &str) -> TypeReference {
        TypeReference::Class(ClassType::new(internal_name))
    }

    #[test]
    fn frames_pop_on_drop() {
        let resolver = MetadataResolver::new();
        {
            let _outer = resolver.push_frame(ResolverFrame::new());
            {
                let _inner = resolver.push_frame(ResolverFrame::new());
                assert_eq!(resolver.frame_depth(), 2);
            }
            assert_eq!(resolver.frame_depth(), 1);
        }
        assert_eq!(resolver.frame_depth(), 0);
    }

    #[test]
    fn top_frame_shadows_lower_frames() {
        let resolver = MetadataResolver::new();
        let below = ResolverFrame::new();
        below.add_type("org/pkg/A", class_reference("org/pkg/A"));
        let above = ResolverFrame::new();
        let shadow = class_reference("org/pkg/A");
        above.add_type("org/pkg/A", shadow.clone());

        let _below = resolver.push_frame(below);
        let _above = resolver.push_frame(above);
        let found = resolver.find_type("org/pkg/A").expect("Lookup failed");
        let (TypeReference::Class(found), TypeReference::Class(shadow)) = (found, shadow) else {
            panic!("Expected class references");
        };
        assert!(Arc::ptr_eq(&found, &shadow));
    }

    #[test]
    fn registration_removes_binding_on_drop() {
        let frame = ResolverFrame::new();
        {
            let _registration = frame.register_type("org/pkg/A", class_reference("org/pkg/A"));
            assert!(frame.find_type("org/pkg/A").is_some());
        }
        assert!(frame.find_type("org/pkg/A").is_none());
    }

    #[test]
    fn delegate_answers_on_frame_miss() {
        struct Fixed;
        impl TypeResolver for Fixed {
            fn resolve_type(&self, internal_name: &str) -> Option<TypeReference> {
                (internal_name == "org/pkg/Known").then(|| class_reference("org/pkg/Known"))
            }
        }

        let resolver = MetadataResolver::with_delegate(Box::new(Fixed));
        let _frame = resolver.push_frame(ResolverFrame::new());
        assert!(resolver.find_type("org/pkg/Known").is_some());
        assert!(resolver.find_type("org/pkg/Unknown").is_none());
    }

    #[test]
    fn type_variables_resolve_through_frames() {
        let resolver = MetadataResolver::new();
        let frame = ResolverFrame::new();
        let parameter = GenericParameter::new("T", "org/pkg/A");
        frame.add_type_variable(parameter.clone());
        let _guard = resolver.push_frame(frame);
        let found = resolver.find_type_variable("T").expect("Lookup failed");
        assert!(Arc::ptr_eq(&found, &parameter));
        assert!(resolver.find_type_variable("U").is_none());
    }
}
