//! References to members of other classes, as surfaced by constant-pool
//! lookups.

use std::sync::Arc;

use crate::types::descriptor::MethodDescriptor;
use crate::types::type_reference::{ClassType, TypeReference};

/// A reference to a field of a class.
#[derive(Debug, PartialEq, Clone, derive_more::Display)]
#[display("{owner}.{name}")]
pub struct FieldRef {
    /// The class declaring the field.
    pub owner: Arc<ClassType>,
    /// The name of the field.
    pub name: String,
    /// The declared type of the field.
    pub field_type: TypeReference,
}

/// A reference to a method of a class or interface.
#[derive(Debug, PartialEq, Clone, derive_more::Display)]
#[display("{owner}::{name}")]
pub struct MethodRef {
    /// The class or interface declaring the method.
    pub owner: Arc<ClassType>,
    /// The name of the method.
    pub name: String,
    /// The descriptor of the method.
    pub descriptor: MethodDescriptor,
}

/// A method handle constant.
#[doc = crate::macros::see_jvm_spec!(4, 4, 8)]
#[derive(Debug, PartialEq, Clone)]
pub enum MethodHandle {
    /// `REF_getField`
    GetField(FieldRef),
    /// `REF_getStatic`
    GetStatic(FieldRef),
    /// `REF_putField`
    PutField(FieldRef),
    /// `REF_putStatic`
    PutStatic(FieldRef),
    /// `REF_invokeVirtual`
    InvokeVirtual(MethodRef),
    /// `REF_invokeStatic`
    InvokeStatic(MethodRef),
    /// `REF_invokeSpecial`
    InvokeSpecial(MethodRef),
    /// `REF_newInvokeSpecial`
    NewInvokeSpecial(MethodRef),
    /// `REF_invokeInterface`
    InvokeInterface(MethodRef),
}
