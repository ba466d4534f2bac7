//! Named, length-prefixed blobs attached to classes, fields, and methods,
//! decoded to typed variants where the layout is known.
#![doc = see_jvm_spec!(4, 7)]

use itertools::Itertools;

use crate::jvm::field::ConstantValue;
use crate::macros::see_jvm_spec;

use super::buffer::Buffer;
use super::constant_pool::ConstantPool;
use super::errors::{Error, Result};

/// One entry of a `LineNumberTable` attribute.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LineNumberEntry {
    /// The code offset the entry refers to.
    pub start_pc: u16,
    /// The source line that offset belongs to.
    pub line_number: u16,
}

/// An attribute of a class, field, or method.
///
/// Attributes with an unrecognized name are preserved losslessly as
/// [`Attribute::Blob`]. This includes `Code`, whose body this decoder
/// deliberately leaves opaque.
#[derive(Debug, PartialEq, Clone)]
pub enum Attribute {
    /// The name of the source file the class was compiled from.
    SourceFile(String),
    /// The compile-time constant value of a field.
    ConstantValue(ConstantValue),
    /// The mapping from code offsets to source lines.
    LineNumberTable(Vec<LineNumberEntry>),
    /// A generic signature string.
    Signature(String),
    /// The internal names of the checked exceptions a method declares.
    Exceptions(Vec<String>),
    /// An attribute preserved as raw bytes.
    Blob {
        /// The attribute name.
        name: String,
        /// The body, exactly `attribute_length` bytes.
        data: Vec<u8>,
    },
}

impl Attribute {
    /// The name of the attribute as stored in the class file.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SourceFile(_) => "SourceFile",
            Self::ConstantValue(_) => "ConstantValue",
            Self::LineNumberTable(_) => "LineNumberTable",
            Self::Signature(_) => "Signature",
            Self::Exceptions(_) => "Exceptions",
            Self::Blob { name, .. } => name,
        }
    }

    pub(crate) fn decode_list(buffer: &mut Buffer, pool: &ConstantPool) -> Result<Vec<Self>> {
        let count: u16 = buffer.read_value()?;
        (0..count).map(|_| Self::decode(buffer, pool)).try_collect()
    }

    pub(crate) fn decode(buffer: &mut Buffer, pool: &ConstantPool) -> Result<Self> {
        let name_index: u16 = buffer.read_value()?;
        let length: u32 = buffer.read_value()?;
        let length = usize::try_from(length).map_err(|_| Error::MalformedInput {
            offset: buffer.position(),
        })?;
        let data = buffer.read_bytes(length)?;
        let name = pool.utf8(name_index)?;
        Self::from_parts(name, data, pool)
    }

    // The declared length is authoritative: typed bodies must consume it
    // exactly, blobs keep it verbatim.
    fn from_parts(name: &str, data: Vec<u8>, pool: &ConstantPool) -> Result<Self> {
        match name {
            "SourceFile" => typed_body("SourceFile", data, |body| {
                let index = body.read_value()?;
                pool.utf8(index).map(|it| Self::SourceFile(it.to_owned()))
            }),
            "ConstantValue" => typed_body("ConstantValue", data, |body| {
                let index = body.read_value()?;
                pool.constant_value(index).map(Self::ConstantValue)
            }),
            "LineNumberTable" => typed_body("LineNumberTable", data, |body| {
                let count: u16 = body.read_value()?;
                let entries = (0..count)
                    .map(|_| -> Result<LineNumberEntry> {
                        Ok(LineNumberEntry {
                            start_pc: body.read_value()?,
                            line_number: body.read_value()?,
                        })
                    })
                    .try_collect()?;
                Ok(Self::LineNumberTable(entries))
            }),
            "Signature" => typed_body("Signature", data, |body| {
                let index = body.read_value()?;
                pool.utf8(index).map(|it| Self::Signature(it.to_owned()))
            }),
            "Exceptions" => typed_body("Exceptions", data, |body| {
                let count: u16 = body.read_value()?;
                let names = (0..count)
                    .map(|_| {
                        let index = body.read_value()?;
                        pool.class_name(index).map(str::to_owned)
                    })
                    .try_collect()?;
                Ok(Self::Exceptions(names))
            }),
            _ => Ok(Self::Blob {
                name: name.to_owned(),
                data,
            }),
        }
    }
}

fn typed_body<T>(
    name: &'static str,
    data: Vec<u8>,
    decode: impl FnOnce(&mut Buffer) -> Result<T>,
) -> Result<T> {
    let mut body = Buffer::new(data);
    let value = decode(&mut body).map_err(|err| match err {
        Error::MalformedInput { .. } => Error::MalformedAttribute {
            name,
            message: "body is shorter than its layout requires",
        },
        Error::InvalidConstantPoolIndex(_)
        | Error::UnexpectedConstantPoolTag { .. }
        | Error::BrokenUtf8 => Error::MalformedAttribute {
            name,
            message: "body references an unusable constant pool entry",
        },
        other => other,
    })?;
    if body.remaining() != 0 {
        return Err(Error::MalformedAttribute {
            name,
            message: "trailing bytes after the declared layout",
        });
    }
    Ok(value)
}
