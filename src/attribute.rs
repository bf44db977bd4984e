//! Named, typed metadata attached to arrays.
//!
//! Every array carries an ordered list of attributes: device metadata such
//! as exposure time, temperature or color mode, stamped by the driver and
//! copied alongside the array through convert/copy. An attribute holds a
//! scalar of one of the 8 numeric kinds, an owned string, or no value yet.
//!
//! Reads are strictly typed: [`Attribute::get`] fails with
//! [`Error::TypeMismatch`] rather than converting, because attributes carry
//! device metadata where silent narrowing would be a correctness hazard.
//! Clients that need conversion do it explicitly.
//!
//! Names are compared case-insensitively (ASCII); insertion order is
//! preserved for iteration.

use std::fmt;

use crate::error::{Error, Result};
use crate::format::DataType;

// ============================================================================
// AttrKind / AttrValue
// ============================================================================

/// The type of an attribute's stored value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// No value set yet.
    #[default]
    Undefined,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Owned string.
    String,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrKind::Undefined => "Undefined",
            AttrKind::Int8 => "Int8",
            AttrKind::UInt8 => "UInt8",
            AttrKind::Int16 => "Int16",
            AttrKind::UInt16 => "UInt16",
            AttrKind::Int32 => "Int32",
            AttrKind::UInt32 => "UInt32",
            AttrKind::Float32 => "Float32",
            AttrKind::Float64 => "Float64",
            AttrKind::String => "String",
        };
        f.write_str(name)
    }
}

impl From<DataType> for AttrKind {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Int8 => AttrKind::Int8,
            DataType::UInt8 => AttrKind::UInt8,
            DataType::Int16 => AttrKind::Int16,
            DataType::UInt16 => AttrKind::UInt16,
            DataType::Int32 => AttrKind::Int32,
            DataType::UInt32 => AttrKind::UInt32,
            DataType::Float32 => AttrKind::Float32,
            DataType::Float64 => AttrKind::Float64,
        }
    }
}

/// An attribute's stored value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AttrValue {
    /// No value set yet.
    #[default]
    Undefined,
    /// Signed 8-bit integer.
    Int8(i8),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Owned string.
    String(String),
}

impl AttrValue {
    /// The kind of this value.
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Undefined => AttrKind::Undefined,
            AttrValue::Int8(_) => AttrKind::Int8,
            AttrValue::UInt8(_) => AttrKind::UInt8,
            AttrValue::Int16(_) => AttrKind::Int16,
            AttrValue::UInt16(_) => AttrKind::UInt16,
            AttrValue::Int32(_) => AttrKind::Int32,
            AttrValue::UInt32(_) => AttrKind::UInt32,
            AttrValue::Float32(_) => AttrKind::Float32,
            AttrValue::Float64(_) => AttrKind::Float64,
            AttrValue::String(_) => AttrKind::String,
        }
    }

    /// Storage size of this value in bytes: the scalar width, the string
    /// byte length, or 0 when undefined.
    pub fn size(&self) -> usize {
        match self {
            AttrValue::Undefined => 0,
            AttrValue::Int8(_) | AttrValue::UInt8(_) => 1,
            AttrValue::Int16(_) | AttrValue::UInt16(_) => 2,
            AttrValue::Int32(_) | AttrValue::UInt32(_) | AttrValue::Float32(_) => 4,
            AttrValue::Float64(_) => 8,
            AttrValue::String(s) => s.len(),
        }
    }
}

macro_rules! impl_attr_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for AttrValue {
            fn from(value: $ty) -> Self {
                AttrValue::$variant(value)
            }
        }
    )*};
}

impl_attr_value_from!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
    String => String,
);

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

// ============================================================================
// AttrScalar
// ============================================================================

mod sealed {
    pub trait Sealed {}
}

/// A Rust primitive that can be read out of an attribute with
/// [`Attribute::get`].
///
/// Implemented for the 8 numeric kinds; the trait is sealed. There is no
/// cross-kind conversion: reading an `Int32` attribute as `i16` fails.
pub trait AttrScalar: sealed::Sealed + Sized + Copy {
    /// The attribute kind this primitive corresponds to.
    const KIND: AttrKind;

    /// Extract the primitive if the value is of exactly this kind.
    fn extract(value: &AttrValue) -> Option<Self>;
}

macro_rules! impl_attr_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}
        impl AttrScalar for $ty {
            const KIND: AttrKind = AttrKind::$variant;

            fn extract(value: &AttrValue) -> Option<Self> {
                match value {
                    AttrValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    )*};
}

impl_attr_scalar!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
);

// ============================================================================
// Attribute
// ============================================================================

/// A named, typed, optionally described metadata value.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    name: String,
    description: Option<String>,
    value: AttrValue,
}

impl Attribute {
    /// Create an attribute with no description and no value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "attribute name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            description: None,
            value: AttrValue::Undefined,
        })
    }

    /// The attribute's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute's description, if one was set.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Set or clear the description.
    pub fn set_description(&mut self, description: Option<&str>) {
        if self.description.as_deref() == description {
            return;
        }
        self.description = description.map(str::to_string);
    }

    /// The kind of the stored value.
    pub fn kind(&self) -> AttrKind {
        self.value.kind()
    }

    /// The stored value.
    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    /// Replace the stored value.
    pub fn set_value(&mut self, value: AttrValue) {
        if self.value == value {
            return;
        }
        self.value = value;
    }

    /// Read the value as a numeric primitive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the stored kind differs from
    /// `T`'s kind. There is no implicit conversion.
    pub fn get<T: AttrScalar>(&self) -> Result<T> {
        T::extract(&self.value).ok_or(Error::TypeMismatch {
            requested: T::KIND,
            stored: self.value.kind(),
        })
    }

    /// Read the value as a string slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the stored value is not a string.
    pub fn as_str(&self) -> Result<&str> {
        match &self.value {
            AttrValue::String(s) => Ok(s),
            other => Err(Error::TypeMismatch {
                requested: AttrKind::String,
                stored: other.kind(),
            }),
        }
    }
}

// ============================================================================
// AttributeList
// ============================================================================

/// An ordered map of attributes with case-insensitive names.
///
/// At most one attribute exists per case-insensitive name. All `add*`
/// operations are idempotent upserts: an existing attribute keeps its
/// position and the fields provided by the call overwrite it in place,
/// while fields not provided are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeList {
    items: Vec<Attribute>,
}

impl AttributeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes in the list.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Ensure an attribute with this name exists and return it.
    ///
    /// A new attribute is appended with no description and no value; an
    /// existing one is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name.
    pub fn add(&mut self, name: &str) -> Result<&mut Attribute> {
        if let Some(i) = self.position(name) {
            return Ok(&mut self.items[i]);
        }
        self.items.push(Attribute::new(name)?);
        Ok(self.items.last_mut().expect("just pushed"))
    }

    /// Upsert an attribute with a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name.
    pub fn add_value(&mut self, name: &str, value: impl Into<AttrValue>) -> Result<&mut Attribute> {
        let attr = self.add(name)?;
        attr.set_value(value.into());
        Ok(attr)
    }

    /// Upsert an attribute with a description and a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name.
    pub fn add_described(
        &mut self,
        name: &str,
        description: &str,
        value: impl Into<AttrValue>,
    ) -> Result<&mut Attribute> {
        let attr = self.add(name)?;
        attr.set_description(Some(description));
        attr.set_value(value.into());
        Ok(attr)
    }

    /// Upsert a copy of an existing attribute (name, description and value).
    pub fn add_copy(&mut self, other: &Attribute) -> &mut Attribute {
        let attr = self
            .add(other.name())
            .expect("attribute names are validated at construction");
        attr.set_description(other.description());
        attr.set_value(other.value().clone());
        attr
    }

    /// Find an attribute by case-insensitive name.
    pub fn find(&self, name: &str) -> Option<&Attribute> {
        self.position(name).map(|i| &self.items[i])
    }

    /// Find an attribute by case-insensitive name, mutably.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.position(name).map(|i| &mut self.items[i])
    }

    /// Remove an attribute by case-insensitive name.
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.position(name).map(|i| self.items.remove(i))
    }

    /// Remove all attributes.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate the attributes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }

    /// Upsert every attribute of this list into `dest`, preserving order
    /// for attributes new to `dest`. Existing attributes in `dest` are
    /// updated in place, not cleared first.
    pub fn copy_to(&self, dest: &mut AttributeList) {
        for attr in &self.items {
            dest.add_copy(attr);
        }
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
