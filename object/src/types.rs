use serde::{Serialize, Serializer};

use crate::error::LayoutError;
use crate::value::Cell;

/// Type tag shared by tagged values and object headers.
///
/// The numbering is part of the binary interface: compiled code and saved
/// images hard-code it. Fixnum and `f` must stay at 0 and 1, see
/// [`Value::is_immediate`](crate::Value::is_immediate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeCode {
    Fixnum = 0,
    F = 1,
    Array = 2,
    Float = 3,
    Quotation = 4,
    Bignum = 5,
    Alien = 6,
    Tuple = 7,
    Wrapper = 8,
    ByteArray = 9,
    Callstack = 10,
    String = 11,
    Word = 12,
    Dll = 13,
}

pub const TYPE_COUNT: usize = 14;

impl TypeCode {
    pub const ALL: [TypeCode; TYPE_COUNT] = [
        TypeCode::Fixnum,
        TypeCode::F,
        TypeCode::Array,
        TypeCode::Float,
        TypeCode::Quotation,
        TypeCode::Bignum,
        TypeCode::Alien,
        TypeCode::Tuple,
        TypeCode::Wrapper,
        TypeCode::ByteArray,
        TypeCode::Callstack,
        TypeCode::String,
        TypeCode::Word,
        TypeCode::Dll,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            TypeCode::Fixnum => "fixnum",
            TypeCode::F => "f",
            TypeCode::Array => "array",
            TypeCode::Float => "float",
            TypeCode::Quotation => "quotation",
            TypeCode::Bignum => "bignum",
            TypeCode::Alien => "alien",
            TypeCode::Tuple => "tuple",
            TypeCode::Wrapper => "wrapper",
            TypeCode::ByteArray => "byte-array",
            TypeCode::Callstack => "callstack",
            TypeCode::String => "string",
            TypeCode::Word => "word",
            TypeCode::Dll => "dll",
        }
    }

    /// Fixnums and `f` live in the tagged word itself and have no heap layout.
    #[inline(always)]
    pub const fn is_immediate(self) -> bool {
        matches!(self, TypeCode::Fixnum | TypeCode::F)
    }

    /// Decode a type code read from a header or a tag.
    ///
    /// Panics on codes outside the catalog: reaching that means the heap is
    /// corrupt or the runtime and compiler disagree on the numbering.
    #[inline(always)]
    pub fn from_cell(code: Cell) -> TypeCode {
        match TypeCode::try_from(code) {
            Ok(ty) => ty,
            Err(_) => panic!("invalid type code {code}"),
        }
    }

    pub fn from_name(name: &str) -> Option<TypeCode> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }
}

impl TryFrom<Cell> for TypeCode {
    type Error = LayoutError;

    fn try_from(code: Cell) -> Result<Self, Self::Error> {
        Self::ALL
            .get(code)
            .copied()
            .ok_or(LayoutError::UnknownType(code))
    }
}

impl core::fmt::Display for TypeCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TypeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Display name of a raw type code. Fatal on codes outside the catalog.
pub fn type_name(code: Cell) -> &'static str {
    TypeCode::from_cell(code).name()
}

/// Kinds of compiled code blocks living in the code heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodeBlockType {
    Unoptimized = 0,
    Optimized = 1,
    Pic = 2,
}

bitflags::bitflags! {
    /// Floating-point exceptions a trap handler reports back to the language.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FpTraps: u32 {
        const INVALID_OPERATION = 1 << 0;
        const OVERFLOW = 1 << 1;
        const UNDERFLOW = 1 << 2;
        const ZERO_DIVIDE = 1 << 3;
        const INEXACT = 1 << 4;
    }
}
