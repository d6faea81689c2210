use crate::error::LayoutError;
use crate::header::{Header, Object};
use crate::objects::{
    Alien, Array, Bignum, BoxedFloat, ByteArray, Callstack, Dll, Quotation, Tuple, VMString, Word,
    Wrapper,
};
use crate::types::TypeCode;
use crate::value::{Fixnum, Value};

/// A heap object viewed through the record matching its header.
///
/// Decode the tag once with [`ObjectView::of`] or [`decode`] and dispatch on
/// the variant, instead of reinterpreting the same memory ad hoc.
#[derive(Clone, Copy)]
pub enum ObjectView<'a> {
    Array(&'a Array),
    Float(&'a BoxedFloat),
    Quotation(&'a Quotation),
    Bignum(&'a Bignum),
    Alien(&'a Alien),
    Tuple(&'a Tuple),
    Wrapper(&'a Wrapper),
    ByteArray(&'a ByteArray),
    Callstack(&'a Callstack),
    String(&'a VMString),
    Word(&'a Word),
    Dll(&'a Dll),
}

impl<'a> ObjectView<'a> {
    /// Dispatch on the header of `obj`. The header must not be free or
    /// forwarded; an immediate type in a header is fatal.
    pub fn of(obj: &'a Object) -> Self {
        match obj.type_code() {
            TypeCode::Array => ObjectView::Array(obj.cast()),
            TypeCode::Float => ObjectView::Float(obj.cast()),
            TypeCode::Quotation => ObjectView::Quotation(obj.cast()),
            TypeCode::Bignum => ObjectView::Bignum(obj.cast()),
            TypeCode::Alien => ObjectView::Alien(obj.cast()),
            TypeCode::Tuple => ObjectView::Tuple(obj.cast()),
            TypeCode::Wrapper => ObjectView::Wrapper(obj.cast()),
            TypeCode::ByteArray => ObjectView::ByteArray(obj.cast()),
            TypeCode::Callstack => ObjectView::Callstack(obj.cast()),
            TypeCode::String => ObjectView::String(obj.cast()),
            TypeCode::Word => ObjectView::Word(obj.cast()),
            TypeCode::Dll => ObjectView::Dll(obj.cast()),
            ty @ (TypeCode::Fixnum | TypeCode::F) => {
                panic!("header at {:#x} claims immediate type {ty}", obj.address())
            }
        }
    }

    pub fn as_object(self) -> &'a Object {
        let header: &'a Header = match self {
            ObjectView::Array(o) => &o.header,
            ObjectView::Float(o) => &o.header,
            ObjectView::Quotation(o) => &o.header,
            ObjectView::Bignum(o) => &o.header,
            ObjectView::Alien(o) => &o.header,
            ObjectView::Tuple(o) => &o.header,
            ObjectView::Wrapper(o) => &o.header,
            ObjectView::ByteArray(o) => &o.header,
            ObjectView::Callstack(o) => &o.header,
            ObjectView::String(o) => &o.header,
            ObjectView::Word(o) => &o.header,
            ObjectView::Dll(o) => &o.header,
        };
        // SAFETY: every variant borrows a repr(C) record starting with its header
        unsafe { &*(header as *const Header as *const Object) }
    }

    pub fn type_code(self) -> TypeCode {
        match self {
            ObjectView::Array(_) => TypeCode::Array,
            ObjectView::Float(_) => TypeCode::Float,
            ObjectView::Quotation(_) => TypeCode::Quotation,
            ObjectView::Bignum(_) => TypeCode::Bignum,
            ObjectView::Alien(_) => TypeCode::Alien,
            ObjectView::Tuple(_) => TypeCode::Tuple,
            ObjectView::Wrapper(_) => TypeCode::Wrapper,
            ObjectView::ByteArray(_) => TypeCode::ByteArray,
            ObjectView::Callstack(_) => TypeCode::Callstack,
            ObjectView::String(_) => TypeCode::String,
            ObjectView::Word(_) => TypeCode::Word,
            ObjectView::Dll(_) => TypeCode::Dll,
        }
    }
}

impl core::fmt::Debug for ObjectView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{:#x}", self.type_code(), self.as_object().address())
    }
}

/// A tagged value with its kind resolved.
#[derive(Debug, Clone, Copy)]
pub enum Decoded<'a> {
    Fixnum(Fixnum),
    False,
    Object(ObjectView<'a>),
}

/// Resolve `value` to an immediate or a typed view, checking the reference
/// against the header it points at.
///
/// Any word with the `f` tag decodes as [`Decoded::False`].
///
/// # Safety
///
/// A reference-tagged `value` must point at readable memory of at least one
/// cell, and at a whole object of its kind when the checks pass. The returned
/// view must not outlive that object.
pub unsafe fn decode<'a>(value: Value) -> Result<Decoded<'a>, LayoutError> {
    let ty = value.type_code().ok_or(LayoutError::UnknownType(value.tag()))?;
    match ty {
        TypeCode::Fixnum => return Ok(Decoded::Fixnum(value.to_fixnum())),
        TypeCode::F => return Ok(Decoded::False),
        _ => (),
    }

    // Untagging clears the low TAG_BITS, so the address is always on the
    // data alignment.
    let address = value.untag();
    // SAFETY: by contract the address is readable
    let obj: &'a Object = unsafe { value.as_ref() };
    let header = obj.header;
    let rejected = if header.is_forwarding_pointer() {
        Some(LayoutError::Forwarded {
            address,
            target: header.forwarding_pointer() as usize,
        })
    } else if header.is_free() {
        Some(LayoutError::FreeBlock { address })
    } else {
        match TypeCode::try_from(header.raw_type()) {
            Ok(found) if found == ty => None,
            Ok(found) => Some(LayoutError::TagMismatch { tagged: ty, found }),
            Err(err) => Some(err),
        }
    };

    if let Some(err) = rejected {
        log::debug!("rejected {value:?}: {err}");
        return Err(err);
    }
    Ok(Decoded::Object(ObjectView::of(obj)))
}
