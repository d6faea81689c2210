//! What the collector needs to walk an object: its size, where its traced
//! slots end, and a way to visit them.
//!
//! Slots are the cells in `[CELL_SIZE, binary_payload_start)`. Everything
//! from `binary_payload_start` on is raw data (digits, bytes, frames, code
//! addresses, native handles) and is never treated as a reference.

use crate::align::{DATA_ALIGNMENT, align};
use crate::header::Object;
use crate::objects::{
    ALIEN_TRACED_END, Alien, Array, BYTE_ARRAY_TRACED_END, Bignum, BoxedFloat, ByteArray,
    Callstack, DLL_TRACED_END, Dll, QUOTATION_TRACED_END, Quotation, Tuple, TupleLayout, VMString,
    WORD_TRACED_END, Word, Wrapper, array_size, bignum_size, byte_array_size,
    callstack_object_size, string_size, tuple_object_size,
};
use crate::types::TypeCode;
use crate::value::{CELL_SIZE, Cell, Value};

/// Maps an address read out of an object to where that object lives now.
///
/// During a copying collection a tuple may be sized after its layout has
/// already moved; the fixup lets the size computation follow it.
pub trait Fixup {
    fn translate_data(&self, obj: *const Object) -> *const Object;
}

/// Objects are where their references say.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFixup;

impl Fixup for NoFixup {
    #[inline(always)]
    fn translate_data(&self, obj: *const Object) -> *const Object {
        obj
    }
}

/// Follows forwarding headers left behind by the collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardingFixup;

impl Fixup for ForwardingFixup {
    #[inline(always)]
    fn translate_data(&self, obj: *const Object) -> *const Object {
        // SAFETY: callers only hand in addresses of heap objects
        let header = unsafe { (*obj).header };
        if header.is_forwarding_pointer() {
            header.forwarding_pointer() as *const Object
        } else {
            obj
        }
    }
}

impl Object {
    /// Allocation size in bytes, rounded up to the data alignment.
    ///
    /// # Safety
    ///
    /// The object must be a live, initialized, unforwarded heap object; a
    /// tuple's layout must be reachable.
    pub unsafe fn size(&self) -> Cell {
        // SAFETY: by contract
        unsafe { self.size_with(&NoFixup) }
    }

    /// # Safety
    ///
    /// As for [`size`](Self::size), with the tuple's layout reachable through
    /// `fixup`.
    pub unsafe fn size_with<F: Fixup>(&self, fixup: &F) -> Cell {
        let raw = match self.type_code() {
            TypeCode::Array => array_size(self.cast::<Array>().capacity()),
            TypeCode::Bignum => bignum_size(self.cast::<Bignum>().capacity()),
            TypeCode::ByteArray => byte_array_size(self.cast::<ByteArray>().capacity()),
            TypeCode::String => string_size(self.cast::<VMString>().len()),
            // SAFETY: by contract
            TypeCode::Tuple => unsafe { tuple_object_size(tuple_size_with(self, fixup)) },
            TypeCode::Callstack => callstack_object_size(self.cast::<Callstack>().len()),
            TypeCode::Quotation => size_of::<Quotation>(),
            TypeCode::Word => size_of::<Word>(),
            TypeCode::Float => size_of::<BoxedFloat>(),
            TypeCode::Wrapper => size_of::<Wrapper>(),
            TypeCode::Alien => size_of::<Alien>(),
            TypeCode::Dll => size_of::<Dll>(),
            ty @ (TypeCode::Fixnum | TypeCode::F) => {
                panic!("header at {:#x} claims immediate type {ty}", self.address())
            }
        };
        align(raw, DATA_ALIGNMENT)
    }

    /// Byte offset where the raw, untraced part of the object begins.
    ///
    /// # Safety
    ///
    /// As for [`size`](Self::size).
    pub unsafe fn binary_payload_start(&self) -> Cell {
        // SAFETY: by contract
        unsafe { self.binary_payload_start_with(&NoFixup) }
    }

    /// # Safety
    ///
    /// As for [`size_with`](Self::size_with).
    pub unsafe fn binary_payload_start_with<F: Fixup>(&self, fixup: &F) -> Cell {
        match self.type_code() {
            TypeCode::Array => array_size(self.cast::<Array>().capacity()),
            // SAFETY: by contract
            TypeCode::Tuple => unsafe { tuple_object_size(tuple_size_with(self, fixup)) },
            TypeCode::Bignum => size_of::<Bignum>(),
            TypeCode::ByteArray => BYTE_ARRAY_TRACED_END,
            TypeCode::String => size_of::<VMString>(),
            TypeCode::Callstack => size_of::<Callstack>(),
            TypeCode::Wrapper => size_of::<Wrapper>(),
            TypeCode::Word => WORD_TRACED_END,
            TypeCode::Quotation => QUOTATION_TRACED_END,
            TypeCode::Alien => ALIEN_TRACED_END,
            TypeCode::Dll => DLL_TRACED_END,
            TypeCode::Float => CELL_SIZE,
            ty @ (TypeCode::Fixnum | TypeCode::F) => {
                panic!("header at {:#x} claims immediate type {ty}", self.address())
            }
        }
    }

    /// Call `visit` on every tagged slot after the header.
    ///
    /// # Safety
    ///
    /// As for [`size`](Self::size).
    pub unsafe fn each_slot(&mut self, visit: impl FnMut(&mut Value)) {
        // SAFETY: by contract
        unsafe { self.each_slot_with(&NoFixup, visit) }
    }

    /// # Safety
    ///
    /// As for [`size_with`](Self::size_with).
    pub unsafe fn each_slot_with<F: Fixup>(&mut self, fixup: &F, mut visit: impl FnMut(&mut Value)) {
        // SAFETY: by contract
        let end = unsafe { self.binary_payload_start_with(fixup) };
        let base = self as *mut Self as *mut u8;
        let mut offset = CELL_SIZE;
        while offset < end {
            // SAFETY: offset stays inside the traced prefix of this object
            visit(unsafe { &mut *(base.add(offset) as *mut Value) });
            offset += CELL_SIZE;
        }
    }
}

/// # Safety
///
/// `tuple` is a tuple whose layout reference, translated by `fixup`, points
/// at a readable layout.
unsafe fn tuple_size_with<F: Fixup>(tuple: &Object, fixup: &F) -> Cell {
    let layout = tuple.cast::<Tuple>().layout;
    let layout = fixup.translate_data(layout.as_ptr::<Object>()) as *const TupleLayout;
    // SAFETY: by contract
    unsafe { (*layout).tuple_size() }
}
