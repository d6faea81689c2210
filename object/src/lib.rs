//! In-memory representation of VM values.
//!
//! Every value is one tagged [`Value`] word: a fixnum, `f`, or a reference to
//! a heap object. Heap objects start with a [`Header`] and are read through
//! the `#[repr(C)]` record of their kind. The collector, the interpreter, the
//! compiler and the image loader all share these layouts.

mod align;
mod error;
mod header;
mod layout;
mod objects;
mod types;
mod value;
mod view;
mod visitor;

pub use align::{DATA_ALIGNMENT, align, alignment_for, is_aligned};
pub use error::LayoutError;
pub use header::{Header, Object};
pub use layout::{
    ElementSize, FieldKind, FieldLayout, FieldSpec, LayoutSettings, PayloadKind, PayloadLayout,
    PayloadSpec, SCHEMAS, TypeLayout, TypeSchema, layout_table,
};
pub use objects::{
    Alien, Array, BYTE_ARRAY_PADDING, Bignum, BoxedFloat, ByteArray, Callstack, Dll,
    FLOAT_PADDING, HeapObject, Quotation, TUPLE_LAYOUT_RESERVED, Tuple, TupleLayout, VMString,
    Word, Wrapper, array_size, bignum_size, byte_array_size, callstack_object_size, string_size,
    tuple_object_size,
};
pub use types::{CodeBlockType, FpTraps, TYPE_COUNT, TypeCode, type_name};
pub use value::{
    CELL_SIZE, Cell, FIXNUM_MAX, FIXNUM_MIN, Fixnum, TAG_BITS, TAG_MASK, Value, WORD_SIZE,
    fixnum_fits, retag, tag, tag_fixnum, untag, untag_fixnum,
};
pub use view::{Decoded, ObjectView, decode};
pub use visitor::{Fixup, ForwardingFixup, NoFixup};
