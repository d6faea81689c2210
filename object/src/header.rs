use crate::align::{DATA_ALIGNMENT, is_aligned};
use crate::objects::HeapObject;
use crate::types::TypeCode;
use crate::value::{Cell, TAG_MASK};

const FREE_BIT: Cell = 1 << 0;
const FORWARDING_BIT: Cell = 1 << 1;
const CONTROL_MASK: Cell = FREE_BIT | FORWARDING_BIT;
const TYPE_SHIFT: u32 = 2;
const HASHCODE_SHIFT: u32 = 6;
const LOW_BITS_MASK: Cell = (1 << HASHCODE_SHIFT) - 1;

/// The one-word header at the start of every heap object.
///
/// ```text
/// bit 0      free        block belongs to a free list (tenured space only)
/// bit 1      forwarding  object moved; bits 2.. hold the new address
/// bits 2‥5   type        TypeCode, meaningful when bits 0 and 1 are clear
/// bits 6‥    hashcode    identity hash, 0 until assigned
/// ```
///
/// The three readings are mutually exclusive. Callers check
/// [`is_free`](Self::is_free) and
/// [`is_forwarding_pointer`](Self::is_forwarding_pointer) before trusting
/// [`type_code`](Self::type_code); only debug builds verify this.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Header(Cell);

const _: () = assert!(size_of::<Header>() == size_of::<Cell>());

impl Header {
    #[inline(always)]
    pub const fn new(ty: TypeCode) -> Self {
        Self((ty as Cell) << TYPE_SHIFT)
    }

    #[inline(always)]
    pub const fn from_raw(raw: Cell) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> Cell {
        self.0
    }

    /// Set the type, clear the hashcode and both control bits.
    #[inline(always)]
    pub fn initialize(&mut self, ty: TypeCode) {
        *self = Self::new(ty);
    }

    /// Raw 4-bit type field, without interpreting it.
    #[inline(always)]
    pub const fn raw_type(self) -> Cell {
        (self.0 >> TYPE_SHIFT) & TAG_MASK
    }

    #[inline(always)]
    pub fn type_code(self) -> TypeCode {
        debug_assert!(!self.is_free(), "type of a free block");
        debug_assert!(!self.is_forwarding_pointer(), "type of a forwarded object");
        TypeCode::from_cell(self.raw_type())
    }

    // ── hashcode ───────────────────────────────────────────────────

    #[inline(always)]
    pub const fn hashcode(self) -> Cell {
        self.0 >> HASHCODE_SHIFT
    }

    /// Bits of `hashcode` above the header's capacity are dropped.
    #[inline(always)]
    pub fn set_hashcode(&mut self, hashcode: Cell) {
        self.0 = (self.0 & LOW_BITS_MASK) | (hashcode << HASHCODE_SHIFT);
    }

    // ── collector state ────────────────────────────────────────────

    /// Only meaningful for objects in tenured space. A free block must be
    /// read through the collector's free-block descriptor, not as an object.
    #[inline(always)]
    pub const fn is_free(self) -> bool {
        self.0 & FREE_BIT == FREE_BIT
    }

    #[inline(always)]
    pub const fn is_forwarding_pointer(self) -> bool {
        self.0 & FORWARDING_BIT == FORWARDING_BIT
    }

    #[inline(always)]
    pub fn forwarding_pointer(self) -> *mut Object {
        debug_assert!(self.is_forwarding_pointer());
        (self.0 & !CONTROL_MASK) as *mut Object
    }

    /// Overwrite this header with a forwarding pointer to `target`. The type
    /// and hashcode are lost until the memory is initialized again.
    #[inline(always)]
    pub fn forward_to(&mut self, target: *const Object) {
        let addr = target as Cell;
        debug_assert!(is_aligned(addr, DATA_ALIGNMENT), "forwarding to unaligned {addr:#x}");
        log::trace!("forwarding {:p} -> {addr:#x}", self as *const Self);
        self.0 = addr | FORWARDING_BIT;
    }
}

impl core::fmt::Debug for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_forwarding_pointer() {
            write!(f, "Header(forwarded -> {:p})", self.forwarding_pointer())
        } else if self.is_free() {
            write!(f, "Header(free, 0x{:x})", self.0)
        } else {
            let ty = TypeCode::try_from(self.raw_type());
            f.debug_struct("Header")
                .field("type", &ty)
                .field("hashcode", &self.hashcode())
                .finish()
        }
    }
}

// ── Object ─────────────────────────────────────────────────────────

/// The part every heap object shares. Typed records embed a [`Header`] as
/// their first field, so any of them can be viewed as an `Object`.
#[repr(C)]
pub struct Object {
    pub header: Header,
}

impl Object {
    #[inline(always)]
    pub fn type_code(&self) -> TypeCode {
        self.header.type_code()
    }

    #[inline(always)]
    pub fn address(&self) -> Cell {
        self as *const Self as Cell
    }

    /// The object viewed as a sequence of cells, header first.
    #[inline(always)]
    pub fn slots(&self) -> *mut Cell {
        self as *const Self as *mut Cell
    }

    /// View this object as a `T`. Reading the wrong kind is a type
    /// confusion; debug builds catch it here.
    #[inline(always)]
    pub fn cast<T: HeapObject>(&self) -> &T {
        debug_assert_eq!(self.type_code(), T::TYPE, "type confusion");
        // SAFETY: T is repr(C) with the header first and the tag says this is a T
        unsafe { &*(self as *const Self as *const T) }
    }

    #[inline(always)]
    pub fn cast_mut<T: HeapObject>(&mut self) -> &mut T {
        debug_assert_eq!(self.type_code(), T::TYPE, "type confusion");
        // SAFETY: see `cast`
        unsafe { &mut *(self as *mut Self as *mut T) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn initialize_every_type() {
        for ty in TypeCode::ALL {
            let mut h = Header::from_raw(Cell::MAX);
            h.initialize(ty);
            assert_eq!(h.type_code(), ty);
            assert_eq!(h.hashcode(), 0);
            assert!(!h.is_free());
            assert!(!h.is_forwarding_pointer());
            assert_eq!(h, Header::new(ty));
        }
    }

    #[test]
    fn hashcode_keeps_type() {
        let max_hash = Cell::MAX >> HASHCODE_SHIFT;
        for (ty, hash) in [
            (TypeCode::Array, 0),
            (TypeCode::Word, 1),
            (TypeCode::String, 0xdead_beef),
            (TypeCode::Dll, max_hash),
            (TypeCode::Tuple, max_hash - 1),
        ] {
            let mut h = Header::new(ty);
            h.set_hashcode(hash);
            assert_eq!(h.hashcode(), hash);
            assert_eq!(h.type_code(), ty);
            assert!(!h.is_free());
            assert!(!h.is_forwarding_pointer());
        }
    }

    #[test]
    fn set_hashcode_replaces_previous_hash() {
        let mut h = Header::new(TypeCode::Quotation);
        h.set_hashcode(0x55);
        h.set_hashcode(0x12);
        assert_eq!(h.hashcode(), 0x12);
        h.set_hashcode(0);
        assert_eq!(h, Header::new(TypeCode::Quotation));
    }

    #[test]
    fn forward_to_sets_forwarding_pointer() {
        let target = 0x7f00_1230 as *const Object;
        let mut h = Header::new(TypeCode::Array);
        h.set_hashcode(77);
        h.forward_to(target);
        assert!(h.is_forwarding_pointer());
        assert!(!h.is_free());
        assert_eq!(h.forwarding_pointer() as *const Object, target);
    }

    #[test]
    fn free_bit_is_bit_zero() {
        let h = Header::from_raw(Header::new(TypeCode::ByteArray).raw() | 1);
        assert!(h.is_free());
        assert!(!h.is_forwarding_pointer());
        assert_eq!(h.raw_type(), TypeCode::ByteArray as Cell);
    }

    #[test]
    #[should_panic(expected = "invalid type code 15")]
    fn corrupt_type_field_is_fatal() {
        Header::from_raw(15 << TYPE_SHIFT).type_code();
    }

    #[test]
    fn debug_output() {
        let mut h = Header::new(TypeCode::Word);
        h.set_hashcode(3);
        assert_eq!(format!("{h:?}"), "Header { type: Ok(Word), hashcode: 3 }");
        assert_eq!(format!("{:?}", Header::from_raw(0x41)), "Header(free, 0x41)");
    }

    proptest! {
        #[test]
        fn hashcode_round_trip(code in 0usize..14, hash in 0..=(Cell::MAX >> HASHCODE_SHIFT)) {
            let ty = TypeCode::from_cell(code);
            let mut h = Header::new(ty);
            h.set_hashcode(hash);
            prop_assert_eq!(h.hashcode(), hash);
            prop_assert_eq!(h.type_code(), ty);
        }

        #[test]
        fn forwarding_round_trip(block in 1usize..(1 << 24), code in 0usize..14) {
            let target = (block * DATA_ALIGNMENT) as *const Object;
            let mut h = Header::new(TypeCode::from_cell(code));
            h.forward_to(target);
            prop_assert!(h.is_forwarding_pointer());
            prop_assert_eq!(h.forwarding_pointer() as *const Object, target);
        }
    }
}
