use crate::types::TypeCode;

/// An untagged machine word.
pub type Cell = usize;
/// A signed machine word, the native representation of a fixnum.
pub type Fixnum = isize;

pub const CELL_SIZE: usize = size_of::<Cell>();
pub const WORD_SIZE: u32 = Cell::BITS;

pub const TAG_BITS: u32 = 4;
pub const TAG_MASK: Cell = (1 << TAG_BITS) - 1;

/// Smallest integer that survives a trip through [`Value::from_fixnum`].
pub const FIXNUM_MIN: Fixnum = Fixnum::MIN >> TAG_BITS;
/// Largest integer that survives a trip through [`Value::from_fixnum`].
pub const FIXNUM_MAX: Fixnum = Fixnum::MAX >> TAG_BITS;

#[inline(always)]
pub const fn tag(x: Cell) -> Cell {
    x & TAG_MASK
}

#[inline(always)]
pub const fn untag(x: Cell) -> Cell {
    x & !TAG_MASK
}

#[inline(always)]
pub const fn retag(x: Cell, tag: Cell) -> Cell {
    untag(x) | tag
}

#[inline(always)]
pub const fn tag_fixnum(untagged: Fixnum) -> Cell {
    ((untagged << TAG_BITS) as Cell) | TypeCode::Fixnum as Cell
}

#[inline(always)]
pub const fn untag_fixnum(tagged: Cell) -> Fixnum {
    debug_assert!(tag(tagged) == TypeCode::Fixnum as Cell);
    (tagged as Fixnum) >> TAG_BITS
}

/// Whether `n` can be encoded as a fixnum without losing high bits. Values
/// outside this range belong in a bignum.
#[inline(always)]
pub const fn fixnum_fits(n: Fixnum) -> bool {
    n >= FIXNUM_MIN && n <= FIXNUM_MAX
}

/// A tagged machine word.
///
/// Encoding (low 4 bits):
/// - `0`       fixnum, the remaining bits are a signed integer.
/// - `1`       the false object `f`; the only value with this tag is `1`.
/// - `2..=13`  reference; the untagged bits are the address of a heap object
///             of the matching [`TypeCode`].
///
/// Heap objects are aligned to [`DATA_ALIGNMENT`](crate::DATA_ALIGNMENT) so
/// the tag never overlaps address bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(Cell);

impl Value {
    /// What the language calls `f`.
    pub const FALSE: Value = Value(TypeCode::F as Cell);

    #[inline(always)]
    pub const fn raw(self) -> Cell {
        self.0
    }

    #[inline(always)]
    pub const fn from_raw(raw: Cell) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn tag(self) -> Cell {
        tag(self.0)
    }

    #[inline(always)]
    pub const fn untag(self) -> Cell {
        untag(self.0)
    }

    #[inline(always)]
    pub const fn retag(self, tag: Cell) -> Self {
        debug_assert!(tag <= TAG_MASK);
        Self(retag(self.0, tag))
    }

    /// Fixnums and `f` are fully encoded in their word. Relies on those two
    /// owning tags 0 and 1.
    #[inline(always)]
    pub const fn is_immediate(self) -> bool {
        self.tag() <= TypeCode::F as Cell
    }

    #[inline(always)]
    pub const fn is_false(self) -> bool {
        self.0 == Self::FALSE.0
    }

    // ── Fixnum ─────────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_fixnum(self) -> bool {
        self.tag() == TypeCode::Fixnum as Cell
    }

    #[inline(always)]
    pub const fn from_fixnum(n: Fixnum) -> Self {
        Self(tag_fixnum(n))
    }

    #[inline(always)]
    pub const fn to_fixnum(self) -> Fixnum {
        untag_fixnum(self.0)
    }

    /// Read a fixnum that is known to be a non-negative count.
    #[inline(always)]
    pub const fn to_cell(self) -> Cell {
        let n = self.to_fixnum();
        debug_assert!(n >= 0, "negative fixnum used as a count");
        n as Cell
    }

    // ── Reference ──────────────────────────────────────────────────

    /// The type tag of a reference, or `None` for tags 14 and 15 which no
    /// kind owns.
    #[inline(always)]
    pub fn type_code(self) -> Option<TypeCode> {
        TypeCode::try_from(self.tag()).ok()
    }

    #[inline(always)]
    pub fn from_ptr<T>(ptr: *const T, ty: TypeCode) -> Self {
        let addr = ptr as Cell;
        debug_assert!(tag(addr) == 0, "pointer not aligned: {addr:#x}");
        debug_assert!(!ty.is_immediate(), "{ty} is not a heap type");
        Self(addr | ty as Cell)
    }

    #[inline(always)]
    pub fn as_ptr<T>(self) -> *mut T {
        self.untag() as *mut T
    }

    /// # Safety
    ///
    /// The value must be a reference to a valid, live `T`.
    #[inline(always)]
    pub unsafe fn as_ref<'a, T>(self) -> &'a T {
        debug_assert!(!self.is_immediate());
        // SAFETY: by contract this points at a live T
        unsafe { &*self.as_ptr::<T>() }
    }

    /// # Safety
    ///
    /// The value must be a reference to a valid, live `T`, and no other
    /// references to it may exist.
    #[inline(always)]
    pub unsafe fn as_mut<'a, T>(self) -> &'a mut T {
        debug_assert!(!self.is_immediate());
        // SAFETY: by contract this points at a live T nobody else borrows
        unsafe { &mut *self.as_ptr::<T>() }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::FALSE
    }
}

impl From<Fixnum> for Value {
    fn from(value: Fixnum) -> Self {
        Value::from_fixnum(value)
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_fixnum() {
            write!(f, "Fixnum({})", self.to_fixnum())
        } else if self.is_false() {
            write!(f, "False")
        } else {
            match self.type_code() {
                Some(ty) => write!(f, "Ref({ty}, 0x{:x})", self.untag()),
                None => write!(f, "Invalid(0x{:x})", self.0),
            }
        }
    }
}
