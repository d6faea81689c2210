use core::ffi::c_void;
use core::mem::offset_of;

use crate::align::{DATA_ALIGNMENT, alignment_for};
use crate::header::{Header, Object};
use crate::layout::{ElementSize, FieldSpec, PayloadKind, PayloadSpec, TypeSchema};
use crate::types::TypeCode;
use crate::value::{CELL_SIZE, Cell, Fixnum, Value};

/// A typed view over one kind of heap object.
///
/// Implementors are `#[repr(C)]` with a [`Header`] as their first field, so
/// the same memory can be read as an [`Object`]. The offsets of every field
/// are relied on by compiled code and saved images.
pub trait HeapObject: Sized {
    /// The tag stored in the header and in references to this kind.
    const TYPE: TypeCode;
    /// Bytes per element of the trailing payload, 0 when there is none.
    const ELEMENT_SIZE: usize = 0;
    /// Width-independent description of the fields.
    const SCHEMA: TypeSchema;

    #[inline(always)]
    fn as_object(&self) -> &Object {
        // SAFETY: the header is the first field of every implementor
        unsafe { &*(self as *const Self as *const Object) }
    }

    #[inline(always)]
    fn as_object_mut(&mut self) -> &mut Object {
        // SAFETY: see `as_object`
        unsafe { &mut *(self as *mut Self as *mut Object) }
    }

    #[inline(always)]
    fn header(&self) -> &Header {
        &self.as_object().header
    }

    /// A reference to this object tagged with its kind.
    #[inline(always)]
    fn to_value(&self) -> Value {
        Value::from_ptr(self as *const Self, Self::TYPE)
    }

    /// Address right after the fixed fields, where a trailing payload starts.
    #[inline(always)]
    fn payload_ptr(&self) -> *mut u8 {
        // SAFETY: one-past-the-end of self is always a valid address to form
        unsafe { (self as *const Self).add(1) as *mut u8 }
    }
}

/// Padding cells keeping a byte array's payload on the data alignment.
pub const BYTE_ARRAY_PADDING: usize =
    alignment_for(2 * CELL_SIZE, DATA_ALIGNMENT) / CELL_SIZE;

/// Padding cells placing a boxed float's double on an 8-byte boundary.
pub const FLOAT_PADDING: usize = alignment_for(CELL_SIZE, size_of::<f64>()) / CELL_SIZE;

const CELL_PAYLOAD: ElementSize = ElementSize::Cell;

// ── Array ──────────────────────────────────────────────────────────

/// ```text
/// [header] [capacity: fixnum] [elem_0] [elem_1] ...
/// ```
#[repr(C)]
pub struct Array {
    pub header: Header,
    pub capacity: Value,
}

const _: () = assert!(size_of::<Array>() == 2 * CELL_SIZE);

impl HeapObject for Array {
    const TYPE: TypeCode = TypeCode::Array;
    const ELEMENT_SIZE: usize = CELL_SIZE;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "array",
        ty: TypeCode::Array,
        fields: &[FieldSpec::Header, FieldSpec::Tagged("capacity")],
        payload: Some(PayloadSpec {
            name: "elements",
            kind: PayloadKind::Tagged,
            element_size: CELL_PAYLOAD,
        }),
    };
}

impl Array {
    /// Write the header and capacity. The caller fills the elements.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least [`array_size(capacity)`](array_size)
    /// writable, aligned bytes.
    pub unsafe fn init(ptr: *mut Array, capacity: Cell) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Array {
                header: Header::new(TypeCode::Array),
                capacity: Value::from_fixnum(capacity as Fixnum),
            })
        };
    }

    #[inline(always)]
    pub fn capacity(&self) -> Cell {
        self.capacity.to_cell()
    }

    #[inline(always)]
    pub fn data(&self) -> *mut Value {
        self.payload_ptr() as *mut Value
    }

    /// # Safety
    ///
    /// The memory after this struct must hold `capacity()` values.
    #[inline(always)]
    pub unsafe fn elements(&self) -> &[Value] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts(self.data(), self.capacity()) }
    }

    /// # Safety
    ///
    /// See [`elements`](Self::elements).
    #[inline(always)]
    pub unsafe fn elements_mut(&mut self) -> &mut [Value] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts_mut(self.data(), self.capacity()) }
    }

    /// # Safety
    ///
    /// `index < capacity()` and the inline memory must be valid.
    #[inline(always)]
    pub unsafe fn nth(&self, index: Cell) -> Value {
        debug_assert!(index < self.capacity());
        // SAFETY: by contract
        unsafe { self.data().add(index).read() }
    }

    /// # Safety
    ///
    /// `index < capacity()` and the inline memory must be valid.
    #[inline(always)]
    pub unsafe fn set_nth(&mut self, index: Cell, value: Value) {
        debug_assert!(index < self.capacity());
        // SAFETY: by contract
        unsafe { self.data().add(index).write(value) };
    }
}

pub const fn array_size(capacity: Cell) -> Cell {
    size_of::<Array>() + capacity * CELL_SIZE
}

// ── TupleLayout ────────────────────────────────────────────────────

/// An array whose first three elements describe a tuple class.
///
/// ```text
/// [header] [capacity] [klass] [size: fixnum] [echelon: fixnum] [slot metadata ...]
/// ```
///
/// `size` is the number of slots in instances, `echelon` the depth of the
/// class in its inheritance chain.
#[repr(C)]
pub struct TupleLayout {
    pub array: Array,
    pub klass: Value,
    pub size: Value,
    pub echelon: Value,
}

const _: () = assert!(size_of::<TupleLayout>() == 5 * CELL_SIZE);

impl HeapObject for TupleLayout {
    const TYPE: TypeCode = TypeCode::Array;
    const ELEMENT_SIZE: usize = CELL_SIZE;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "tuple-layout",
        ty: TypeCode::Array,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("capacity"),
            FieldSpec::Tagged("klass"),
            FieldSpec::Tagged("size"),
            FieldSpec::Tagged("echelon"),
        ],
        payload: Some(PayloadSpec {
            name: "slot-metadata",
            kind: PayloadKind::Tagged,
            element_size: CELL_PAYLOAD,
        }),
    };
}

/// Array elements taken by `klass`, `size` and `echelon`.
pub const TUPLE_LAYOUT_RESERVED: Cell = 3;

impl TupleLayout {
    /// # Safety
    ///
    /// `ptr` must point to at least
    /// `array_size(TUPLE_LAYOUT_RESERVED + metadata_len)` writable bytes.
    pub unsafe fn init(
        ptr: *mut TupleLayout,
        klass: Value,
        size: Cell,
        echelon: Fixnum,
        metadata_len: Cell,
    ) {
        // SAFETY: by contract
        unsafe {
            Array::init(ptr as *mut Array, TUPLE_LAYOUT_RESERVED + metadata_len);
            let layout = &mut *ptr;
            layout.klass = klass;
            layout.size = Value::from_fixnum(size as Fixnum);
            layout.echelon = Value::from_fixnum(echelon);
        }
    }

    /// Number of slots in each instance.
    #[inline(always)]
    pub fn tuple_size(&self) -> Cell {
        self.size.to_cell()
    }

    #[inline(always)]
    pub fn echelon(&self) -> Fixnum {
        self.echelon.to_fixnum()
    }

    #[inline(always)]
    pub fn metadata_len(&self) -> Cell {
        let capacity = self.array.capacity();
        debug_assert!(capacity >= TUPLE_LAYOUT_RESERVED);
        capacity - TUPLE_LAYOUT_RESERVED
    }

    /// Per-slot metadata following the reserved elements.
    ///
    /// # Safety
    ///
    /// The array payload must be initialized.
    #[inline(always)]
    pub unsafe fn slot_metadata(&self) -> &[Value] {
        // SAFETY: by contract
        unsafe {
            core::slice::from_raw_parts(self.payload_ptr() as *const Value, self.metadata_len())
        }
    }
}

// ── Bignum ─────────────────────────────────────────────────────────

/// ```text
/// [header] [capacity: fixnum] [sign] [digit_0] [digit_1] ...
/// ```
///
/// `capacity` counts the sign cell. A non-zero sign cell means negative.
#[repr(C)]
pub struct Bignum {
    pub header: Header,
    pub capacity: Value,
}

const _: () = assert!(size_of::<Bignum>() == 2 * CELL_SIZE);

impl HeapObject for Bignum {
    const TYPE: TypeCode = TypeCode::Bignum;
    const ELEMENT_SIZE: usize = CELL_SIZE;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "bignum",
        ty: TypeCode::Bignum,
        fields: &[FieldSpec::Header, FieldSpec::Tagged("capacity")],
        payload: Some(PayloadSpec {
            name: "digits",
            kind: PayloadKind::Raw,
            element_size: CELL_PAYLOAD,
        }),
    };
}

impl Bignum {
    /// # Safety
    ///
    /// `ptr` must point to at least [`bignum_size(capacity)`](bignum_size)
    /// writable bytes.
    pub unsafe fn init(ptr: *mut Bignum, capacity: Cell) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Bignum {
                header: Header::new(TypeCode::Bignum),
                capacity: Value::from_fixnum(capacity as Fixnum),
            })
        };
    }

    #[inline(always)]
    pub fn capacity(&self) -> Cell {
        self.capacity.to_cell()
    }

    #[inline(always)]
    pub fn data(&self) -> *mut Cell {
        self.payload_ptr() as *mut Cell
    }

    /// Number of digits, excluding the sign cell.
    #[inline(always)]
    pub fn len(&self) -> Cell {
        self.capacity().saturating_sub(1)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Safety
    ///
    /// The payload must be initialized and `capacity() >= 1`.
    #[inline(always)]
    pub unsafe fn is_negative(&self) -> bool {
        // SAFETY: by contract
        unsafe { self.data().read() != 0 }
    }

    /// Digits, least significant first.
    ///
    /// # Safety
    ///
    /// The payload must be initialized.
    #[inline(always)]
    pub unsafe fn digits(&self) -> &[Cell] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts(self.data().add(1), self.len()) }
    }
}

pub const fn bignum_size(capacity: Cell) -> Cell {
    size_of::<Bignum>() + capacity * CELL_SIZE
}

// ── ByteArray ──────────────────────────────────────────────────────

/// ```text
/// [header] [capacity: fixnum] ([padding] on 32-bit) [byte_0] [byte_1] ...
/// ```
///
/// The payload always starts on the data alignment so it can hold any scalar.
#[repr(C)]
pub struct ByteArray {
    pub header: Header,
    pub capacity: Value,
    _padding: [Cell; BYTE_ARRAY_PADDING],
}

const _: () = assert!(size_of::<ByteArray>() == DATA_ALIGNMENT);

impl HeapObject for ByteArray {
    const TYPE: TypeCode = TypeCode::ByteArray;
    const ELEMENT_SIZE: usize = 1;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "byte-array",
        ty: TypeCode::ByteArray,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("capacity"),
            FieldSpec::PadToData,
        ],
        payload: Some(PayloadSpec {
            name: "bytes",
            kind: PayloadKind::Raw,
            element_size: ElementSize::Bytes(1),
        }),
    };
}

impl ByteArray {
    /// # Safety
    ///
    /// `ptr` must point to at least
    /// [`byte_array_size(capacity)`](byte_array_size) writable bytes.
    pub unsafe fn init(ptr: *mut ByteArray, capacity: Cell) {
        // SAFETY: by contract
        unsafe {
            ptr.write(ByteArray {
                header: Header::new(TypeCode::ByteArray),
                capacity: Value::from_fixnum(capacity as Fixnum),
                _padding: [0; BYTE_ARRAY_PADDING],
            })
        };
    }

    /// Length in bytes.
    #[inline(always)]
    pub fn capacity(&self) -> Cell {
        self.capacity.to_cell()
    }

    /// The payload reinterpreted as elements of `T`.
    #[inline(always)]
    pub fn data<T>(&self) -> *mut T {
        self.payload_ptr() as *mut T
    }

    /// # Safety
    ///
    /// The memory after this struct must hold `capacity()` bytes.
    #[inline(always)]
    pub unsafe fn bytes(&self) -> &[u8] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts(self.data::<u8>(), self.capacity()) }
    }

    /// # Safety
    ///
    /// See [`bytes`](Self::bytes).
    #[inline(always)]
    pub unsafe fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts_mut(self.data::<u8>(), self.capacity()) }
    }
}

pub const fn byte_array_size(capacity: Cell) -> Cell {
    size_of::<ByteArray>() + capacity
}

// ── String ─────────────────────────────────────────────────────────

/// ```text
/// [header] [length: fixnum] [aux] [hashcode] [char_0: u8] [char_1: u8] ...
/// ```
///
/// The inline bytes hold the low 8 bits of each character. `aux` is `f`
/// unless some character needs more, in which case it references a byte
/// array with the high bits.
#[repr(C)]
pub struct VMString {
    pub header: Header,
    pub length: Value,
    pub aux: Value,
    pub hashcode: Value,
}

const _: () = assert!(size_of::<VMString>() == 4 * CELL_SIZE);

impl HeapObject for VMString {
    const TYPE: TypeCode = TypeCode::String;
    const ELEMENT_SIZE: usize = 1;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "string",
        ty: TypeCode::String,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("length"),
            FieldSpec::Tagged("aux"),
            FieldSpec::Tagged("hashcode"),
        ],
        payload: Some(PayloadSpec {
            name: "chars",
            kind: PayloadKind::Raw,
            element_size: ElementSize::Bytes(1),
        }),
    };
}

impl VMString {
    /// # Safety
    ///
    /// `ptr` must point to at least [`string_size(length)`](string_size)
    /// writable bytes.
    pub unsafe fn init(ptr: *mut VMString, length: Cell) {
        // SAFETY: by contract
        unsafe {
            ptr.write(VMString {
                header: Header::new(TypeCode::String),
                length: Value::from_fixnum(length as Fixnum),
                aux: Value::FALSE,
                hashcode: Value::FALSE,
            })
        };
    }

    #[inline(always)]
    pub fn len(&self) -> Cell {
        self.length.to_cell()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn data(&self) -> *mut u8 {
        self.payload_ptr()
    }

    #[inline(always)]
    pub fn has_aux(&self) -> bool {
        !self.aux.is_false()
    }

    /// # Safety
    ///
    /// The memory after this struct must hold `len()` bytes.
    #[inline(always)]
    pub unsafe fn bytes(&self) -> &[u8] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts(self.data(), self.len()) }
    }
}

pub const fn string_size(length: Cell) -> Cell {
    size_of::<VMString>() + length
}

// ── Word ───────────────────────────────────────────────────────────

/// A named definition.
///
/// Compiled code and the bootstrap image hard-code these offsets. Everything
/// before `entry_point` is tagged; `entry_point` is a raw code address.
#[repr(C)]
pub struct Word {
    pub header: Header,
    pub hashcode: Value,
    pub name: Value,
    pub vocabulary: Value,
    pub def: Value,
    /// Property assoc for library code.
    pub props: Value,
    /// Inline-cache entry point for non-tail calls.
    pub pic_def: Value,
    /// Inline-cache entry point for tail calls.
    pub pic_tail_def: Value,
    /// Machine code of a sub-primitive, or `f`.
    pub subprimitive: Value,
    /// Jump here to execute the word.
    pub entry_point: Cell,
}

const _: () = assert!(size_of::<Word>() == 10 * CELL_SIZE);

impl HeapObject for Word {
    const TYPE: TypeCode = TypeCode::Word;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "word",
        ty: TypeCode::Word,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("hashcode"),
            FieldSpec::Tagged("name"),
            FieldSpec::Tagged("vocabulary"),
            FieldSpec::Tagged("def"),
            FieldSpec::Tagged("props"),
            FieldSpec::Tagged("pic-def"),
            FieldSpec::Tagged("pic-tail-def"),
            FieldSpec::Tagged("subprimitive"),
            FieldSpec::Native("entry-point"),
        ],
        payload: None,
    };
}

impl Word {
    /// Fresh word with every tagged field `f` and no entry point.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `size_of::<Word>()` writable bytes.
    pub unsafe fn init(ptr: *mut Word, name: Value, vocabulary: Value) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Word {
                header: Header::new(TypeCode::Word),
                hashcode: Value::FALSE,
                name,
                vocabulary,
                def: Value::FALSE,
                props: Value::FALSE,
                pic_def: Value::FALSE,
                pic_tail_def: Value::FALSE,
                subprimitive: Value::FALSE,
                entry_point: 0,
            })
        };
    }
}

// ── Wrapper ────────────────────────────────────────────────────────

/// Boxes a value so it is pushed rather than executed.
#[repr(C)]
pub struct Wrapper {
    pub header: Header,
    pub object: Value,
}

const _: () = assert!(size_of::<Wrapper>() == 2 * CELL_SIZE);

impl HeapObject for Wrapper {
    const TYPE: TypeCode = TypeCode::Wrapper;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "wrapper",
        ty: TypeCode::Wrapper,
        fields: &[FieldSpec::Header, FieldSpec::Tagged("object")],
        payload: None,
    };
}

impl Wrapper {
    /// # Safety
    ///
    /// `ptr` must point to `size_of::<Wrapper>()` writable bytes.
    pub unsafe fn init(ptr: *mut Wrapper, object: Value) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Wrapper {
                header: Header::new(TypeCode::Wrapper),
                object,
            })
        };
    }
}

// ── Float ──────────────────────────────────────────────────────────

/// ```text
/// [header] ([padding] on 32-bit) [n: f64]
/// ```
#[repr(C)]
pub struct BoxedFloat {
    pub header: Header,
    _padding: [Cell; FLOAT_PADDING],
    pub n: f64,
}

const _: () = assert!(size_of::<BoxedFloat>() == 16);

impl HeapObject for BoxedFloat {
    const TYPE: TypeCode = TypeCode::Float;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "float",
        ty: TypeCode::Float,
        fields: &[FieldSpec::Header, FieldSpec::PadToDouble, FieldSpec::Double("n")],
        payload: None,
    };
}

impl BoxedFloat {
    /// # Safety
    ///
    /// `ptr` must point to `size_of::<BoxedFloat>()` writable bytes.
    pub unsafe fn init(ptr: *mut BoxedFloat, n: f64) {
        // SAFETY: by contract
        unsafe {
            ptr.write(BoxedFloat {
                header: Header::new(TypeCode::Float),
                _padding: [0; FLOAT_PADDING],
                n,
            })
        };
    }
}

// ── Quotation ──────────────────────────────────────────────────────

/// Compiled code and the bootstrap image hard-code these offsets.
#[repr(C)]
pub struct Quotation {
    pub header: Header,
    /// Array of the quotation's elements.
    pub array: Value,
    pub cached_effect: Value,
    pub cache_counter: Value,
    /// Jump here to call the quotation.
    pub entry_point: Cell,
}

const _: () = assert!(size_of::<Quotation>() == 5 * CELL_SIZE);

impl HeapObject for Quotation {
    const TYPE: TypeCode = TypeCode::Quotation;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "quotation",
        ty: TypeCode::Quotation,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("array"),
            FieldSpec::Tagged("cached-effect"),
            FieldSpec::Tagged("cache-counter"),
            FieldSpec::Native("entry-point"),
        ],
        payload: None,
    };
}

impl Quotation {
    /// # Safety
    ///
    /// `ptr` must point to `size_of::<Quotation>()` writable bytes.
    pub unsafe fn init(ptr: *mut Quotation, array: Value) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Quotation {
                header: Header::new(TypeCode::Quotation),
                array,
                cached_effect: Value::FALSE,
                cache_counter: Value::FALSE,
                entry_point: 0,
            })
        };
    }
}

// ── Alien ──────────────────────────────────────────────────────────

/// A foreign pointer, either absolute or relative to a managed buffer.
///
/// `address` is derived state: [`update_address`](Self::update_address) must
/// run whenever `base` or `displacement` change or `base` moves.
#[repr(C)]
pub struct Alien {
    pub header: Header,
    /// `f` for a raw address, otherwise the object the pointer is into.
    pub base: Value,
    pub expired: Value,
    pub displacement: Cell,
    pub address: Cell,
}

const _: () = assert!(size_of::<Alien>() == 5 * CELL_SIZE);

impl HeapObject for Alien {
    const TYPE: TypeCode = TypeCode::Alien;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "alien",
        ty: TypeCode::Alien,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("base"),
            FieldSpec::Tagged("expired"),
            FieldSpec::Native("displacement"),
            FieldSpec::Native("address"),
        ],
        payload: None,
    };
}

impl Alien {
    /// # Safety
    ///
    /// `ptr` must point to `size_of::<Alien>()` writable bytes.
    pub unsafe fn init(ptr: *mut Alien, base: Value, displacement: Cell) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Alien {
                header: Header::new(TypeCode::Alien),
                base,
                expired: Value::FALSE,
                displacement,
                address: 0,
            });
            (*ptr).update_address();
        }
    }

    pub fn is_expired(&self) -> bool {
        !self.expired.is_false()
    }

    pub fn update_address(&mut self) {
        self.address = if self.base.is_false() {
            self.displacement
        } else {
            self.base
                .untag()
                .wrapping_add(size_of::<ByteArray>())
                .wrapping_add(self.displacement)
        };
        log::trace!(
            "alien {:p}: base {:?} + {:#x} -> {:#x}",
            self as *const Self,
            self.base,
            self.displacement,
            self.address
        );
    }
}

// ── Dll ────────────────────────────────────────────────────────────

#[repr(C)]
pub struct Dll {
    pub header: Header,
    /// Byte array holding the NUL-terminated library path.
    pub path: Value,
    /// Handle from the platform loader, null while unloaded.
    pub handle: *mut c_void,
}

const _: () = assert!(size_of::<Dll>() == 3 * CELL_SIZE);

impl HeapObject for Dll {
    const TYPE: TypeCode = TypeCode::Dll;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "dll",
        ty: TypeCode::Dll,
        fields: &[
            FieldSpec::Header,
            FieldSpec::Tagged("path"),
            FieldSpec::Native("handle"),
        ],
        payload: None,
    };
}

impl Dll {
    /// # Safety
    ///
    /// `ptr` must point to `size_of::<Dll>()` writable bytes.
    pub unsafe fn init(ptr: *mut Dll, path: Value) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Dll {
                header: Header::new(TypeCode::Dll),
                path,
                handle: core::ptr::null_mut(),
            })
        };
    }

    pub fn is_loaded(&self) -> bool {
        !self.handle.is_null()
    }
}

// ── Callstack ──────────────────────────────────────────────────────

/// A captured stack: `length` bytes of raw frames after the fixed fields.
#[repr(C)]
pub struct Callstack {
    pub header: Header,
    pub length: Value,
}

const _: () = assert!(size_of::<Callstack>() == 2 * CELL_SIZE);

impl HeapObject for Callstack {
    const TYPE: TypeCode = TypeCode::Callstack;
    const ELEMENT_SIZE: usize = 1;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "callstack",
        ty: TypeCode::Callstack,
        fields: &[FieldSpec::Header, FieldSpec::Tagged("length")],
        payload: Some(PayloadSpec {
            name: "frames",
            kind: PayloadKind::Raw,
            element_size: ElementSize::Bytes(1),
        }),
    };
}

impl Callstack {
    /// # Safety
    ///
    /// `ptr` must point to at least
    /// [`callstack_object_size(length)`](callstack_object_size) writable bytes.
    pub unsafe fn init(ptr: *mut Callstack, length: Cell) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Callstack {
                header: Header::new(TypeCode::Callstack),
                length: Value::from_fixnum(length as Fixnum),
            })
        };
    }

    #[inline(always)]
    pub fn len(&self) -> Cell {
        self.length.to_cell()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the frame starting `offset` bytes into the payload.
    #[inline(always)]
    pub fn frame_top_at(&self, offset: Cell) -> Cell {
        self.payload_ptr() as Cell + offset
    }

    /// First byte of the captured frames.
    #[inline(always)]
    pub fn top(&self) -> *mut u8 {
        self.payload_ptr()
    }

    /// One past the last byte of the captured frames.
    #[inline(always)]
    pub fn bottom(&self) -> *mut u8 {
        self.payload_ptr().wrapping_add(self.len())
    }
}

pub const fn callstack_object_size(length: Cell) -> Cell {
    size_of::<Callstack>() + length
}

// ── Tuple ──────────────────────────────────────────────────────────

/// An instance of a user-defined class. The slot count comes from the
/// [`TupleLayout`] referenced by `layout`.
#[repr(C)]
pub struct Tuple {
    pub header: Header,
    pub layout: Value,
}

const _: () = assert!(size_of::<Tuple>() == 2 * CELL_SIZE);

impl HeapObject for Tuple {
    const TYPE: TypeCode = TypeCode::Tuple;
    const ELEMENT_SIZE: usize = CELL_SIZE;
    const SCHEMA: TypeSchema = TypeSchema {
        name: "tuple",
        ty: TypeCode::Tuple,
        fields: &[FieldSpec::Header, FieldSpec::Tagged("layout")],
        payload: Some(PayloadSpec {
            name: "slots",
            kind: PayloadKind::Tagged,
            element_size: CELL_PAYLOAD,
        }),
    };
}

impl Tuple {
    /// # Safety
    ///
    /// `ptr` must point to at least `tuple_object_size(size)` writable bytes,
    /// where `size` is the layout's tuple size.
    pub unsafe fn init(ptr: *mut Tuple, layout: Value) {
        // SAFETY: by contract
        unsafe {
            ptr.write(Tuple {
                header: Header::new(TypeCode::Tuple),
                layout,
            })
        };
    }

    #[inline(always)]
    pub fn data(&self) -> *mut Value {
        self.payload_ptr() as *mut Value
    }

    /// # Safety
    ///
    /// `layout` must reference a live, unforwarded [`TupleLayout`].
    #[inline(always)]
    pub unsafe fn layout(&self) -> &TupleLayout {
        // SAFETY: by contract
        unsafe { self.layout.as_ref() }
    }

    /// # Safety
    ///
    /// As for [`layout`](Self::layout), and the slots must be initialized.
    #[inline(always)]
    pub unsafe fn slots(&self) -> &[Value] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts(self.data(), self.layout().tuple_size()) }
    }

    /// # Safety
    ///
    /// As for [`slots`](Self::slots).
    #[inline(always)]
    pub unsafe fn slots_mut(&mut self) -> &mut [Value] {
        // SAFETY: by contract
        unsafe { core::slice::from_raw_parts_mut(self.data(), self.layout().tuple_size()) }
    }
}

pub const fn tuple_object_size(tuple_size: Cell) -> Cell {
    size_of::<Tuple>() + tuple_size * CELL_SIZE
}

/// End of the traced fields of the fixed-size kinds: everything before these
/// offsets is tagged, everything from them on is native.
pub(crate) const WORD_TRACED_END: usize = offset_of!(Word, entry_point);
pub(crate) const QUOTATION_TRACED_END: usize = offset_of!(Quotation, entry_point);
pub(crate) const ALIEN_TRACED_END: usize = offset_of!(Alien, displacement);
pub(crate) const DLL_TRACED_END: usize = offset_of!(Dll, handle);
pub(crate) const BYTE_ARRAY_TRACED_END: usize = offset_of!(ByteArray, capacity) + CELL_SIZE;
