use std::alloc::{Layout, alloc_zeroed, dealloc};

use object::{
    Alien, Array, Bignum, BoxedFloat, ByteArray, CELL_SIZE, Callstack, Cell, DATA_ALIGNMENT,
    Decoded, Dll, Fixup, ForwardingFixup, Header, HeapObject, LayoutError, LayoutSettings, Object,
    ObjectView, Quotation, Tuple, TupleLayout, TypeCode, VMString, Value, Word, Wrapper, align,
    array_size, byte_array_size, callstack_object_size, decode, is_aligned, layout_table,
    string_size, tuple_object_size,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Zeroed, data-aligned memory handed out front to back, standing in for the
/// allocator.
struct Region {
    start: *mut u8,
    layout: Layout,
    used: usize,
}

impl Region {
    fn new(size: usize) -> Region {
        let layout = Layout::from_size_align(size, DATA_ALIGNMENT).unwrap();
        let start = unsafe { alloc_zeroed(layout) };
        assert!(!start.is_null());
        Region {
            start,
            layout,
            used: 0,
        }
    }

    fn reserve<T>(&mut self, size: usize) -> *mut T {
        let size = align(size, DATA_ALIGNMENT);
        assert!(self.used + size <= self.layout.size(), "region exhausted");
        let ptr = unsafe { self.start.add(self.used) };
        self.used += size;
        assert!(is_aligned(ptr as usize, DATA_ALIGNMENT));
        ptr as *mut T
    }

    fn first(&self) -> *mut Object {
        self.start as *mut Object
    }

    fn end(&self) -> *mut u8 {
        unsafe { self.start.add(self.used) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe { dealloc(self.start, self.layout) };
    }
}

fn byte_array(region: &mut Region, bytes: &[u8]) -> *mut ByteArray {
    let ptr = region.reserve::<ByteArray>(byte_array_size(bytes.len()));
    unsafe {
        ByteArray::init(ptr, bytes.len());
        (*ptr).bytes_mut().copy_from_slice(bytes);
    }
    ptr
}

#[test]
fn alien_without_base_uses_displacement() {
    init_logging();
    let mut region = Region::new(256);
    let alien = region.reserve::<Alien>(size_of::<Alien>());
    unsafe {
        for displacement in [0x1000, 0xdead_b000] {
            Alien::init(alien, Value::FALSE, displacement);
            assert_eq!((*alien).address, displacement);
        }
        (*alien).displacement = 0x40;
        (*alien).update_address();
        assert_eq!((*alien).address, 0x40);
        assert!(!(*alien).is_expired());
    }
}

#[test]
fn alien_with_base_points_into_byte_array_payload() {
    init_logging();
    let mut region = Region::new(512);
    let buffer = byte_array(&mut region, b"hello, world");
    let alien = region.reserve::<Alien>(size_of::<Alien>());
    unsafe {
        let base = (*buffer).to_value();
        for displacement in [0, 7] {
            Alien::init(alien, base, displacement);
            let expected = base.untag() + size_of::<ByteArray>() + displacement;
            assert_eq!((*alien).address, expected);
            assert_eq!(*((*alien).address as *const u8), b"hello, world"[displacement]);
        }
    }
}

#[test]
fn alien_follows_a_moved_base() {
    let mut region = Region::new(512);
    let first = byte_array(&mut region, &[1, 2, 3, 4]);
    let second = byte_array(&mut region, &[5, 6, 7, 8]);
    let alien = region.reserve::<Alien>(size_of::<Alien>());
    unsafe {
        Alien::init(alien, (*first).to_value(), 2);
        assert_eq!(*((*alien).address as *const u8), 3);
        (*alien).base = (*second).to_value();
        (*alien).update_address();
        assert_eq!(*((*alien).address as *const u8), 7);
    }
}

#[test]
fn callstack_range_matches_length() {
    let mut region = Region::new(1024);
    for length in [0, 16, 24, 200] {
        let stack = region.reserve::<Callstack>(callstack_object_size(length));
        unsafe {
            Callstack::init(stack, length);
            let stack = &*stack;
            assert_eq!(stack.bottom() as usize - stack.top() as usize, length);
            assert_eq!(stack.top() as usize, stack.as_object().address() + 2 * CELL_SIZE);
            assert_eq!(stack.frame_top_at(8), stack.top() as usize + 8);
            assert_eq!(stack.is_empty(), length == 0);
        }
    }
}

#[test]
fn byte_array_payload_holds_any_scalar() {
    let mut region = Region::new(256);
    let bytes = byte_array(&mut region, &[0; 16]);
    unsafe {
        let payload = (*bytes).data::<f64>();
        assert!(is_aligned(payload as usize, DATA_ALIGNMENT));
        payload.write(2.5);
        payload.add(1).write(-1.0);
        assert_eq!(*payload, 2.5);
        assert_eq!(&(*bytes).bytes()[8..], &(-1.0f64).to_ne_bytes()[..]);
    }
}

#[test]
fn string_inline_characters() {
    let mut region = Region::new(256);
    let text = b"concatenative";
    let string = region.reserve::<VMString>(string_size(text.len()));
    unsafe {
        VMString::init(string, text.len());
        core::ptr::copy_nonoverlapping(text.as_ptr(), (*string).data(), text.len());
        assert_eq!((*string).bytes(), text);
        assert!(!(*string).has_aux());
        assert_eq!((*string).as_object().size(), align(string_size(13), DATA_ALIGNMENT));
    }
}

#[test]
fn bignum_sign_and_digits() {
    let mut region = Region::new(256);
    let bignum = region.reserve::<Bignum>(object::bignum_size(3));
    unsafe {
        Bignum::init(bignum, 3);
        let data = (*bignum).data();
        data.write(1);
        data.add(1).write(0xffff);
        data.add(2).write(0x1);
        assert!((*bignum).is_negative());
        assert_eq!((*bignum).len(), 2);
        assert_eq!((*bignum).digits(), &[0xffff, 0x1]);
        let mut slots = 0;
        (*bignum).as_object_mut().each_slot(|_| slots += 1);
        assert_eq!(slots, 1, "only the capacity is traced");
    }
}

#[test]
fn tuple_slots_come_from_its_layout() {
    let mut region = Region::new(1024);
    let layout = region.reserve::<TupleLayout>(array_size(3 + 2));
    let tuple = region.reserve::<Tuple>(tuple_object_size(2));
    unsafe {
        TupleLayout::init(layout, Value::FALSE, 2, 3, 2);
        (*layout).array.set_nth(3, Value::from_fixnum(100));
        (*layout).array.set_nth(4, Value::from_fixnum(101));
        assert_eq!((*layout).tuple_size(), 2);
        assert_eq!((*layout).echelon(), 3);
        let metadata: Vec<_> = (*layout).slot_metadata().iter().map(|v| v.to_fixnum()).collect();
        assert_eq!(metadata, [100, 101]);

        Tuple::init(tuple, (*layout).to_value());
        (*tuple).slots_mut()[0] = Value::from_fixnum(1);
        (*tuple).slots_mut()[1] = Value::FALSE;

        let mut visited = Vec::new();
        (*tuple).as_object_mut().each_slot(|slot| visited.push(*slot));
        assert_eq!(
            visited,
            [(*layout).to_value(), Value::from_fixnum(1), Value::FALSE]
        );
        assert_eq!((*tuple).as_object().size(), align(4 * CELL_SIZE, DATA_ALIGNMENT));
    }
}

#[test]
fn native_fields_are_never_visited() {
    let mut region = Region::new(512);
    let quotation = region.reserve::<Quotation>(size_of::<Quotation>());
    let dll = region.reserve::<Dll>(size_of::<Dll>());
    let alien = region.reserve::<Alien>(size_of::<Alien>());
    let native = 0x7777_0000;
    unsafe {
        Quotation::init(quotation, Value::FALSE);
        (*quotation).entry_point = native;
        Dll::init(dll, Value::FALSE);
        (*dll).handle = native as *mut core::ffi::c_void;
        Alien::init(alien, Value::FALSE, native);

        for (obj, tagged) in [
            ((*quotation).as_object_mut(), 3),
            ((*dll).as_object_mut(), 1),
            ((*alien).as_object_mut(), 2),
        ] {
            let mut count = 0;
            obj.each_slot(|slot| {
                assert_ne!(slot.raw(), native);
                count += 1;
            });
            assert_eq!(count, tagged, "{}", obj.type_code());
        }
        assert!((*dll).is_loaded());
    }
}

#[test]
fn walking_a_region_by_object_size() {
    init_logging();
    let mut region = Region::new(4096);
    let mut expected = Vec::new();

    unsafe {
        let array = region.reserve::<Array>(array_size(5));
        Array::init(array, 5);
        expected.push(TypeCode::Array);

        let float = region.reserve::<BoxedFloat>(size_of::<BoxedFloat>());
        BoxedFloat::init(float, 0.25);
        expected.push(TypeCode::Float);

        byte_array(&mut region, &[9; 33]);
        expected.push(TypeCode::ByteArray);

        let word = region.reserve::<Word>(size_of::<Word>());
        Word::init(word, Value::FALSE, Value::FALSE);
        expected.push(TypeCode::Word);

        let wrapper = region.reserve::<Wrapper>(size_of::<Wrapper>());
        Wrapper::init(wrapper, (*word).to_value());
        expected.push(TypeCode::Wrapper);

        let stack = region.reserve::<Callstack>(callstack_object_size(40));
        Callstack::init(stack, 40);
        expected.push(TypeCode::Callstack);

        let mut seen = Vec::new();
        let mut scan = region.first() as *mut u8;
        while scan < region.end() {
            let obj = &*(scan as *const Object);
            let view = ObjectView::of(obj);
            assert_eq!(view.type_code(), obj.type_code());
            seen.push(view.type_code());
            scan = scan.add(obj.size());
        }
        assert_eq!(scan, region.end());
        assert_eq!(seen, expected);
    }
}

#[test]
fn copying_an_object_leaves_a_forwarding_header() {
    init_logging();
    let mut from = Region::new(512);
    let mut to = Region::new(512);

    unsafe {
        let word = from.reserve::<Word>(size_of::<Word>());
        Word::init(word, Value::from_fixnum(11), Value::from_fixnum(22));
        (*word).header.set_hashcode(0x1234);
        let wrapper = from.reserve::<Wrapper>(size_of::<Wrapper>());
        Wrapper::init(wrapper, (*word).to_value());

        // copy the word the way a copying collector would
        let size = (*word).as_object().size();
        let copy = to.reserve::<Object>(size);
        core::ptr::copy_nonoverlapping(word as *const u8, copy as *mut u8, size);
        (*word).header.forward_to(copy);

        let stale = Value::from_ptr(word as *const Word, TypeCode::Word);
        assert_eq!(
            decode(stale).unwrap_err(),
            LayoutError::Forwarded {
                address: word as usize,
                target: copy as usize
            }
        );

        // update every reference in the wrapper through the forwarding header
        (*wrapper).as_object_mut().each_slot(|slot| {
            if slot.is_immediate() {
                return;
            }
            let header: Header = (*slot.as_ptr::<Object>()).header;
            if header.is_forwarding_pointer() {
                *slot = Value::from_ptr(header.forwarding_pointer() as *const Object, TypeCode::Word);
            }
        });

        match decode((*wrapper).object).unwrap() {
            Decoded::Object(ObjectView::Word(moved)) => {
                assert_eq!(moved.as_object().address(), copy as usize);
                assert_eq!(moved.header.hashcode(), 0x1234);
                assert_eq!(moved.name.to_fixnum(), 11);
                assert_eq!(moved.vocabulary.to_fixnum(), 22);
            }
            other => panic!("expected the moved word, got {other:?}"),
        }

        let moved = ForwardingFixup.translate_data(word as *const Object);
        assert_eq!(moved as usize, copy as usize);
    }
}

#[test]
fn every_heap_type_round_trips_through_decode() {
    let mut region = Region::new(4096);
    unsafe {
        for ty in TypeCode::ALL.into_iter().filter(|ty| !ty.is_immediate()) {
            let obj = region.reserve::<Object>(4 * CELL_SIZE);
            (*obj).header.initialize(ty);
            let value = Value::from_ptr(obj as *const Object, ty);
            match decode(value).unwrap() {
                Decoded::Object(view) => {
                    assert_eq!(view.type_code(), ty);
                    assert_eq!(view.as_object().address(), obj as usize);
                }
                other => panic!("{ty} decoded as {other:?}"),
            }
        }
    }
}

#[test]
fn native_layout_table_agrees_with_allocated_objects() {
    let table = layout_table(&LayoutSettings::default()).unwrap();
    let mut region = Region::new(256);
    let alien = region.reserve::<Alien>(size_of::<Alien>());
    unsafe {
        Alien::init(alien, Value::FALSE, 0x5000);
        let layout = table.iter().find(|l| l.ty == TypeCode::Alien).unwrap();
        let offset = layout.field("address").unwrap().offset;
        let raw = *((alien as *const u8).add(offset) as *const Cell);
        assert_eq!(raw, 0x5000);
        assert_eq!(layout.traced_end, (*alien).as_object().binary_payload_start());
    }
}
