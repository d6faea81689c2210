use crate::value::{Cell, TAG_MASK};

/// Every heap object starts on a multiple of this, which keeps the low
/// [`TAG_BITS`](crate::TAG_BITS) of a reference free for the type tag.
pub const DATA_ALIGNMENT: Cell = 16;

const _: () = assert!(DATA_ALIGNMENT.is_power_of_two());
const _: () = assert!(DATA_ALIGNMENT > TAG_MASK);

/// Round `a` up to the next multiple of `b`. `b` must be a power of two.
#[inline(always)]
pub const fn align(a: Cell, b: Cell) -> Cell {
    debug_assert!(b.is_power_of_two());
    (a + (b - 1)) & !(b - 1)
}

/// Padding needed to bring `a` up to a multiple of `b`.
#[inline(always)]
pub const fn alignment_for(a: Cell, b: Cell) -> Cell {
    align(a, b) - a
}

#[inline(always)]
pub const fn is_aligned(a: Cell, b: Cell) -> bool {
    debug_assert!(b.is_power_of_two());
    a & (b - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn align_examples() {
        assert_eq!(align(0, 16), 0);
        assert_eq!(align(1, 16), 16);
        assert_eq!(align(16, 16), 16);
        assert_eq!(align(17, 16), 32);
        assert_eq!(align(100, 8), 104);
        assert_eq!(alignment_for(17, 16), 15);
        assert_eq!(alignment_for(32, 16), 0);
    }

    #[test]
    fn is_aligned_matches_align() {
        assert!(is_aligned(0, DATA_ALIGNMENT));
        assert!(is_aligned(48, DATA_ALIGNMENT));
        assert!(!is_aligned(40, DATA_ALIGNMENT));
        assert!(is_aligned(40, 8));
    }

    proptest! {
        #[test]
        fn align_is_smallest_multiple_not_below(a in 0usize..(1 << 20), shift in 0u32..12) {
            let b = 1usize << shift;
            let r = align(a, b);
            prop_assert!(r >= a);
            prop_assert_eq!(r % b, 0);
            prop_assert!(r - a < b);
            prop_assert_eq!(alignment_for(a, b), r - a);
        }
    }
}
