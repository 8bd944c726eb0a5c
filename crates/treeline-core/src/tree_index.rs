use smallvec::{smallvec, SmallVec};

use std::cmp::Ordering;
use std::fmt;
use std::ops::{AddAssign, Shl, ShlAssign, ShrAssign, Sub, SubAssign};

/// Position of a node in the flattened numbering of the hierarchical tree.
///
/// Node `0` is the root; the children of node `i` occupy
/// `(i << D) + 1 ..= (i << D) + 2^D`, where `D` is the tree dimensionality.
/// Realistic trees exceed 64-bit node counts past depth ~21, so the index is
/// arbitrary precision: a little-endian vector of `u64` limbs that grows on
/// demand (two limbs are stored inline, which covers any depth a build will
/// actually reach without touching the heap).
///
/// This is deliberately not a general bignum. Only the operations the index
/// arithmetic needs exist, and shifts always mean "multiply or divide by the
/// branching factor."
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TreeIndex {
    /// Little-endian limbs. Canonical form: no trailing zero limbs, except a
    /// lone zero limb for the value zero.
    limbs: SmallVec<[u64; 2]>,
}

impl TreeIndex {
    pub fn zero() -> Self {
        Self {
            limbs: SmallVec::new(),
        }
    }

    pub fn new(value: u64) -> Self {
        if value == 0 {
            return Self::zero();
        }
        Self {
            limbs: smallvec![value],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    /// The value as a machine word. The caller must know the value fits; a
    /// multi-limb index here is a logic error upstream.
    pub fn simple(&self) -> u64 {
        debug_assert!(
            self.limbs.len() <= 1,
            "tree index does not fit in a machine word"
        );
        self.limbs.first().copied().unwrap_or(0)
    }

    /// Add one.
    pub fn incr(&mut self) {
        *self += 1u64;
    }

    /// Subtract one. The index must be nonzero.
    pub fn decr(&mut self) {
        *self -= 1u64;
    }

    /// Quotient and remainder of division by a machine-word divisor.
    pub fn div_rem(&self, divisor: u64) -> (TreeIndex, u64) {
        assert!(divisor != 0, "tree index division by zero");
        let mut quotient: SmallVec<[u64; 2]> = smallvec![0; self.limbs.len().max(1)];
        let mut rem: u128 = 0;
        for i in (0..self.limbs.len()).rev() {
            let cur = (rem << 64) | u128::from(self.limbs[i]);
            quotient[i] = (cur / u128::from(divisor)) as u64;
            rem = cur % u128::from(divisor);
        }
        let mut q = TreeIndex { limbs: quotient };
        q.trim();
        (q, rem as u64)
    }

    fn trim(&mut self) {
        while self.limbs.len() > 1 && *self.limbs.last().unwrap() == 0 {
            self.limbs.pop();
        }
        if self.limbs.len() == 1 && self.limbs[0] == 0 {
            self.limbs.pop();
        }
    }

    fn ensure_limb(&mut self) {
        if self.limbs.is_empty() {
            self.limbs.push(0);
        }
    }
}

impl Default for TreeIndex {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for TreeIndex {
    fn from(value: u64) -> Self {
        let mut index = Self::new(value);
        index.trim();
        index
    }
}

impl AddAssign<u64> for TreeIndex {
    fn add_assign(&mut self, rhs: u64) {
        if rhs == 0 {
            return;
        }
        self.ensure_limb();
        let (sum, mut carry) = self.limbs[0].overflowing_add(rhs);
        self.limbs[0] = sum;
        let mut i = 1;
        while carry {
            if i == self.limbs.len() {
                self.limbs.push(1);
                break;
            }
            let (sum, c) = self.limbs[i].overflowing_add(1);
            self.limbs[i] = sum;
            carry = c;
            i += 1;
        }
    }
}

impl SubAssign<u64> for TreeIndex {
    fn sub_assign(&mut self, rhs: u64) {
        if rhs == 0 {
            return;
        }
        assert!(
            !self.is_zero() && (self.limbs.len() > 1 || self.limbs[0] >= rhs),
            "tree index subtraction underflow"
        );
        let (diff, mut borrow) = self.limbs[0].overflowing_sub(rhs);
        self.limbs[0] = diff;
        let mut i = 1;
        while borrow {
            let (diff, b) = self.limbs[i].overflowing_sub(1);
            self.limbs[i] = diff;
            borrow = b;
            i += 1;
        }
        self.trim();
    }
}

impl SubAssign<&TreeIndex> for TreeIndex {
    fn sub_assign(&mut self, rhs: &TreeIndex) {
        assert!(*self >= *rhs, "tree index subtraction underflow");
        let mut borrow = false;
        for i in 0..self.limbs.len() {
            let r = rhs.limbs.get(i).copied().unwrap_or(0);
            let (d, b1) = self.limbs[i].overflowing_sub(r);
            let (d, b2) = d.overflowing_sub(u64::from(borrow));
            self.limbs[i] = d;
            borrow = b1 || b2;
        }
        debug_assert!(!borrow);
        self.trim();
    }
}

impl Sub<&TreeIndex> for &TreeIndex {
    type Output = TreeIndex;

    fn sub(self, rhs: &TreeIndex) -> TreeIndex {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl ShlAssign<u32> for TreeIndex {
    /// Multiply by `2^bits`; `bits` must be below the limb width.
    fn shl_assign(&mut self, bits: u32) {
        debug_assert!(bits < 64);
        if bits == 0 || self.is_zero() {
            return;
        }
        let mut carry = 0u64;
        for limb in self.limbs.iter_mut() {
            let next = *limb >> (64 - bits);
            *limb = (*limb << bits) | carry;
            carry = next;
        }
        if carry != 0 {
            self.limbs.push(carry);
        }
    }
}

impl Shl<u32> for &TreeIndex {
    type Output = TreeIndex;

    fn shl(self, bits: u32) -> TreeIndex {
        let mut out = self.clone();
        out <<= bits;
        out
    }
}

impl ShrAssign<u32> for TreeIndex {
    /// Divide by `2^bits`, discarding the remainder; `bits` must be below the
    /// limb width.
    fn shr_assign(&mut self, bits: u32) {
        debug_assert!(bits < 64);
        if bits == 0 || self.limbs.is_empty() {
            return;
        }
        let len = self.limbs.len();
        for i in 0..len {
            let mut limb = self.limbs[i] >> bits;
            if i + 1 < len {
                limb |= self.limbs[i + 1] << (64 - bits);
            }
            self.limbs[i] = limb;
        }
        self.trim();
    }
}

impl Ord for TreeIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.limbs.len().cmp(&other.limbs.len()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        for i in (0..self.limbs.len()).rev() {
            match self.limbs[i].cmp(&other.limbs[i]) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for TreeIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<u64> for TreeIndex {
    fn eq(&self, other: &u64) -> bool {
        match self.limbs.len() {
            0 => *other == 0,
            1 => self.limbs[0] == *other,
            _ => false,
        }
    }
}

impl fmt::Display for TreeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        // Largest power of ten below 2^64; peel 19 decimal digits at a time.
        const GROUP: u64 = 10_000_000_000_000_000_000;
        let mut groups = Vec::new();
        let mut cur = self.clone();
        while !cur.is_zero() {
            let (q, r) = cur.div_rem(GROUP);
            groups.push(r);
            cur = q;
        }
        write!(f, "{}", groups.pop().unwrap())?;
        while let Some(group) = groups.pop() {
            write!(f, "{:019}", group)?;
        }
        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carries_across_limbs() {
        let mut i = TreeIndex::from(u64::MAX);
        i += 1;
        assert_eq!(i.to_string(), "18446744073709551616");
        i -= 1u64;
        assert_eq!(i, u64::MAX);
    }

    #[test]
    fn shift_left_grows_a_limb() {
        let mut i = TreeIndex::from(1);
        for _ in 0..22 {
            i <<= 3;
        }
        // 8^22 node counts are exactly why the index is arbitrary precision.
        assert_eq!(i.to_string(), "73786976294838206464");
        for _ in 0..22 {
            i >>= 3;
        }
        assert_eq!(i, 1);
    }

    #[test]
    fn child_and_parent_steps_invert() {
        // child = (i << d) + 1 + dir; parent of the last sibling is
        // (child >> d) - 1.
        let mut i = TreeIndex::from(5);
        i <<= 3;
        i.incr();
        i += 7;
        assert_eq!(i, 5 * 8 + 8);
        i >>= 3;
        i.decr();
        assert_eq!(i, 5);
    }

    #[test]
    fn div_rem_round_trips() {
        let mut i = TreeIndex::from(3);
        i <<= 40;
        i += 123_456;
        let (q, r) = i.div_rem(1_000_000);
        assert_eq!(r, (3u64 * (1 << 40) + 123_456) % 1_000_000);
        assert_eq!(q, (3u64 * (1 << 40) + 123_456) / 1_000_000);
    }

    #[test]
    fn div_rem_multi_limb() {
        let mut i = TreeIndex::from(1);
        i <<= 63;
        i <<= 63;
        i <<= 2; // 2^128
        let (q, r) = i.div_rem(2);
        assert_eq!(r, 0);
        assert_eq!(q.to_string(), "170141183460469231731687303715884105728");
    }

    #[test]
    fn ordering_spans_limb_counts() {
        let small = TreeIndex::from(u64::MAX);
        let mut big = small.clone();
        big.incr();
        assert!(small < big);
        assert!(big > small);
        assert_eq!(big.cmp(&big.clone()), Ordering::Equal);
    }

    #[test]
    fn subtraction_borrows() {
        let mut big = TreeIndex::from(u64::MAX);
        big.incr(); // 2^64
        let diff = &big - &TreeIndex::from(1);
        assert_eq!(diff, u64::MAX);
        assert_eq!(diff.simple(), u64::MAX);
    }

    #[test]
    fn zero_displays() {
        assert_eq!(TreeIndex::zero().to_string(), "0");
        assert!(TreeIndex::zero().is_zero());
    }
}
