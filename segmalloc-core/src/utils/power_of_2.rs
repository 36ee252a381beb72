//! An integer guaranteed to be a PowerOf2.

use core::{num, ops};

/// PowerOf2
///
/// An integral guaranteed to be non-zero and a power of 2.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PowerOf2(num::NonZeroUsize);

impl PowerOf2 {
    /// Creates a new instance of PowerOf2.
    ///
    /// Or nothing if the value is not a power of 2.
    pub fn new(value: usize) -> Option<PowerOf2> {
        if value.count_ones() == 1 {
            //  Safety:
            //  -   Value is a power of 2, as per the if check.
            Some(unsafe { PowerOf2::new_unchecked(value) })
        } else {
            None
        }
    }

    /// Creates a new instance of PowerOf2.
    ///
    /// #   Safety
    ///
    /// Assumes that the value is a power of 2.
    pub const unsafe fn new_unchecked(value: usize) -> PowerOf2 {
        //  Safety:
        //  -   A power of 2 cannot be 0.
        PowerOf2(num::NonZeroUsize::new_unchecked(value))
    }

    /// Returns the inner value.
    pub const fn value(&self) -> usize { self.0.get() }

    /// Rounds the value up to the nearest higher multiple of `self`.
    pub const fn round_up(&self, n: usize) -> usize {
        let mask = self.mask();

        (n + mask) & !mask
    }

    /// Rounds the value up to the nearest higher multiple of `self`, or None if this overflows.
    pub fn checked_round_up(&self, n: usize) -> Option<usize> {
        let mask = self.mask();

        n.checked_add(mask).map(|n| n & !mask)
    }

    const fn mask(&self) -> usize { self.value() - 1 }
}

impl ops::Rem<PowerOf2> for usize {
    type Output = usize;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn rem(self, rhs: PowerOf2) -> usize { self & rhs.mask() }
}
