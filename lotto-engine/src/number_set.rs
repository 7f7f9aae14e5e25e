use crate::{LotteryError, Result};
use lotto_core::config::{MAX_NUMBER, MIN_NUMBER};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Subset of `1..=90` stored as a bit field: bit `n - 1` is set when `n` is a member.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NumberSet(u128);

impl NumberSet {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Builds a set from a slice, rejecting out-of-range values and repeats.
    pub fn from_numbers(numbers: &[u8]) -> Result<Self> {
        let mut set = Self::new();
        for &n in numbers {
            set.add(n)?;
        }
        Ok(set)
    }

    fn bit(n: u8) -> Result<u128> {
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&n) {
            return Err(LotteryError::InvalidNumber(n));
        }
        Ok(1u128 << (n - 1))
    }

    pub fn add(&mut self, n: u8) -> Result<()> {
        let bit = Self::bit(n)?;
        if self.0 & bit != 0 {
            return Err(LotteryError::DuplicateNumber(n));
        }
        self.0 |= bit;
        Ok(())
    }

    pub fn contains(&self, n: u8) -> bool {
        Self::bit(n).map_or(false, |bit| self.0 & bit != 0)
    }

    pub fn size(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersection_count(&self, other: &NumberSet) -> usize {
        (self.0 & other.0).count_ones() as usize
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let low = bits.trailing_zeros();
            bits &= bits - 1;
            Some(low as u8 + 1)
        })
    }

    pub fn to_sorted_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl fmt::Debug for NumberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for NumberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers: Vec<String> = self.iter().map(|n| n.to_string()).collect();
        write!(f, "[{}]", numbers.join(", "))
    }
}

impl Serialize for NumberSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_sorted_vec().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NumberSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let numbers = Vec::<u8>::deserialize(deserializer)?;
        NumberSet::from_numbers(&numbers).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_contains() {
        let mut set = NumberSet::new();
        set.add(1).unwrap();
        set.add(90).unwrap();
        set.add(45).unwrap();

        assert!(set.contains(1));
        assert!(set.contains(45));
        assert!(set.contains(90));
        assert!(!set.contains(2));
        assert!(!set.contains(0));
        assert!(!set.contains(91));
        assert_eq!(set.size(), 3);
        assert_eq!(set.to_sorted_vec(), vec![1, 45, 90]);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut set = NumberSet::new();
        assert!(matches!(set.add(0), Err(LotteryError::InvalidNumber(0))));
        assert!(matches!(set.add(91), Err(LotteryError::InvalidNumber(91))));
        assert!(set.is_empty());
    }

    #[test]
    fn test_rejects_duplicate() {
        let mut set = NumberSet::new();
        set.add(7).unwrap();
        assert!(matches!(set.add(7), Err(LotteryError::DuplicateNumber(7))));
        assert_eq!(set.size(), 1);

        assert!(matches!(
            NumberSet::from_numbers(&[1, 2, 3, 3, 4, 5]),
            Err(LotteryError::DuplicateNumber(3))
        ));
    }

    #[test]
    fn test_intersection_count() {
        let a = NumberSet::from_numbers(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let b = NumberSet::from_numbers(&[7, 8, 9, 10, 11, 12, 13]).unwrap();
        let c = NumberSet::from_numbers(&[80, 81, 82, 83, 84, 90]).unwrap();

        assert_eq!(a.intersection_count(&b), 2);
        assert_eq!(b.intersection_count(&a), 2);
        assert_eq!(a.intersection_count(&c), 0);
        assert_eq!(c.intersection_count(&c), 6);
    }

    #[test]
    fn test_sorted_regardless_of_insert_order() {
        let set = NumberSet::from_numbers(&[13, 7, 90, 1, 64]).unwrap();
        assert_eq!(set.to_sorted_vec(), vec![1, 7, 13, 64, 90]);
        assert_eq!(set.to_string(), "[1, 7, 13, 64, 90]");
    }

    #[test]
    fn test_serde_as_sorted_list() {
        let set = NumberSet::from_numbers(&[6, 5, 4, 3, 2, 1]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[1,2,3,4,5,6]");
        assert_eq!(serde_json::from_str::<NumberSet>(&json).unwrap(), set);
        assert!(serde_json::from_str::<NumberSet>("[1,1]").is_err());
    }
}
