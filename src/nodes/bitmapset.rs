//! Sets of small non-negative integers.
//!
//! Used for relation index sets and executor parameter sets. The set is
//! stored as a vector of 64-bit words; trailing zero words are trimmed after
//! every mutation so the empty set is always represented by an empty vector.

use std::fmt;

use serde::{Deserialize, Serialize};

const BITS_PER_WORD: usize = 64;

/// An ordered set of non-negative integers.
#[derive(Clone, Default, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct Bitmapset {
    words: Vec<u64>,
}

impl Bitmapset {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding only `x`.
    pub fn singleton(x: u32) -> Self {
        let mut set = Self::new();
        set.add_member(x);
        set
    }

    fn split(x: u32) -> (usize, u64) {
        let x = x as usize;
        (x / BITS_PER_WORD, 1u64 << (x % BITS_PER_WORD))
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Adds `x`; returns true if it was not already present.
    pub fn add_member(&mut self, x: u32) -> bool {
        let (word, bit) = Self::split(x);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Removes `x`; returns true if it was present.
    pub fn del_member(&mut self, x: u32) -> bool {
        let (word, bit) = Self::split(x);
        let Some(slot) = self.words.get_mut(word) else {
            return false;
        };
        let present = *slot & bit != 0;
        *slot &= !bit;
        self.trim();
        present
    }

    /// Membership test.
    pub fn is_member(&self, x: u32) -> bool {
        let (word, bit) = Self::split(x);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// True when the set has no members.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of members.
    pub fn num_members(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The sole member, if the set has exactly one.
    pub fn singleton_member(&self) -> Option<u32> {
        let mut members = self.iter();
        let first = members.next()?;
        members.next().is_none().then_some(first)
    }

    /// Smallest member strictly greater than `prev` (`None` starts from the beginning).
    pub fn next_member(&self, prev: Option<u32>) -> Option<u32> {
        let start = prev.map_or(0, |p| p as usize + 1);
        let mut word = start / BITS_PER_WORD;
        if word >= self.words.len() {
            return None;
        }
        let mut bits = self.words[word] & (!0u64 << (start % BITS_PER_WORD));
        loop {
            if bits != 0 {
                return Some((word * BITS_PER_WORD + bits.trailing_zeros() as usize) as u32);
            }
            word += 1;
            bits = *self.words.get(word)?;
        }
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let mut prev = None;
        std::iter::from_fn(move || {
            let next = self.next_member(prev)?;
            prev = Some(next);
            Some(next)
        })
    }

    /// Set union.
    pub fn union(&self, other: &Bitmapset) -> Bitmapset {
        let (long, short) = if self.words.len() >= other.words.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut words = long.words.clone();
        for (w, o) in words.iter_mut().zip(&short.words) {
            *w |= o;
        }
        Bitmapset { words }
    }

    /// Set intersection.
    pub fn intersect(&self, other: &Bitmapset) -> Bitmapset {
        let mut set = Bitmapset {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        };
        set.trim();
        set
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &Bitmapset) -> Bitmapset {
        let mut words = self.words.clone();
        for (w, o) in words.iter_mut().zip(&other.words) {
            *w &= !o;
        }
        let mut set = Bitmapset { words };
        set.trim();
        set
    }

    /// True when every member of `self` is in `other`.
    pub fn is_subset(&self, other: &Bitmapset) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0) == 0)
    }

    /// True when the sets share at least one member.
    pub fn overlap(&self, other: &Bitmapset) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }
}

impl PartialEq for Bitmapset {
    fn eq(&self, other: &Self) -> bool {
        // both sides are trimmed, but a deserialized or hand-built value may not be
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl FromIterator<u32> for Bitmapset {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Bitmapset::new();
        for x in iter {
            set.add_member(x);
        }
        set
    }
}

impl From<Vec<u32>> for Bitmapset {
    fn from(members: Vec<u32>) -> Self {
        members.into_iter().collect()
    }
}

impl From<Bitmapset> for Vec<u32> {
    fn from(set: Bitmapset) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for Bitmapset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(b")?;
        for x in self.iter() {
            write!(f, " {x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_and_iterate() {
        let mut set = Bitmapset::new();
        assert!(set.add_member(3));
        assert!(set.add_member(130));
        assert!(!set.add_member(3));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 130]);
        assert_eq!(set.num_members(), 2);
        assert!(set.del_member(130));
        assert_eq!(set.singleton_member(), Some(3));
        assert!(set.del_member(3));
        assert!(set.is_empty());
    }

    #[test]
    fn equality_ignores_trailing_words() {
        let padded = Bitmapset {
            words: vec![0b10, 0, 0],
        };
        assert_eq!(padded, Bitmapset::singleton(1));
    }

    #[test]
    fn set_algebra() {
        let a: Bitmapset = [1, 2, 70].into_iter().collect();
        let b: Bitmapset = [2, 3].into_iter().collect();
        assert_eq!(a.union(&b).iter().collect::<Vec<_>>(), vec![1, 2, 3, 70]);
        assert_eq!(a.intersect(&b).iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), vec![1, 70]);
        assert!(a.intersect(&b).is_subset(&a));
        assert!(a.overlap(&b));
        assert!(!Bitmapset::singleton(9).overlap(&b));
        assert_eq!(a.next_member(Some(2)), Some(70));
        assert_eq!(a.next_member(Some(70)), None);
    }

    #[test]
    fn debug_matches_out_format() {
        let set: Bitmapset = [1, 4].into_iter().collect();
        assert_eq!(format!("{set:?}"), "(b 1 4)");
    }
}
