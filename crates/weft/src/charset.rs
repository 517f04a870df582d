//! Character set with O(1) membership for Latin-1 characters.

/// A set of characters.
///
/// Characters below U+0100 live in a bitmap; anything above goes into a
/// small sorted overflow list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharSet {
    bits: [u64; 4],
    rest: Vec<char>,
}

impl CharSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from the characters of `chars`.
    pub fn new(chars: &str) -> Self {
        let mut set = Self::empty();
        for c in chars.chars() {
            set.insert(c);
        }
        set
    }

    pub fn insert(&mut self, c: char) {
        let code = c as u32;
        if code < 256 {
            self.bits[(code / 64) as usize] |= 1 << (code % 64);
        } else if let Err(at) = self.rest.binary_search(&c) {
            self.rest.insert(at, c);
        }
    }

    pub fn contains(&self, c: char) -> bool {
        let code = c as u32;
        if code < 256 {
            self.bits[(code / 64) as usize] & (1 << (code % 64)) != 0
        } else {
            self.rest.binary_search(&c).is_ok()
        }
    }

    /// The union of two sets.
    pub fn union(&self, other: &CharSet) -> CharSet {
        let mut out = self.clone();
        for i in 0..4 {
            out.bits[i] |= other.bits[i];
        }
        for &c in &other.rest {
            out.insert(c);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0) && self.rest.is_empty()
    }
}
