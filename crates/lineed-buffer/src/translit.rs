//! Single-slot byte transliteration.

/// A 256-entry byte map with at most one non-identity entry.
#[derive(Debug, Clone)]
pub struct Transliterator {
    table: [u8; 256],
    /// The slot changed by the most recent call
    active: u8,
}

impl Transliterator {
    /// Creates the identity map.
    pub fn new() -> Self {
        Self {
            table: std::array::from_fn(|i| i as u8),
            active: 0,
        }
    }

    /// Maps every `from` byte in `text` to `to`, in place.
    ///
    /// Installing a new pair first restores the previously changed slot, so
    /// only the latest pair is ever in effect. Text transformed by an earlier
    /// call is left as it is.
    pub fn apply<'a>(&mut self, text: &'a mut [u8], from: u8, to: u8) -> &'a mut [u8] {
        self.table[usize::from(self.active)] = self.active;
        self.active = from;
        self.table[usize::from(from)] = to;

        for byte in text.iter_mut() {
            *byte = self.table[usize::from(*byte)];
        }
        text
    }

    /// Image of `byte` under the current map.
    #[inline]
    pub fn map(&self, byte: u8) -> u8 {
        self.table[usize::from(byte)]
    }
}

impl Default for Transliterator {
    fn default() -> Self {
        Self::new()
    }
}
