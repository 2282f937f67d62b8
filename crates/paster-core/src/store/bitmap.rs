//! Fragment presence bitmap: one bit per index (LSB of byte 0 = fragment 0).

#[derive(Debug, Clone, Default)]
pub struct FragmentBitmap {
    bytes: Vec<u8>,
    len: usize,
}

impl FragmentBitmap {
    /// Empty bitmap covering indices `[0, len)`.
    pub fn new(len: usize) -> Self {
        FragmentBitmap {
            bytes: vec![0u8; len.div_ceil(8)],
            len,
        }
    }

    /// Mark `index`. Returns false if it was already set or is out of range.
    pub fn set(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (byte_idx, mask) = (index / 8, 1u8 << (index % 8));
        let was_set = self.bytes[byte_idx] & mask != 0;
        self.bytes[byte_idx] |= mask;
        !was_set
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map(|&b| b & (1 << (index % 8)) != 0)
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Indices in `[0, len)` not yet set, ascending.
    pub fn unset(&self) -> Vec<usize> {
        (0..self.len).filter(|&i| !self.is_set(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_first_time_only() {
        let mut b = FragmentBitmap::new(10);
        assert!(b.set(3));
        assert!(!b.set(3));
        assert!(b.set(9));
        assert!(b.is_set(3));
        assert!(!b.is_set(4));
        assert_eq!(b.count(), 2);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut b = FragmentBitmap::new(5);
        assert!(!b.set(5));
        assert!(!b.set(100));
        assert!(!b.is_set(100));
        assert_eq!(b.count(), 0);
    }

    #[test]
    fn unset_lists_missing_indices() {
        let mut b = FragmentBitmap::new(12);
        for i in [0, 1, 2, 5, 8, 11] {
            b.set(i);
        }
        assert_eq!(b.unset(), vec![3, 4, 6, 7, 9, 10]);
        for i in b.unset() {
            b.set(i);
        }
        assert!(b.unset().is_empty());
        assert_eq!(b.count(), 12);
    }
}
