use crate::error::BitmapError;

/// Returns the number of bytes needed to hold `bits` bits.
pub fn bytes_for(bits: usize) -> usize {
    bits / 8 + (bits % 8 != 0) as usize
}

/// Read-only bit queries shared by owning bitmaps and views.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`, least significant bit
/// first. Bits past `bit_len` in the final byte are padding and are never
/// reported as set or free.
pub trait BitArray {
    /// The number of addressable bits.
    fn bit_len(&self) -> usize;
    /// The serialized bytes, exactly `bytes_for(bit_len)` long.
    fn as_bytes(&self) -> &[u8];

    /// Returns whether bit `index` is set. Indices out of range read as unset.
    fn test(&self, index: usize) -> bool {
        if index >= self.bit_len() {
            return false;
        }
        self.as_bytes()[index / 8] & (1 << (index % 8)) != 0
    }

    /// Finds the first zero bit, scanning upward from bit 0.
    ///
    /// This is a linear scan and therefore O(bits) per call. Full bytes are
    /// skipped whole, but the lowest free index always wins so allocation order
    /// stays deterministic.
    fn ffz(&self) -> Option<usize> {
        let len = self.bit_len();
        for (i, &byte) in self.as_bytes().iter().enumerate() {
            if byte == 0xff {
                continue;
            }
            let index = i * 8 + (!byte).trailing_zeros() as usize;
            // A clear padding bit means every real bit before it is set.
            return if index < len { Some(index) } else { None };
        }
        None
    }

    /// Counts set bits, ignoring padding.
    fn total_set(&self) -> usize {
        let len = self.bit_len();
        let bytes = self.as_bytes();
        let whole = len / 8;
        let mut count: usize = bytes[..whole]
            .iter()
            .map(|byte| byte.count_ones() as usize)
            .sum();
        let tail = len % 8;
        if tail != 0 {
            let mask = (1_u8 << tail) - 1;
            count += (bytes[whole] & mask).count_ones() as usize;
        }
        count
    }

    /// Iterates over the indices of set bits in ascending order.
    fn iter_set(&self) -> SetBits<&Self>
    where
        Self: Sized,
    {
        SetBits {
            marker: 0,
            bitmap: self,
        }
    }
}

/// Bit mutations. Out of range indices are rejected without touching any byte.
pub trait BitArrayMut: BitArray {
    fn as_bytes_mut(&mut self) -> &mut [u8];

    fn set(&mut self, index: usize) -> Result<(), BitmapError> {
        check_index(index, self.bit_len())?;
        self.as_bytes_mut()[index / 8] |= 1 << (index % 8);
        Ok(())
    }

    fn reset(&mut self, index: usize) -> Result<(), BitmapError> {
        check_index(index, self.bit_len())?;
        self.as_bytes_mut()[index / 8] &= !(1 << (index % 8));
        Ok(())
    }
}

impl<T: BitArray + ?Sized> BitArray for &T {
    fn bit_len(&self) -> usize {
        (**self).bit_len()
    }

    fn as_bytes(&self) -> &[u8] {
        (**self).as_bytes()
    }
}

fn check_index(index: usize, len: usize) -> Result<(), BitmapError> {
    if index >= len {
        return Err(BitmapError::OutOfRange { index, len });
    }
    Ok(())
}

/// A bitmap that owns its backing bytes. Stores only build one of these when
/// laying out a fresh block 0; every later operation goes through a
/// [`BitmapView`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    bits: usize,
    bytes: Vec<u8>,
}

impl Bitmap {
    /// Allocates a zeroed bitmap of `bits` bits, rounded up to whole bytes.
    pub fn new(bits: usize) -> Result<Self, BitmapError> {
        if bits == 0 {
            return Err(BitmapError::Empty);
        }
        let len = bytes_for(bits);
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| BitmapError::OutOfMemory(len))?;
        bytes.resize(len, 0);
        Ok(Self { bits, bytes })
    }

    /// Borrows this bitmap as a mutable view.
    pub fn view(&mut self) -> BitmapView<&mut [u8]> {
        BitmapView {
            bits: self.bits,
            bytes: &mut self.bytes[..],
        }
    }
}

impl BitArray for Bitmap {
    fn bit_len(&self) -> usize {
        self.bits
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl BitArrayMut for Bitmap {
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// A bitmap laid over bytes it does not own.
///
/// `B` is a borrow such as `&[u8]` or `&mut [u8]`. Mutations through a
/// `BitmapView<&mut [u8]>` land directly in the wrapped bytes, which is how a
/// block store commits allocation changes into its metadata block. The view
/// never frees anything and cannot outlive the borrow it was built from.
#[derive(Debug)]
pub struct BitmapView<B> {
    bits: usize,
    bytes: B,
}

impl<B: AsRef<[u8]>> BitmapView<B> {
    /// Wraps the first `bytes_for(bits)` bytes of `bytes`.
    pub fn new(bytes: B, bits: usize) -> Result<Self, BitmapError> {
        if bits == 0 {
            return Err(BitmapError::Empty);
        }
        let need = bytes_for(bits);
        let len = bytes.as_ref().len();
        if len < need {
            return Err(BitmapError::ShortBuffer { len, need });
        }
        Ok(Self { bits, bytes })
    }

    /// Builds a view over bytes the caller has already sized.
    pub(crate) fn over(bytes: B, bits: usize) -> Self {
        debug_assert!(bits > 0 && bytes.as_ref().len() >= bytes_for(bits));
        Self { bits, bytes }
    }
}

impl<B: AsRef<[u8]>> BitArray for BitmapView<B> {
    fn bit_len(&self) -> usize {
        self.bits
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes.as_ref()[..bytes_for(self.bits)]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BitArrayMut for BitmapView<B> {
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        let need = bytes_for(self.bits);
        &mut self.bytes.as_mut()[..need]
    }
}

impl<B: AsRef<[u8]>> IntoIterator for BitmapView<B> {
    type Item = usize;
    type IntoIter = SetBits<Self>;

    fn into_iter(self) -> Self::IntoIter {
        SetBits {
            marker: 0,
            bitmap: self,
        }
    }
}

/// Walks the set bits of a bitmap from the lowest index upward.
pub struct SetBits<B> {
    /// Next index to inspect.
    marker: usize,
    bitmap: B,
}

impl<B: BitArray> Iterator for SetBits<B> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.marker < self.bitmap.bit_len() {
            let index = self.marker;
            self.marker += 1;
            if self.bitmap.test(index) {
                return Some(index);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut bmp = Bitmap::new(255).unwrap();

        bmp.set(2).unwrap();

        assert!(!bmp.test(0));
        assert!(bmp.test(2));
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new(255).unwrap();

        bmp.set(0).unwrap();
        bmp.set(254).unwrap();

        assert!(bmp.test(0));
        assert!(bmp.test(254));
        assert_eq!(bmp.as_bytes()[0], 0b0000_0001);
        assert_eq!(bmp.as_bytes()[31], 0b0100_0000);
    }

    #[test]
    fn can_toggle_bit_between_set_and_clear() {
        let mut bmp = Bitmap::new(16).unwrap();

        bmp.set(10).unwrap();
        assert!(bmp.test(10));

        bmp.reset(10).unwrap();
        assert!(!bmp.test(10));
    }

    #[test]
    fn reset_leaves_neighbouring_bits_alone() {
        let mut bmp = Bitmap::new(16).unwrap();
        bmp.set(9).unwrap();
        bmp.set(10).unwrap();
        bmp.set(11).unwrap();

        bmp.reset(10).unwrap();

        assert!(bmp.test(9));
        assert!(bmp.test(11));
        assert_eq!(bmp.total_set(), 2);
    }

    #[test]
    fn zero_length_bitmaps_are_rejected() {
        assert_eq!(Bitmap::new(0).unwrap_err(), BitmapError::Empty);
        let mut bytes = [0_u8; 4];
        assert_eq!(
            BitmapView::new(&mut bytes, 0).unwrap_err(),
            BitmapError::Empty
        );
    }

    #[test]
    fn byte_count_rounds_up_without_overflow() {
        assert_eq!(bytes_for(0), 0);
        assert_eq!(bytes_for(1), 1);
        assert_eq!(bytes_for(8), 1);
        assert_eq!(bytes_for(255), 32);
        assert_eq!(bytes_for(usize::MAX), usize::MAX / 8 + 1);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn huge_bitmap_fails_instead_of_aborting() {
        assert_eq!(
            Bitmap::new(usize::MAX).unwrap_err(),
            BitmapError::OutOfMemory(usize::MAX / 8 + 1)
        );
    }

    #[test]
    fn out_of_range_bits_fail_closed() {
        let mut bmp = Bitmap::new(10).unwrap();

        assert!(!bmp.test(10));
        assert_eq!(
            bmp.set(10).unwrap_err(),
            BitmapError::OutOfRange { index: 10, len: 10 }
        );
        assert_eq!(
            bmp.reset(64).unwrap_err(),
            BitmapError::OutOfRange { index: 64, len: 10 }
        );
        assert_eq!(bmp.as_bytes(), &[0, 0]);
    }

    #[test]
    fn ffz_returns_lowest_clear_bit() {
        let mut bmp = Bitmap::new(20).unwrap();
        assert_eq!(bmp.ffz(), Some(0));

        for i in 0..9 {
            bmp.set(i).unwrap();
        }
        assert_eq!(bmp.ffz(), Some(9));

        bmp.reset(3).unwrap();
        assert_eq!(bmp.ffz(), Some(3));
    }

    #[test]
    fn ffz_ignores_padding_when_full() {
        let mut bmp = Bitmap::new(11).unwrap();
        for i in 0..11 {
            bmp.set(i).unwrap();
        }

        assert_eq!(bmp.ffz(), None);
        assert_eq!(bmp.total_set(), 11);
    }

    #[test]
    fn total_set_masks_padding_bits() {
        let mut bytes = [0xff_u8, 0xff];
        let view = BitmapView::new(&mut bytes, 12).unwrap();

        assert_eq!(view.total_set(), 12);
        assert_eq!(view.ffz(), None);
    }

    #[test]
    fn view_writes_through_to_wrapped_bytes() {
        let mut block = [0_u8; 16];
        {
            let mut view = BitmapView::new(&mut block, 24).unwrap();
            view.set(0).unwrap();
            view.set(17).unwrap();
            assert_eq!(view.as_bytes().len(), 3);
        }

        assert_eq!(&block[..4], &[0b0000_0001, 0, 0b0000_0010, 0]);
    }

    #[test]
    fn view_rejects_buffers_too_small() {
        let mut bytes = [0_u8; 2];
        assert_eq!(
            BitmapView::new(&mut bytes, 17).unwrap_err(),
            BitmapError::ShortBuffer { len: 2, need: 3 }
        );
    }

    #[test]
    fn owning_bitmap_can_be_viewed() {
        let mut bmp = Bitmap::new(8).unwrap();
        bmp.view().set(5).unwrap();

        assert!(bmp.test(5));
        assert_eq!(bmp.as_bytes(), &[0b0010_0000]);
    }

    #[test]
    fn iterates_set_bits_in_order() {
        let mut bmp = Bitmap::new(40).unwrap();
        for &i in &[33, 1, 8, 39] {
            bmp.set(i).unwrap();
        }

        let set: Vec<usize> = bmp.iter_set().collect();
        assert_eq!(set, vec![1, 8, 33, 39]);
    }
}
