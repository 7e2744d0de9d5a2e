//! Fixed-size value codecs
//!
//! Every codec has a statically known byte length and packs its value
//! explicitly in little-endian order, so the bytes are the same on every
//! platform. Codecs never touch the heap: callers encode into a scratch
//! buffer and write that buffer into a segment, or the reverse.
//!
//! ```text
//! value ──encode──→ [u8; SIZE] ──write──→ Segment
//! Segment ──read──→ [u8; SIZE] ──decode──→ value
//! ```

mod primitive;

use crate::error::{Error, Result};
use crate::storage::heap::{Segment, SegmentAllocator};
use bytes::{Buf, BufMut};

/// A value with a fixed-length binary representation
pub trait FixedCodec: Sized {
    /// Encoded length in bytes
    const SIZE: usize;

    /// Pack the value into `dst`, writing exactly `SIZE` bytes
    fn write_to<B: BufMut>(&self, dst: &mut B);

    /// Unpack a value from `src`, consuming exactly `SIZE` bytes
    fn read_from<B: Buf>(src: &mut B) -> Result<Self>;

    /// Encode into `buffer` starting at `offset`
    fn encode(&self, buffer: &mut [u8], offset: usize) -> Result<()> {
        check_bounds(buffer.len(), offset, Self::SIZE)?;
        let mut dst = &mut buffer[offset..offset + Self::SIZE];
        self.write_to(&mut dst);
        Ok(())
    }

    /// Decode from `buffer` starting at `offset`
    fn decode(buffer: &[u8], offset: usize) -> Result<Self> {
        check_bounds(buffer.len(), offset, Self::SIZE)?;
        let mut src = &buffer[offset..offset + Self::SIZE];
        Self::read_from(&mut src)
    }

    /// Encode into a fresh buffer
    fn to_vec(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut buffer);
        buffer
    }
}

fn check_bounds(len: usize, offset: usize, size: usize) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::InvalidArgument(format!(
            "{} bytes at offset {} exceed buffer length {}",
            size, offset, len
        ))),
    }
}

/// Allocate a segment sized for `value` and store it there
pub fn store_value<T: FixedCodec>(heap: &SegmentAllocator, value: &T) -> Result<Segment> {
    let segment = heap.allocate(T::SIZE as u64)?;
    if let Err(e) = heap.write_all(segment, &value.to_vec()) {
        heap.free(segment).ok();
        return Err(e);
    }
    Ok(segment)
}

/// Load a value previously stored with [`store_value`]
pub fn load_value<T: FixedCodec>(heap: &SegmentAllocator, segment: Segment) -> Result<T> {
    let bytes = heap.read_to_vec(segment, T::SIZE)?;
    T::decode(&bytes, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_encode_at_offset() -> Result<()> {
        let mut buffer = [0u8; 12];
        0x0102_0304_0506_0708u64.encode(&mut buffer, 2)?;

        assert_eq!(&buffer[2..10], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(u64::decode(&buffer, 2)?, 0x0102_0304_0506_0708);
        Ok(())
    }

    #[test]
    fn test_bounds_checked() {
        let mut buffer = [0u8; 7];
        assert!(matches!(1u64.encode(&mut buffer, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(i32::decode(&buffer, 4), Err(Error::InvalidArgument(_))));
        assert!(matches!(u8::decode(&buffer, usize::MAX), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_store_and_load_values() -> Result<()> {
        let temp_dir = std::env::temp_dir().join(format!("codec_store_{}", std::process::id()));
        std::fs::remove_dir_all(&temp_dir).ok();
        let heap = SegmentAllocator::new(&temp_dir, 1 << 16)?;

        let id = Uuid::new_v4();
        let id_segment = store_value(&heap, &id)?;
        let ratio_segment = store_value(&heap, &-0.25f64)?;
        let flag_segment = store_value(&heap, &true)?;

        assert_eq!(id_segment.size, 16);
        assert_eq!(load_value::<Uuid>(&heap, id_segment)?, id);
        assert_eq!(load_value::<f64>(&heap, ratio_segment)?, -0.25);
        assert!(load_value::<bool>(&heap, flag_segment)?);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }
}
