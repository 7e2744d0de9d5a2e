//! Codecs for primitive values, UUIDs and segment handles

use super::FixedCodec;
use crate::error::{Error, Result};
use crate::storage::heap::Segment;
use bytes::{Buf, BufMut};
use uuid::Uuid;

macro_rules! impl_fixed_codec {
    ($($ty:ty => $size:expr, $put:ident, $get:ident;)*) => {
        $(
            impl FixedCodec for $ty {
                const SIZE: usize = $size;

                #[inline]
                fn write_to<B: BufMut>(&self, dst: &mut B) {
                    dst.$put(*self);
                }

                #[inline]
                fn read_from<B: Buf>(src: &mut B) -> Result<Self> {
                    Ok(src.$get())
                }
            }
        )*
    };
}

impl_fixed_codec! {
    u8 => 1, put_u8, get_u8;
    i8 => 1, put_i8, get_i8;
    u32 => 4, put_u32_le, get_u32_le;
    i32 => 4, put_i32_le, get_i32_le;
    u64 => 8, put_u64_le, get_u64_le;
    i64 => 8, put_i64_le, get_i64_le;
    f64 => 8, put_f64_le, get_f64_le;
}

impl FixedCodec for bool {
    const SIZE: usize = 1;

    fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(u8::from(*self));
    }

    fn read_from<B: Buf>(src: &mut B) -> Result<Self> {
        match src.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Codec(format!("Invalid boolean byte: {:#04x}", other))),
        }
    }
}

/// RFC 4122 byte order, independent of platform layout
impl FixedCodec for Uuid {
    const SIZE: usize = 16;

    fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(self.as_bytes());
    }

    fn read_from<B: Buf>(src: &mut B) -> Result<Self> {
        let mut bytes = [0u8; 16];
        src.copy_to_slice(&mut bytes);
        Ok(Uuid::from_bytes(bytes))
    }
}

/// Wire form of a heap handle: pointer then size
impl FixedCodec for Segment {
    const SIZE: usize = Segment::ENCODED_LEN;

    fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u64_le(self.pointer);
        dst.put_u64_le(self.size);
    }

    fn read_from<B: Buf>(src: &mut B) -> Result<Self> {
        let pointer = src.get_u64_le();
        let size = src.get_u64_le();
        Ok(Segment::new(pointer, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_byte() -> Result<()> {
        let mut buffer = [0u8; 1];
        (-1i8).encode(&mut buffer, 0)?;
        assert_eq!(buffer, [0xFF]);
        assert_eq!(i8::decode(&buffer, 0)?, -1);
        Ok(())
    }

    #[test]
    fn test_double_layout() -> Result<()> {
        let bytes = 1.5f64.to_vec();
        assert_eq!(bytes, 1.5f64.to_bits().to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_boolean_rejects_garbage() {
        assert!(!bool::decode(&[0], 0).unwrap());
        assert!(bool::decode(&[1], 0).unwrap());
        assert!(matches!(bool::decode(&[2], 0), Err(Error::Codec(_))));
    }

    #[test]
    fn test_uuid_byte_order() -> Result<()> {
        let id = Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let bytes = id.to_vec();

        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[15], 0xff);
        assert_eq!(Uuid::decode(&bytes, 0)?, id);
        Ok(())
    }

    #[test]
    fn test_segment_handle_is_sixteen_bytes() -> Result<()> {
        let segment = Segment::new(4096, 5000);
        let mut buffer = [0u8; 20];
        segment.encode(&mut buffer, 4)?;

        assert_eq!(&buffer[4..12], &4096u64.to_le_bytes());
        assert_eq!(&buffer[12..20], &5000u64.to_le_bytes());
        assert_eq!(Segment::decode(&buffer, 4)?, segment);
        Ok(())
    }
}
