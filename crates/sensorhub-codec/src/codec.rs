//! Tag-selected value encoding.
//!
//! A *tag* chooses how a value type is laid out in a [`Buffer`]. Every
//! supported type has a natural encoding under [`DefaultTag<T>`]; other tags
//! ([`Aligned`], [`FixedLength`]) encode the same types differently when a
//! message layout asks for it.
//!
//! Encoding rules for the default tags:
//!
//! - Arithmetic values are written big-endian, after zero padding that brings
//!   the buffer length to a multiple of the value's size.
//! - Strings and byte vectors are a `u32` length (same arithmetic rule)
//!   followed by the raw bytes, with no trailing padding.
//! - `bool` is a single byte, `0` or `1`.
//!
//! Composite types implement [`Tag`] for `DefaultTag<Self>` by chaining the
//! free functions below over their fields.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;

use crate::buffer::{alignment_padding, Buffer, Reader};
use crate::error::{CodecError, Result};

/// Length prefix type for strings and byte sequences.
pub type LengthPrefix = u32;

/// Encoding strategy for values of type `T`.
pub trait Tag<T> {
    /// Append `value` to `buf`.
    fn buffer(&self, buf: &mut Buffer, value: &T) -> Result<()>;

    /// Read a value from `reader`.
    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<T>;

    /// Bytes `buffer` would append to a buffer currently `existing` bytes
    /// long, padding included.
    fn space_required(&self, existing: usize, value: &T) -> usize;
}

/// The natural encoding of `T`.
pub struct DefaultTag<T>(PhantomData<fn() -> T>);

impl<T> DefaultTag<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultTag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DefaultTag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DefaultTag<T> {}

impl<T> fmt::Debug for DefaultTag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultTag<{}>", std::any::type_name::<T>())
    }
}

/// Arithmetic encoding with an explicit alignment instead of the type size.
///
/// `Aligned(1)` packs the value with no padding at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aligned(pub usize);

/// Fixed-width encoding for strings and byte sequences: exactly `n` bytes,
/// no length prefix. Shorter values are zero-filled; longer values fail with
/// [`CodecError::LengthOverflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLength(pub usize);

/// Serialize a value with its default tag.
pub fn serialize<T>(buf: &mut Buffer, value: &T) -> Result<()>
where
    DefaultTag<T>: Tag<T>,
{
    DefaultTag::<T>::new().buffer(buf, value)
}

/// Serialize a value with an explicit tag.
pub fn serialize_with<T, G: Tag<T>>(buf: &mut Buffer, value: &T, tag: &G) -> Result<()> {
    tag.buffer(buf, value)
}

/// Deserialize a value with its default tag.
pub fn deserialize<T>(reader: &mut Reader<'_>) -> Result<T>
where
    DefaultTag<T>: Tag<T>,
{
    DefaultTag::<T>::new().unbuffer(reader)
}

/// Deserialize a value with an explicit tag.
pub fn deserialize_with<T, G: Tag<T>>(reader: &mut Reader<'_>, tag: &G) -> Result<T> {
    tag.unbuffer(reader)
}

/// Space a value needs under its default tag when appended at `existing`.
pub fn space_required<T>(existing: usize, value: &T) -> usize
where
    DefaultTag<T>: Tag<T>,
{
    DefaultTag::<T>::new().space_required(existing, value)
}

/// Space a value needs under an explicit tag when appended at `existing`.
pub fn space_required_with<T, G: Tag<T>>(existing: usize, value: &T, tag: &G) -> usize {
    tag.space_required(existing, value)
}

/// Encode a value into a fresh buffer with its default tag.
pub fn to_bytes<T>(value: &T) -> Result<Bytes>
where
    DefaultTag<T>: Tag<T>,
{
    let mut buf = Buffer::with_capacity(space_required(0, value));
    serialize(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Decode a value that must occupy all of `bytes`.
pub fn from_bytes<T>(bytes: &[u8]) -> Result<T>
where
    DefaultTag<T>: Tag<T>,
{
    let mut reader = Reader::new(bytes);
    let value = deserialize(&mut reader)?;
    if !reader.is_exhausted() {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }
    Ok(value)
}

macro_rules! arithmetic_tags {
    ($($ty:ty),* $(,)?) => {$(
        impl Tag<$ty> for DefaultTag<$ty> {
            fn buffer(&self, buf: &mut Buffer, value: &$ty) -> Result<()> {
                Aligned(std::mem::size_of::<$ty>()).buffer(buf, value)
            }

            fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<$ty> {
                Aligned(std::mem::size_of::<$ty>()).unbuffer(reader)
            }

            fn space_required(&self, existing: usize, value: &$ty) -> usize {
                Aligned(std::mem::size_of::<$ty>()).space_required(existing, value)
            }
        }

        impl Tag<$ty> for Aligned {
            fn buffer(&self, buf: &mut Buffer, value: &$ty) -> Result<()> {
                buf.append_aligned(&value.to_be_bytes(), self.0);
                Ok(())
            }

            fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<$ty> {
                const SIZE: usize = std::mem::size_of::<$ty>();
                let raw = reader.read_aligned(SIZE, self.0)?;
                let mut bytes = [0u8; SIZE];
                bytes.copy_from_slice(raw);
                Ok(<$ty>::from_be_bytes(bytes))
            }

            fn space_required(&self, existing: usize, _value: &$ty) -> usize {
                alignment_padding(self.0, existing) + std::mem::size_of::<$ty>()
            }
        }
    )*};
}

arithmetic_tags!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Tag<bool> for DefaultTag<bool> {
    fn buffer(&self, buf: &mut Buffer, value: &bool) -> Result<()> {
        serialize(buf, &u8::from(*value))
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<bool> {
        Ok(deserialize::<u8>(reader)? != 0)
    }

    fn space_required(&self, existing: usize, _value: &bool) -> usize {
        space_required(existing, &0u8)
    }
}

fn buffer_prefixed(buf: &mut Buffer, bytes: &[u8]) -> Result<()> {
    let len = LengthPrefix::try_from(bytes.len()).map_err(|_| CodecError::LengthOverflow {
        len: bytes.len(),
        max: LengthPrefix::MAX as usize,
    })?;
    serialize(buf, &len)?;
    buf.append(bytes);
    Ok(())
}

fn unbuffer_prefixed<'a>(reader: &mut Reader<'a>) -> Result<&'a [u8]> {
    let len = deserialize::<LengthPrefix>(reader)? as usize;
    reader.read_bytes(len)
}

fn prefixed_space(existing: usize, len: usize) -> usize {
    space_required(existing, &LengthPrefix::default()) + len
}

impl Tag<String> for DefaultTag<String> {
    fn buffer(&self, buf: &mut Buffer, value: &String) -> Result<()> {
        buffer_prefixed(buf, value.as_bytes())
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<String> {
        let raw = unbuffer_prefixed(reader)?;
        Ok(String::from_utf8(raw.to_vec())?)
    }

    fn space_required(&self, existing: usize, value: &String) -> usize {
        prefixed_space(existing, value.len())
    }
}

impl Tag<Vec<u8>> for DefaultTag<Vec<u8>> {
    fn buffer(&self, buf: &mut Buffer, value: &Vec<u8>) -> Result<()> {
        buffer_prefixed(buf, value)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<Vec<u8>> {
        Ok(unbuffer_prefixed(reader)?.to_vec())
    }

    fn space_required(&self, existing: usize, value: &Vec<u8>) -> usize {
        prefixed_space(existing, value.len())
    }
}

impl Tag<Bytes> for DefaultTag<Bytes> {
    fn buffer(&self, buf: &mut Buffer, value: &Bytes) -> Result<()> {
        buffer_prefixed(buf, value)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(unbuffer_prefixed(reader)?))
    }

    fn space_required(&self, existing: usize, value: &Bytes) -> usize {
        prefixed_space(existing, value.len())
    }
}

impl FixedLength {
    fn buffer_raw(&self, buf: &mut Buffer, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.0 {
            return Err(CodecError::LengthOverflow {
                len: bytes.len(),
                max: self.0,
            });
        }
        buf.append(bytes);
        buf.append_padding(self.0 - bytes.len());
        Ok(())
    }
}

impl Tag<Vec<u8>> for FixedLength {
    fn buffer(&self, buf: &mut Buffer, value: &Vec<u8>) -> Result<()> {
        self.buffer_raw(buf, value)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<Vec<u8>> {
        Ok(reader.read_bytes(self.0)?.to_vec())
    }

    fn space_required(&self, _existing: usize, _value: &Vec<u8>) -> usize {
        self.0
    }
}

impl Tag<String> for FixedLength {
    fn buffer(&self, buf: &mut Buffer, value: &String) -> Result<()> {
        self.buffer_raw(buf, value.as_bytes())
    }

    /// Trailing NUL fill is stripped.
    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<String> {
        let raw = reader.read_bytes(self.0)?;
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |idx| idx + 1);
        Ok(String::from_utf8(raw[..end].to_vec())?)
    }

    fn space_required(&self, _existing: usize, _value: &String) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_then_four_byte_pads_three() {
        let mut buf = Buffer::new();
        serialize(&mut buf, &0x7fu8).unwrap();
        serialize(&mut buf, &0x0102_0304u32).unwrap();

        assert_eq!(buf.as_slice(), &[0x7f, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn mixed_scalars_match_hand_computed_layout() {
        let mut buf = Buffer::new();
        serialize(&mut buf, &1u8).unwrap(); // 0
        serialize(&mut buf, &0x0203u16).unwrap(); // pad 1, 2..4
        serialize(&mut buf, &1.0f64).unwrap(); // pad 4, 8..16
        serialize(&mut buf, &-2i8).unwrap(); // 16
        serialize(&mut buf, &-1i32).unwrap(); // pad 3, 20..24

        let expected: Vec<u8> = [
            &[1u8, 0, 2, 3][..],
            &[0, 0, 0, 0],
            &1.0f64.to_be_bytes(),
            &[0xfe, 0, 0, 0],
            &[0xff, 0xff, 0xff, 0xff],
        ]
        .concat();
        assert_eq!(buf.as_slice(), expected.as_slice());

        let mut reader = buf.reader();
        assert_eq!(deserialize::<u8>(&mut reader).unwrap(), 1);
        assert_eq!(deserialize::<u16>(&mut reader).unwrap(), 0x0203);
        assert_eq!(deserialize::<f64>(&mut reader).unwrap(), 1.0);
        assert_eq!(deserialize::<i8>(&mut reader).unwrap(), -2);
        assert_eq!(deserialize::<i32>(&mut reader).unwrap(), -1);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn space_required_depends_on_insertion_point() {
        assert_eq!(space_required(0, &0u32), 4);
        assert_eq!(space_required(1, &0u32), 7);
        assert_eq!(space_required(5, &0u64), 11);
        assert_eq!(space_required(3, &0u8), 1);
        assert_eq!(space_required(2, &"abc".to_string()), 2 + 4 + 3);
    }

    #[test]
    fn string_is_length_prefixed_without_trailing_padding() {
        let mut buf = Buffer::new();
        serialize(&mut buf, &"hi".to_string()).unwrap();
        serialize(&mut buf, &7u8).unwrap();

        assert_eq!(buf.as_slice(), &[0, 0, 0, 2, b'h', b'i', 7]);
    }

    #[test]
    fn string_length_past_end_is_truncated() {
        let bytes = [0u8, 0, 0, 10, b'a', b'b'];
        let mut reader = Reader::new(&bytes);
        let err = deserialize::<String>(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedBuffer {
                needed: 10,
                remaining: 2
            }
        ));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let bytes = [0u8, 0, 0, 2, 0xff, 0xfe];
        let err = from_bytes::<String>(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
    }

    #[test]
    fn aligned_tag_overrides_natural_alignment() {
        let mut buf = Buffer::new();
        serialize(&mut buf, &9u8).unwrap();
        serialize_with(&mut buf, &0x0a0b_0c0du32, &Aligned(1)).unwrap();
        serialize_with(&mut buf, &0x11u16, &Aligned(8)).unwrap();

        assert_eq!(buf.as_slice(), &[9, 0x0a, 0x0b, 0x0c, 0x0d, 0, 0, 0, 0, 0x11]);
        assert_eq!(space_required_with(1, &0u32, &Aligned(1)), 4);
        assert_eq!(space_required_with(5, &0u16, &Aligned(8)), 5);

        let mut reader = buf.reader();
        assert_eq!(deserialize::<u8>(&mut reader).unwrap(), 9);
        assert_eq!(
            deserialize_with::<u32, _>(&mut reader, &Aligned(1)).unwrap(),
            0x0a0b_0c0d
        );
        assert_eq!(
            deserialize_with::<u16, _>(&mut reader, &Aligned(8)).unwrap(),
            0x11
        );
    }

    #[test]
    fn fixed_length_string_is_zero_filled() {
        let tag = FixedLength(6);
        let mut buf = Buffer::new();
        serialize_with(&mut buf, &"abc".to_string(), &tag).unwrap();
        assert_eq!(buf.as_slice(), b"abc\0\0\0");

        let mut reader = buf.reader();
        let decoded: String = deserialize_with(&mut reader, &tag).unwrap();
        assert_eq!(decoded, "abc");
    }

    #[test]
    fn fixed_length_rejects_oversized_value() {
        let mut buf = Buffer::new();
        let err = serialize_with(&mut buf, &vec![1u8, 2, 3], &FixedLength(2)).unwrap_err();
        assert!(matches!(err, CodecError::LengthOverflow { len: 3, max: 2 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn bool_roundtrip_and_nonzero_is_true() {
        let bytes = to_bytes(&true).unwrap();
        assert_eq!(bytes.as_ref(), &[1]);
        assert!(from_bytes::<bool>(&[2]).unwrap());
        assert!(!from_bytes::<bool>(&[0]).unwrap());
    }

    #[test]
    fn from_bytes_rejects_trailing_data() {
        let err = from_bytes::<u16>(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, CodecError::TrailingBytes(1)));
    }

    #[test]
    fn truncated_scalar_reports_shortfall() {
        let err = from_bytes::<u64>(&[0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedBuffer {
                needed: 8,
                remaining: 3
            }
        ));
    }
}
