//! Property tests for the codec invariants: decoding inverts encoding, and
//! `space_required` predicts exactly how many bytes an append consumes from
//! any starting offset.

use proptest::prelude::*;
use sensorhub_codec::{
    deserialize, serialize, space_required, Buffer, DefaultTag, Tag, TimeValue,
};

fn check_at_offset<T>(offset: usize, value: T) -> Result<(), TestCaseError>
where
    T: PartialEq + std::fmt::Debug,
    DefaultTag<T>: Tag<T>,
{
    let mut buf = Buffer::new();
    buf.append_padding(offset);
    let before = buf.len();
    let predicted = space_required(before, &value);

    serialize(&mut buf, &value).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(buf.len() - before, predicted);

    let mut reader = buf.reader();
    reader
        .skip_padding(offset)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    let decoded: T = deserialize(&mut reader).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(decoded, value);
    prop_assert!(reader.is_exhausted());
    Ok(())
}

proptest! {
    #[test]
    fn unsigned_roundtrip(offset in 0usize..16, a in any::<u8>(), b in any::<u16>(), c in any::<u32>(), d in any::<u64>()) {
        check_at_offset(offset, a)?;
        check_at_offset(offset, b)?;
        check_at_offset(offset, c)?;
        check_at_offset(offset, d)?;
    }

    #[test]
    fn signed_roundtrip(offset in 0usize..16, a in any::<i8>(), b in any::<i16>(), c in any::<i32>(), d in any::<i64>()) {
        check_at_offset(offset, a)?;
        check_at_offset(offset, b)?;
        check_at_offset(offset, c)?;
        check_at_offset(offset, d)?;
    }

    #[test]
    fn float_roundtrip(offset in 0usize..16, a in proptest::num::f32::NORMAL, b in proptest::num::f64::NORMAL) {
        check_at_offset(offset, a)?;
        check_at_offset(offset, b)?;
    }

    #[test]
    fn string_roundtrip(offset in 0usize..16, s in ".{0,64}") {
        check_at_offset(offset, s)?;
    }

    #[test]
    fn bytes_and_time_roundtrip(
        offset in 0usize..16,
        raw in proptest::collection::vec(any::<u8>(), 0..64),
        seconds in any::<i64>(),
        micros in 0i32..1_000_000,
    ) {
        check_at_offset(offset, raw)?;
        check_at_offset(offset, TimeValue { seconds, microseconds: micros })?;
    }

    /// A sequence of mixed values written back to back decodes in order.
    #[test]
    fn mixed_sequence_roundtrip(a in any::<u8>(), b in any::<u32>(), s in "[a-z]{0,12}", c in any::<u16>(), d in any::<f64>().prop_filter("nan", |v| !v.is_nan())) {
        let mut buf = Buffer::new();
        serialize(&mut buf, &a).unwrap();
        serialize(&mut buf, &b).unwrap();
        serialize(&mut buf, &s).unwrap();
        serialize(&mut buf, &c).unwrap();
        serialize(&mut buf, &d).unwrap();

        let mut reader = buf.reader();
        prop_assert_eq!(deserialize::<u8>(&mut reader).unwrap(), a);
        prop_assert_eq!(deserialize::<u32>(&mut reader).unwrap(), b);
        prop_assert_eq!(deserialize::<String>(&mut reader).unwrap(), s);
        prop_assert_eq!(deserialize::<u16>(&mut reader).unwrap(), c);
        prop_assert_eq!(deserialize::<f64>(&mut reader).unwrap(), d);
        prop_assert!(reader.is_exhausted());
    }
}
