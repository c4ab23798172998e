//! Tagged, alignment-aware binary codec for sensorhub reports.
//!
//! Values are encoded into a [`Buffer`] and decoded from a [`Reader`]
//! according to a [`Tag`]:
//! - scalars are big-endian and padded to their natural alignment
//! - strings and byte sequences carry a 4-byte big-endian length prefix
//! - composites chain their fields through the same rules
//!
//! The [`wire`] module frames whole messages (sender, type, timestamp,
//! payload) for stream transports.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod report;
pub mod time;
pub mod wire;

pub use buffer::{alignment_padding, Buffer, Reader};
pub use codec::{
    deserialize, deserialize_with, from_bytes, serialize, serialize_with, space_required,
    space_required_with, to_bytes, Aligned, DefaultTag, FixedLength, LengthPrefix, Tag,
};
pub use error::{CodecError, Result};
pub use report::{
    decode_report, encode_report, AnalogReport, ButtonReport, PoseReport, ReportType,
};
pub use time::TimeValue;
pub use wire::{
    decode_message, encode_message, WireConfig, WireMessage, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
