use bytes::Bytes;

use crate::buffer::{Buffer, Reader};
use crate::codec::{deserialize, serialize, space_required, DefaultTag, Tag};
use crate::error::{CodecError, Result};

/// A typed report payload that travels under a registered message type name.
///
/// Drivers encode reports with [`encode_report`]; clients decode them with
/// [`decode_report`]. Both sides agree on the layout through `Tag`.
pub trait ReportType: Clone + 'static {
    /// Message type name registered on the connection.
    const NAME: &'static str;

    /// Whether clients cache the latest value of this report.
    ///
    /// Event-like reports set this to `false` and only trigger callbacks.
    /// Buttons keep state so the last pressed/released value stays readable.
    const KEEP_STATE: bool;

    /// Encoding strategy for the payload.
    type Tag: Tag<Self>;

    fn tag() -> Self::Tag;

    /// Sensor index within the reporting device, for reports that carry one.
    fn sensor(&self) -> Option<u32> {
        None
    }
}

/// Encode a report payload with its type's tag.
pub fn encode_report<R: ReportType>(report: &R) -> Result<Bytes> {
    let tag = R::tag();
    let mut buf = Buffer::with_capacity(tag.space_required(0, report));
    tag.buffer(&mut buf, report)?;
    Ok(buf.freeze())
}

/// Decode a report payload, rejecting trailing bytes.
pub fn decode_report<R: ReportType>(payload: &[u8]) -> Result<R> {
    let mut reader = Reader::new(payload);
    let report = R::tag().unbuffer(&mut reader)?;
    if !reader.is_exhausted() {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }
    Ok(report)
}

/// One analog channel value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogReport {
    pub sensor: u32,
    pub value: f64,
}

/// A button changed state. `pressed` travels as one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonReport {
    pub sensor: u32,
    pub pressed: bool,
}

/// Position and orientation (unit quaternion, `w` first) of a tracked sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseReport {
    pub sensor: u32,
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

impl Default for PoseReport {
    fn default() -> Self {
        Self {
            sensor: 0,
            translation: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Tag<AnalogReport> for DefaultTag<AnalogReport> {
    fn buffer(&self, buf: &mut Buffer, value: &AnalogReport) -> Result<()> {
        serialize(buf, &value.sensor)?;
        serialize(buf, &value.value)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<AnalogReport> {
        Ok(AnalogReport {
            sensor: deserialize(reader)?,
            value: deserialize(reader)?,
        })
    }

    fn space_required(&self, existing: usize, value: &AnalogReport) -> usize {
        let sensor = space_required(existing, &value.sensor);
        sensor + space_required(existing + sensor, &value.value)
    }
}

impl Tag<ButtonReport> for DefaultTag<ButtonReport> {
    fn buffer(&self, buf: &mut Buffer, value: &ButtonReport) -> Result<()> {
        serialize(buf, &value.sensor)?;
        serialize(buf, &value.pressed)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<ButtonReport> {
        Ok(ButtonReport {
            sensor: deserialize(reader)?,
            pressed: deserialize(reader)?,
        })
    }

    fn space_required(&self, existing: usize, value: &ButtonReport) -> usize {
        let sensor = space_required(existing, &value.sensor);
        sensor + space_required(existing + sensor, &value.pressed)
    }
}

impl Tag<PoseReport> for DefaultTag<PoseReport> {
    fn buffer(&self, buf: &mut Buffer, value: &PoseReport) -> Result<()> {
        serialize(buf, &value.sensor)?;
        for component in value.translation.iter().chain(&value.rotation) {
            serialize(buf, component)?;
        }
        Ok(())
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> Result<PoseReport> {
        let mut report = PoseReport {
            sensor: deserialize(reader)?,
            ..PoseReport::default()
        };
        for component in report.translation.iter_mut().chain(&mut report.rotation) {
            *component = deserialize(reader)?;
        }
        Ok(report)
    }

    fn space_required(&self, existing: usize, value: &PoseReport) -> usize {
        let mut len = space_required(existing, &value.sensor);
        for component in value.translation.iter().chain(&value.rotation) {
            len += space_required(existing + len, component);
        }
        len
    }
}

macro_rules! report_types {
    ($($ty:ty => $name:literal, keep_state: $keep:literal;)*) => {
        $(
            impl ReportType for $ty {
                const NAME: &'static str = $name;
                const KEEP_STATE: bool = $keep;
                type Tag = DefaultTag<$ty>;

                fn tag() -> Self::Tag {
                    DefaultTag::new()
                }

                fn sensor(&self) -> Option<u32> {
                    Some(self.sensor)
                }
            }
        )*
    };
}

report_types! {
    AnalogReport => "sensorhub.analog", keep_state: true;
    ButtonReport => "sensorhub.button", keep_state: true;
    PoseReport => "sensorhub.pose", keep_state: true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_report_roundtrip_with_inner_padding() {
        let report = AnalogReport {
            sensor: 3,
            value: 0.25,
        };
        let bytes = encode_report(&report).unwrap();

        // u32 at 0, 4 bytes padding, f64 at 8.
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &[0, 0, 0, 3, 0, 0, 0, 0]);
        assert_eq!(decode_report::<AnalogReport>(&bytes).unwrap(), report);
    }

    #[test]
    fn button_is_five_bytes() {
        let report = ButtonReport {
            sensor: 1,
            pressed: true,
        };
        let bytes = encode_report(&report).unwrap();
        assert_eq!(bytes.as_ref(), &[0, 0, 0, 1, 1]);
        assert_eq!(decode_report::<ButtonReport>(&bytes).unwrap(), report);
    }

    #[test]
    fn pose_layout() {
        let report = PoseReport {
            sensor: 2,
            translation: [1.0, 2.0, 3.0],
            rotation: [1.0, 0.0, 0.0, 0.0],
        };
        let bytes = encode_report(&report).unwrap();
        // sensor, 4 padding, 7 doubles.
        assert_eq!(bytes.len(), 8 + 7 * 8);
        assert_eq!(&bytes[8..16], &1.0f64.to_be_bytes());
        assert_eq!(decode_report::<PoseReport>(&bytes).unwrap(), report);
    }

    #[test]
    fn standard_reports_carry_their_sensor() {
        assert_eq!(
            AnalogReport {
                sensor: 4,
                value: 0.0
            }
            .sensor(),
            Some(4)
        );
        assert_eq!(
            ButtonReport {
                sensor: 2,
                pressed: true
            }
            .sensor(),
            Some(2)
        );
        assert_eq!(PoseReport::default().sensor(), Some(0));
        assert!(ButtonReport::KEEP_STATE);
    }

    #[test]
    fn truncated_report_is_rejected() {
        let bytes = encode_report(&AnalogReport {
            sensor: 1,
            value: 1.0,
        })
        .unwrap();
        let err = decode_report::<AnalogReport>(&bytes[..10]).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBuffer { .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_report(&ButtonReport {
            sensor: 0,
            pressed: false,
        })
        .unwrap()
        .to_vec();
        bytes.push(0);
        assert!(matches!(
            decode_report::<ButtonReport>(&bytes),
            Err(CodecError::TrailingBytes(1))
        ));
    }
}
