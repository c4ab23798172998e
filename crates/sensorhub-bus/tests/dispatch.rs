use std::cell::RefCell;
use std::rc::Rc;

use sensorhub_bus::{ConnectionBus, Message};
use sensorhub_codec::{deserialize, serialize, space_required, Buffer, Reader, ReportType, Tag, TimeValue};
use sensorhub_transport::{LoopbackTransport, StreamTransport, Transport};

#[derive(Debug, Clone, PartialEq)]
struct Analog {
    channel: u8,
    value: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct AnalogTag;

impl Tag<Analog> for AnalogTag {
    fn buffer(&self, buf: &mut Buffer, value: &Analog) -> sensorhub_codec::Result<()> {
        serialize(buf, &value.channel)?;
        serialize(buf, &value.value)
    }

    fn unbuffer(&self, reader: &mut Reader<'_>) -> sensorhub_codec::Result<Analog> {
        Ok(Analog {
            channel: deserialize(reader)?,
            value: deserialize(reader)?,
        })
    }

    fn space_required(&self, existing: usize, value: &Analog) -> usize {
        let channel = space_required(existing, &value.channel);
        channel + space_required(existing + channel, &value.value)
    }
}

impl ReportType for Analog {
    const NAME: &'static str = "test.joystick";
    const KEEP_STATE: bool = true;
    type Tag = AnalogTag;

    fn tag() -> Self::Tag {
        AnalogTag
    }
}

fn collect_reports<T: Transport>(bus: &mut ConnectionBus<T>) -> Rc<RefCell<Vec<(String, Analog)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    bus.register_handler(None, Some(Analog::NAME), move |message: &Message| {
        let report = message.decode::<Analog>()?;
        sink.borrow_mut().push((message.sender_name.clone(), report));
        Ok(())
    })
    .unwrap();
    seen
}

#[test]
fn typed_reports_over_loopback() {
    let mut bus = ConnectionBus::new(LoopbackTransport::new());
    let device = bus.register_device("Joystick0").unwrap();
    let seen = collect_reports(&mut bus);

    let report = Analog {
        channel: 2,
        value: -0.5,
    };
    bus.publish_report(device, TimeValue::new(10, 0), &report)
        .unwrap();
    let summary = bus.poll().unwrap();

    assert_eq!(summary.messages, 1);
    assert_eq!(*seen.borrow(), vec![("Joystick0".to_string(), report)]);
}

#[cfg(unix)]
#[test]
fn typed_reports_across_a_stream() {
    let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
    let mut server = ConnectionBus::new(StreamTransport::unix(a).unwrap());
    let mut client = ConnectionBus::new(StreamTransport::unix(b).unwrap());

    let seen = collect_reports(&mut client);
    let device = server.register_device("Joystick0").unwrap();
    for i in 0..3u8 {
        server
            .publish_report(
                device,
                TimeValue::new(1, i32::from(i)),
                &Analog {
                    channel: i,
                    value: f64::from(i),
                },
            )
            .unwrap();
    }

    client.poll().unwrap();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].1.channel, 2);
    assert!(seen.iter().all(|(sender, _)| sender == "Joystick0"));
}

#[test]
fn undecodable_payload_is_a_fault_not_a_failure() {
    let mut bus = ConnectionBus::new(LoopbackTransport::new());
    let device = bus.register_device("Joystick0").unwrap();
    let kind = bus.register_message_type(Analog::NAME).unwrap();
    let seen = collect_reports(&mut bus);

    bus.publish(device, kind, TimeValue::default(), &[1, 2, 3])
        .unwrap();
    let summary = bus.poll().unwrap();

    assert_eq!(summary.faults, 1);
    assert!(seen.borrow().is_empty());
    assert_eq!(bus.take_faults().len(), 1);
}
