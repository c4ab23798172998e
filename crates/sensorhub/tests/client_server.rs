#![cfg(unix)]

use std::os::unix::net::UnixStream;

use sensorhub::client::ClientContext;
use sensorhub::codec::{PoseReport, TimeValue};
use sensorhub::path::{PathElement, PathTree};
use sensorhub::transport::StreamTransport;
use sensorhub::Server;

fn pair() -> (
    Server<StreamTransport<UnixStream>>,
    ClientContext<StreamTransport<UnixStream>>,
) {
    let (a, b) = UnixStream::pair().unwrap();
    let server = Server::new(StreamTransport::unix(a).unwrap(), PathTree::new()).unwrap();
    let client = ClientContext::new("com.example.viewer", StreamTransport::unix(b).unwrap()).unwrap();
    (server, client)
}

#[test]
fn client_routes_reach_the_server_tree() {
    let (mut server, mut client) = pair();
    client
        .send_route(r#"[{"destination": "/me/head", "source": "/com_example/Tracker0/0"}]"#)
        .unwrap();

    let summary = server.poll().unwrap();
    assert_eq!(summary.messages, 1);
    assert_eq!(summary.connections, 1);
    assert_eq!(server.connections(), 1);
    assert_eq!(
        server.routes().resolve_source("/me/head"),
        Some("/com_example/Tracker0/0")
    );
    assert_eq!(
        server.path_tree().element("/me/head").unwrap(),
        &PathElement::alias("/com_example/Tracker0/0")
    );
}

#[test]
fn driver_reports_reach_client_interfaces() {
    let (mut server, mut client) = pair();
    server.load_driver("com_example_Tracker").unwrap();
    let device = server
        .register_device("com_example_Tracker", "/com_example/Tracker0", "Tracker0")
        .unwrap();
    server
        .apply_routes(r#"{"destination": "/me/head", "source": "/com_example/Tracker0/0"}"#)
        .unwrap();
    let mut tree = server.path_tree().clone();
    tree.insert("/com_example/Tracker0/0", PathElement::sensor(0))
        .unwrap();
    client.set_path_tree(tree).unwrap();

    client.register_report_type::<PoseReport>().unwrap();
    let head = client.get_interface("/me/head").unwrap();
    assert_eq!(head.source().device, "Tracker0");
    assert_eq!(head.source().sensor, Some(0));

    let pose = PoseReport {
        sensor: 0,
        translation: [0.1, 1.7, -0.2],
        ..PoseReport::default()
    };
    server
        .publish_report(device, TimeValue::new(100, 250), &pose)
        .unwrap();
    client.update().unwrap();

    assert_eq!(
        head.get_state::<PoseReport>().unwrap(),
        (TimeValue::new(100, 250), pose)
    );
}

#[test]
fn server_sees_disconnect_after_client_drops() {
    let (mut server, client) = pair();
    drop(client);

    let mut disconnected = false;
    for _ in 0..3 {
        match server.poll() {
            Ok(_) => continue,
            Err(err) => {
                assert!(err.is_disconnect());
                disconnected = true;
                break;
            }
        }
    }
    assert!(disconnected);
}
