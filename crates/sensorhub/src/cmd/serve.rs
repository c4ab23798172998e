use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sensorhub::path::PathTree;
use sensorhub::transport::UnixDomainSocket;
use sensorhub::{Server, ServerConfig};
use serde::Serialize;

use crate::cmd::routes::load_tree;
use crate::cmd::ServeArgs;
use crate::exit::{server_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_json, print_pairs, OutputFormat};

const IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Serialize)]
struct ServeSummary {
    clients: usize,
    route_updates: usize,
    routes: usize,
    faults: usize,
    tree_nodes: usize,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut tree = match &args.tree {
        Some(path) => load_tree(path)?,
        None => PathTree::new(),
    };
    let config = ServerConfig {
        host: args.host.clone(),
        ..ServerConfig::default()
    };

    let socket =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    socket
        .set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(path = %args.path.display(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut summary = ServeSummary {
        clients: 0,
        route_updates: 0,
        routes: 0,
        faults: 0,
        tree_nodes: tree.len(),
    };

    while running.load(Ordering::SeqCst) {
        if args.max_clients.is_some_and(|max| summary.clients >= max) {
            break;
        }
        let transport = match socket.try_accept() {
            Ok(Some(transport)) => transport,
            Ok(None) => {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };

        // Each client sees the tree as the previous one left it.
        let mut server = Server::with_config(transport, tree.clone(), config.clone())
            .map_err(|err| server_error("server setup failed", err))?;
        while running.load(Ordering::SeqCst) {
            match server.poll() {
                Ok(poll) => {
                    for fault in server.take_faults() {
                        tracing::warn!(%fault, "client message rejected");
                        summary.faults += 1;
                    }
                    if poll.messages == 0 {
                        std::thread::sleep(IDLE_SLEEP);
                    }
                }
                Err(err) if err.is_disconnect() => break,
                Err(err) => return Err(server_error("serve failed", err)),
            }
        }

        summary.clients += 1;
        summary.route_updates += server.route_updates();
        summary.routes += server.routes().len();
        tree = server.path_tree().clone();
        summary.tree_nodes = tree.len();
        tracing::info!(clients = summary.clients, "client disconnected");
    }

    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn print_summary(summary: &ServeSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        _ => print_pairs(&[
            ("clients", summary.clients.to_string()),
            ("route updates", summary.route_updates.to_string()),
            ("routes", summary.routes.to_string()),
            ("faults", summary.faults.to_string()),
            ("tree nodes", summary.tree_nodes.to_string()),
        ]),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
