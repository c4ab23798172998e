use std::path::Path;

use sensorhub::path::{PathTree, RouteTable};
use serde::Serialize;

use crate::cmd::RoutesArgs;
use crate::exit::{io_error, path_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct RouteRow {
    destination: String,
    source: String,
    transform: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolves: Option<bool>,
}

#[derive(Serialize)]
struct RoutesOutput {
    routes: Vec<RouteRow>,
    unresolved: usize,
}

pub fn run(args: RoutesArgs, format: OutputFormat) -> CliResult<i32> {
    let table = load_routes(&args.file)?;
    let tree = args.tree.as_deref().map(load_tree).transpose()?;

    let unresolved: Vec<&str> = match &tree {
        Some(tree) => table
            .unresolved_sources(tree)
            .into_iter()
            .map(|route| route.destination.as_str())
            .collect(),
        None => Vec::new(),
    };

    let rows: Vec<RouteRow> = table
        .iter()
        .map(|route| RouteRow {
            destination: route.destination.clone(),
            source: route.source.clone(),
            transform: route.transform.is_some(),
            resolves: tree
                .as_ref()
                .map(|_| !unresolved.contains(&route.destination.as_str())),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&RoutesOutput {
            unresolved: unresolved.len(),
            routes: rows,
        }),
        OutputFormat::Table => print_table(
            &["DESTINATION", "SOURCE", "TRANSFORM", "RESOLVES"],
            rows.into_iter()
                .map(|row| {
                    vec![
                        row.destination,
                        row.source,
                        yes_no(row.transform).to_string(),
                        row.resolves.map_or("-", yes_no).to_string(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for row in rows {
                let transform = if row.transform { " (transformed)" } else { "" };
                println!("{} <- {}{transform}", row.destination, row.source);
            }
        }
        OutputFormat::Raw => {
            let text = table
                .routes_as_text()
                .map_err(|err| path_error("route serialization failed", err))?;
            println!("{text}");
        }
    }

    if !unresolved.is_empty() {
        tracing::warn!(destinations = ?unresolved, "route sources missing from tree");
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}

pub fn load_routes(path: &Path) -> CliResult<RouteTable> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
    RouteTable::from_text(&text).map_err(|err| path_error("invalid route document", err))
}

pub fn load_tree(path: &Path) -> CliResult<PathTree> {
    PathTree::from_file(path).map_err(|err| path_error("path tree load failed", err))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
