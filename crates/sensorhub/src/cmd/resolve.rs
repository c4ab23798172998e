use sensorhub::path::{normalize, PathElement};
use serde::Serialize;

use crate::cmd::routes::{load_routes, load_tree};
use crate::cmd::ResolveArgs;
use crate::exit::{path_error, CliResult, SUCCESS};
use crate::output::{print_json, print_pairs, print_table, OutputFormat};

#[derive(Serialize)]
struct Resolution {
    path: String,
    routed_source: Option<String>,
    resolved: String,
    element: &'static str,
    device: Option<String>,
    sensor: Option<u32>,
}

pub fn run(args: ResolveArgs, format: OutputFormat) -> CliResult<i32> {
    let tree = load_tree(&args.tree)?;
    let routes = args
        .routes
        .as_deref()
        .map(load_routes)
        .transpose()?
        .unwrap_or_default();

    let path = normalize(&args.path).map_err(|err| path_error("invalid path", err))?;
    let routed_source = routes.resolve_source(&path).map(str::to_string);
    let target = routed_source.as_deref().unwrap_or(&path);

    let resolved = tree
        .resolve_alias(target)
        .map_err(|err| path_error("resolve failed", err))?;
    let element = tree
        .element(&resolved)
        .map_err(|err| path_error("resolve failed", err))?;
    let device = tree
        .owning_device(&resolved)
        .map_err(|err| path_error("resolve failed", err))?
        .map(|device| device.full_name());
    let sensor = match element {
        PathElement::Sensor(sensor) => Some(sensor.index),
        _ => None,
    };

    let out = Resolution {
        path,
        routed_source,
        resolved,
        element: element.kind(),
        device,
        sensor,
    };
    print_resolution(&out, format);
    Ok(SUCCESS)
}

fn print_resolution(out: &Resolution, format: OutputFormat) {
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let pairs = [
        ("path", out.path.clone()),
        ("routed source", or_dash(out.routed_source.clone())),
        ("resolved", out.resolved.clone()),
        ("element", out.element.to_string()),
        ("device", or_dash(out.device.clone())),
        ("sensor", or_dash(out.sensor.map(|index| index.to_string()))),
    ];

    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["FIELD", "VALUE"],
            pairs
                .into_iter()
                .map(|(key, value)| vec![key.to_string(), value])
                .collect(),
        ),
        OutputFormat::Pretty => print_pairs(&pairs),
        OutputFormat::Raw => println!("{}", out.resolved),
    }
}
