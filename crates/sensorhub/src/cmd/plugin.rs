use std::path::PathBuf;

use sensorhub::pluginhost::{
    all_files_with_ext, current_search_path, find_plugin, SearchPath, PLUGIN_EXTENSION,
};
use serde::Serialize;

use crate::cmd::PluginArgs;
use crate::exit::{io_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct PluginOutput {
    name: Option<String>,
    search_path: Vec<PathBuf>,
    plugins: Vec<PathBuf>,
}

pub fn run(args: PluginArgs, format: OutputFormat) -> CliResult<i32> {
    let search = if args.search_path.is_empty() {
        current_search_path().map_err(|err| io_error("locate executable", err))?
    } else {
        args.search_path.iter().collect::<SearchPath>()
    };

    let plugins = match &args.name {
        Some(name) if !args.list => match find_plugin(name, &search) {
            Some(path) => vec![path],
            None => {
                let dirs = search
                    .iter()
                    .map(|dir| dir.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(CliError::new(
                    FAILURE,
                    format!("plugin {name} not found (searched: {dirs})"),
                ));
            }
        },
        _ => all_files_with_ext(&search, PLUGIN_EXTENSION),
    };

    let out = PluginOutput {
        name: args.name,
        search_path: search.iter().map(PathBuf::from).collect(),
        plugins,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["PLUGIN"],
            out.plugins
                .iter()
                .map(|path| vec![path.display().to_string()])
                .collect(),
        ),
        OutputFormat::Pretty | OutputFormat::Raw => {
            for path in &out.plugins {
                println!("{}", path.display());
            }
        }
    }
    Ok(SUCCESS)
}
