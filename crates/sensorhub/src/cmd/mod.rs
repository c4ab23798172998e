use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod plugin;
pub mod resolve;
pub mod routes;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a route document and show its directives.
    Routes(RoutesArgs),
    /// Resolve a path through routes and aliases to its source device.
    Resolve(ResolveArgs),
    /// Locate a driver plugin in the plugin search path.
    Plugin(PluginArgs),
    /// Serve clients on a Unix domain socket.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Routes(args) => routes::run(args, format),
        Command::Resolve(args) => resolve::run(args, format),
        Command::Plugin(args) => plugin::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RoutesArgs {
    /// Route document (JSON).
    pub file: PathBuf,
    /// Path tree to check route sources against.
    #[arg(long, value_name = "FILE")]
    pub tree: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Path tree file (JSON).
    pub tree: PathBuf,
    /// Path to resolve.
    pub path: String,
    /// Route document applied before alias resolution.
    #[arg(long, value_name = "FILE")]
    pub routes: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PluginArgs {
    /// Plugin name, e.g. com_example_Tracker.
    #[arg(required_unless_present = "list")]
    pub name: Option<String>,
    /// Directory to search (repeatable). Default: <prefix>/lib/sensorhub-plugins.
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_path: Vec<PathBuf>,
    /// List every plugin file instead of looking one up.
    #[arg(long, conflicts_with = "name")]
    pub list: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Initial path tree (JSON).
    #[arg(long, value_name = "FILE")]
    pub tree: Option<PathBuf>,
    /// Host name recorded in device entries.
    #[arg(long, default_value = "localhost")]
    pub host: String,
    /// Exit after serving N clients.
    #[arg(long, value_name = "N")]
    pub max_clients: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
