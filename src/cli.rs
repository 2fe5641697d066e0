use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use cosim_server::model::ArtifactStore;
use cosim_server::model::artifact::ARTIFACT_SUFFIX;

#[derive(Parser, Debug)]
#[command(version, about = "HTTP co-simulation session server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Print the model description of an artifact
    Inspect(InspectArgs),
    /// Run an artifact from start to stop and write the sampled outputs as CSV
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override `server.port`
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Artifact name, or path to a `.model.toml` file
    pub artifact: String,
    /// Directory searched for artifact names
    #[arg(long, default_value = "artifacts")]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Artifact name, or path to a `.model.toml` file
    pub artifact: String,
    /// Directory searched for artifact names
    #[arg(long, default_value = "artifacts")]
    pub dir: PathBuf,
    /// Start time; the artifact's default experiment when omitted
    #[arg(long)]
    pub start: Option<f64>,
    /// Stop time
    #[arg(long)]
    pub stop: Option<f64>,
    /// Communication step size
    #[arg(long)]
    pub step: Option<f64>,
    /// Constant input, repeatable (`--input u=1.5`)
    #[arg(long = "input", value_parser = parse_assignment)]
    pub inputs: Vec<(String, f64)>,
    /// Write CSV here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got \"{s}\""))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for \"{name}\": {e}"))?;
    Ok((name.trim().to_string(), value))
}

/// Resolves `artifact` to a store and a name within it.
///
/// A path to an existing `<name>.model.toml` file opens its parent
/// directory; anything else is looked up by name in `dir`.
pub fn resolve_artifact(artifact: &str, dir: &Path) -> (ArtifactStore, String) {
    let path = Path::new(artifact);
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .and_then(|f| f.strip_suffix(ARTIFACT_SUFFIX))
        .filter(|_| path.is_file());
    if let Some(name) = name {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        return (ArtifactStore::new(parent), name.to_string());
    }
    (ArtifactStore::new(dir), artifact.to_string())
}
