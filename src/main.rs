//! cosim-server entry point: CLI wiring, logging and config loading.

mod cli;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Command, InspectArgs, RunArgs, ServeArgs, resolve_artifact};
use cosim_server::api::{self, AppState};
use cosim_server::config::ServiceConfig;
use cosim_server::error::{ServiceError, ServiceResult};
use cosim_server::io::export::{export_csv, write_csv};
use cosim_server::model::BuiltinRuntime;
use cosim_server::sim::batch::{self, BatchOptions};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cosim_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn serve(args: ServeArgs) -> ServiceResult<()> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_toml_file(path)
            .map_err(|e| ServiceError::Config(e.to_string()))?,
        None => ServiceConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    let addr = config
        .server
        .socket_addr()
        .map_err(|e| ServiceError::Config(e.to_string()))?;

    let state = Arc::new(AppState::new(config, Arc::new(BuiltinRuntime)));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(api::serve(state, addr))?;
    Ok(())
}

fn inspect(args: InspectArgs) -> ServiceResult<()> {
    let (store, name) = resolve_artifact(&args.artifact, &args.dir);
    if !store.contains(&name) {
        return Err(ServiceError::ArtifactNotFound(name));
    }
    print!("{}", store.describe(&name)?.dump());
    Ok(())
}

fn run(args: RunArgs) -> ServiceResult<()> {
    let (store, name) = resolve_artifact(&args.artifact, &args.dir);
    let options = BatchOptions {
        start_time: args.start,
        stop_time: args.stop,
        step_size: args.step,
        outputs: None,
        inputs: args.inputs.into_iter().collect(),
    };
    let result = batch::simulate(&store, &BuiltinRuntime, &name, &options)?;

    match &args.out {
        Some(path) => {
            export_csv(&result, path)?;
            eprintln!("{} samples written to {}", result.len(), path.display());
        }
        None => write_csv(&result, std::io::stdout().lock())?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let outcome = match cli.command {
        Command::Serve(args) => serve(args),
        Command::Inspect(args) => inspect(args),
        Command::Run(args) => run(args),
    };
    if let Err(e) = outcome {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
