//! pkgreg - operator tool for a local package registry
//!
//! Runs the registry operations against the filesystem blob store and
//! catalog named by the configuration.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{parse_name_version, Cli, Commands, GlobalArgs};
use crate::display::{CommandOutput, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use chrono::Utc;
use clap::Parser;
use futures::stream::{self, StreamExt};
use pkgreg_config::Config;
use pkgreg_events::EventReceiver;
use pkgreg_service::{url_issuer_from_config, PackageService};
use pkgreg_store::BlobStore;
use pkgreg_types::{
    Checksum, ChecksumAlgorithm, CreatePackageRequest, CreatePackageResponse,
    DeletePackageRequest, GetPackageRequest, ListPackagesRequest, PackageIdentity,
    PackageSelector, TransportError,
};
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::AsyncReadExt;
use tokio::select;
use tracing::{error, info};

/// Upper bound on the chunk size used when streaming a file
const PUSH_CHUNK_SIZE: usize = 1024 * 1024;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting pkgreg v{}", env!("CARGO_PKG_VERSION"));

    // Precedence: file (or defaults), then environment, then flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);
    config.validate()?;

    let (event_sender, event_receiver) = pkgreg_events::channel();
    let service = PackageService::builder()
        .with_config(config.clone())
        .with_event_sender(event_sender)
        .open_from_config()
        .await?
        .build()?;

    let renderer = OutputRenderer::new(cli.global.json);
    let event_handler = EventHandler::new(cli.global.json);

    let output = execute_command_with_events(
        cli.command,
        service,
        config,
        event_receiver,
        &event_handler,
    )
    .await?;

    renderer.render(&output)?;

    if let CommandOutput::Deleted(response) = &output {
        let failed = response.results.iter().filter(|o| !o.is_deleted()).count();
        if failed > 0 {
            return Err(CliError::PartialFailure {
                failed,
                total: response.results.len(),
            });
        }
    }

    info!("Command completed successfully");
    Ok(())
}

fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(dir) = &global.data_dir {
        config.paths.data_dir = Some(dir.clone());
    }
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    service: PackageService,
    config: Config,
    mut event_receiver: EventReceiver,
    event_handler: &EventHandler,
) -> Result<CommandOutput, CliError> {
    let mut command_future = Box::pin(execute_command(command, service, config));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(message) = event_receiver.try_recv() {
                    event_handler.handle_event(&message);
                }
                return result;
            }

            message = event_receiver.recv() => {
                if let Some(message) = message {
                    event_handler.handle_event(&message);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    service: PackageService,
    config: Config,
) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Push {
            file,
            org,
            name,
            version,
            package_type,
            checksum,
        } => {
            let identity = PackageIdentity::new(org.org, name, version, package_type)?;
            let chunk_size = usize::try_from(config.upload.max_chunk_size)
                .unwrap_or(usize::MAX)
                .clamp(1, PUSH_CHUNK_SIZE);
            let created = push(&service, &file, identity, checksum, chunk_size).await?;
            Ok(CommandOutput::Created(created))
        }

        Commands::Get {
            org,
            name,
            version,
            package_type,
            url,
        } => {
            let descriptor = service
                .get_package(GetPackageRequest {
                    organization_id: org.org,
                    name,
                    version,
                    package_type,
                    include_download_info: url,
                })
                .await?;
            Ok(CommandOutput::Package(descriptor))
        }

        Commands::List {
            org,
            name,
            version,
            package_type,
            url,
        } => {
            let packages = service
                .list_packages(ListPackagesRequest {
                    organization_id: org.org,
                    name,
                    version,
                    package_type,
                    include_download_info: url,
                })
                .await?;
            Ok(CommandOutput::Packages(packages))
        }

        Commands::Delete {
            org,
            package_type,
            packages,
        } => {
            let selectors = packages
                .iter()
                .map(|spec| {
                    let (name, version) = parse_name_version(spec).ok_or_else(|| {
                        CliError::InvalidArguments(format!("expected name@version, got `{spec}`"))
                    })?;
                    Ok(PackageSelector {
                        name: name.to_string(),
                        version: version.to_string(),
                        package_type,
                    })
                })
                .collect::<Result<Vec<_>, CliError>>()?;

            let response = service
                .delete_package(DeletePackageRequest {
                    organization_id: org.org,
                    packages: selectors,
                })
                .await;
            Ok(CommandOutput::Deleted(response))
        }

        Commands::Fetch { url, output } => fetch(&service, &config, &url, output).await,

        Commands::Sweep => {
            let reclaimed = service.sweep_abandoned().await?;
            Ok(CommandOutput::Swept { reclaimed })
        }
    }
}

/// Stream a file into the registry
async fn push(
    service: &PackageService,
    file: &Path,
    identity: PackageIdentity,
    checksum: Option<String>,
    chunk_size: usize,
) -> Result<CreatePackageResponse, CliError> {
    let declared = match checksum {
        Some(value) => {
            let expected: Checksum = value
                .parse()
                .map_err(|e| CliError::InvalidArguments(format!("--checksum: {e}")))?;
            if !pkgreg_hash::verify_file(file, &expected).await? {
                return Err(CliError::InvalidArguments(format!(
                    "{} does not match --checksum",
                    file.display()
                )));
            }
            expected
        }
        None => pkgreg_hash::hash_file(file, ChecksumAlgorithm::Blake3).await?,
    };

    let reader = tokio::fs::File::open(file).await?;
    let info = CreatePackageRequest::info(identity, Some(declared));

    let contents = stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let mut buffer = vec![0u8; chunk_size];
        match reader.read(&mut buffer).await {
            Ok(0) => None,
            Ok(n) => {
                buffer.truncate(n);
                Some((Ok(CreatePackageRequest::contents(buffer)), Some(reader)))
            }
            Err(e) => Some((Err(TransportError::Broken(e.to_string())), None)),
        }
    });
    let requests = stream::once(async move { Ok(info) }).chain(contents);

    Ok(service.create_package(requests).await?)
}

/// Resolve a signed URL to its blob and write it to `output`
async fn fetch(
    service: &PackageService,
    config: &Config,
    url: &str,
    output: PathBuf,
) -> Result<CommandOutput, CliError> {
    if config.urls.signing_key.is_none() {
        return Err(CliError::InvalidArguments(
            "fetch needs urls.signing_key (or PKGREG_SIGNING_KEY) to verify URLs".to_string(),
        ));
    }
    let issuer = url_issuer_from_config(&config.urls)?;
    let key = issuer.verify(url, Utc::now())?;
    let bytes = service.store().get(&key).await?;

    let file = tokio::fs::File::create(&output).await?;
    let (checksum, size) =
        pkgreg_hash::hash_and_copy(&bytes[..], file, ChecksumAlgorithm::Blake3).await?;

    Ok(CommandOutput::Fetched {
        path: output,
        size,
        checksum,
    })
}

fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,pkgreg=debug,pkgreg_service=debug,pkgreg_upload=debug,pkgreg_catalog=debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json_mode {
        // stdout carries the JSON result; logs stay on stderr
        builder.json().init();
    } else {
        builder.with_target(debug_enabled).init();
    }
}
