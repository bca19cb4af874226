mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use tailsend::config::{default_cert_path, default_key_path};
use tailsend::network::generate_identity;
use tailsend::utils::get_file_length;
use tailsend::{hash_file, ClientConfig, Destination, TlsSettings, Uploader};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send { host, port, file, target, tls, chunk_size, timeout } => {
            let Some(destination) = target.selector() else {
                eprintln!("error: one of --destination, --uuid or --directory is required");
                return ExitCode::FAILURE;
            };
            let config = ClientConfig::new(tls.settings()).chunk_size(chunk_size);
            send(config, &host, port, &file, destination, timeout).await
        }
        Commands::Checksum { file } => match checksum(&file).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error hashing {}: {err}", file.display());
                ExitCode::FAILURE
            }
        },
        Commands::Identity { cert, key, force } => {
            let cert = cert.unwrap_or_else(default_cert_path);
            let key = key.unwrap_or_else(default_key_path);
            match identity(cert, key, force) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("Error generating identity: {err:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn send(
    config: ClientConfig,
    host: &str,
    port: u16,
    file: &Path,
    destination: Destination,
    timeout: Option<u64>,
) -> ExitCode {
    let uploader = match Uploader::new(&config) {
        Ok(uploader) => uploader,
        Err(err) => {
            eprintln!("error {}: {err}", err.kind());
            return ExitCode::FAILURE;
        }
    };

    let call = uploader.send_file(host, port, file, destination);
    let outcome = match timeout {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                // The upload future is dropped here, closing the connection.
                eprintln!("error timeout: no result after {secs}s");
                return ExitCode::FAILURE;
            }
        },
        None => call.await,
    };

    match outcome {
        Ok(result) => {
            println!("ok {} {}", result.bytes_sent, result.file_size);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error {}: {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

async fn checksum(file: &Path) -> std::io::Result<()> {
    let size = get_file_length(file).await?;
    let digest = hash_file(file).await?;
    println!("{digest}  {size}  {}", file.display());
    Ok(())
}

fn identity(cert: PathBuf, key: PathBuf, force: bool) -> anyhow::Result<()> {
    if !force && (cert.exists() || key.exists()) {
        anyhow::bail!(
            "{} or {} already exists, pass --force to overwrite",
            cert.display(),
            key.display()
        );
    }
    generate_identity(&cert, &key)?;

    // Make sure what was written loads back the way uploads will use it.
    let settings = TlsSettings::new(&cert, &key);
    tailsend::network::load_or_generate_identity(&settings)?;
    println!("certificate: {}", cert.display());
    println!("key: {}", key.display());
    Ok(())
}
