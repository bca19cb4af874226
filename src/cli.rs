use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tailsend::config::{
    default_cert_path, default_key_path, ABOUT, AUTHOR, CHUNK_SIZE, LONG_ABOUT, NAME, VERSION,
};
use tailsend::{Destination, TlsSettings};

/// Resumable file upload CLI
#[derive(Parser)]
#[command(
    name = NAME,
    author = AUTHOR,
    version = VERSION,
    about = ABOUT,
    long_about = LONG_ABOUT,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a file, continuing a previous partial upload if the server has one
    Send {
        /// Server host name or address
        host: String,
        /// Server port
        port: u16,
        /// File to upload
        file: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        tls: TlsArgs,
        /// Bytes per streamed frame
        #[arg(long, default_value_t = CHUNK_SIZE)]
        chunk_size: usize,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the checksum and size the server will be told about
    Checksum {
        /// File to hash
        file: PathBuf,
    },

    /// Generate a self-signed client certificate and key
    Identity {
        /// Where to write the certificate
        #[arg(long, env = "TAILSEND_CERT")]
        cert: Option<PathBuf>,
        /// Where to write the private key
        #[arg(long, env = "TAILSEND_KEY")]
        key: Option<PathBuf>,
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

/// Where the server should put the file. Exactly one is required.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// Destination path on the server
    #[arg(long)]
    pub destination: Option<String>,
    /// Server-side identifier to store the file under
    #[arg(long)]
    pub uuid: Option<String>,
    /// Server directory to place the file in
    #[arg(long)]
    pub directory: Option<String>,
}

impl TargetArgs {
    pub fn selector(self) -> Option<Destination> {
        self.destination
            .map(Destination::Path)
            .or(self.uuid.map(Destination::Uuid))
            .or(self.directory.map(Destination::Directory))
    }
}

#[derive(Args)]
pub struct TlsArgs {
    /// Client certificate (PEM)
    #[arg(long, env = "TAILSEND_CERT")]
    pub cert: Option<PathBuf>,
    /// Client private key (PEM)
    #[arg(long, env = "TAILSEND_KEY")]
    pub key: Option<PathBuf>,
    /// Only trust servers whose certificate chains to these roots (PEM)
    #[arg(long, env = "TAILSEND_CA")]
    pub ca: Option<PathBuf>,
    /// Create a self-signed certificate and key if they do not exist
    #[arg(long)]
    pub generate_identity: bool,
}

impl TlsArgs {
    pub fn settings(self) -> TlsSettings {
        TlsSettings {
            cert_path: self.cert.unwrap_or_else(default_cert_path),
            key_path: self.key.unwrap_or_else(default_key_path),
            trusted_ca: self.ca,
            generate_missing: self.generate_identity,
        }
    }
}
