//! Resumable single-file upload over a length-framed TLS channel.
//!
//! The client hashes the file, tells the server its name, size and digest,
//! and streams only the bytes the server reports as missing.
//!
//! ```no_run
//! use tailsend::{ClientConfig, Destination, TlsSettings, Uploader};
//!
//! # async fn run() -> Result<(), tailsend::TransferError> {
//! let config = ClientConfig::new(TlsSettings::new("cert.pem", "key.pem"));
//! let uploader = Uploader::new(&config)?;
//! let target = Destination::Directory("/backups".into());
//! let result = uploader
//!     .send_file("files.example.net", 4040, "backup.tar", target)
//!     .await?;
//! println!("sent {} of {} bytes", result.bytes_sent, result.file_size);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod utils;

pub use config::{ClientConfig, TlsSettings};
pub use error::{ErrorKind, TransferError};
pub use network::{send_file, Destination, ServerErrorKind, TransferResult, Uploader};
pub use utils::{hash_file, Checksum, FileAttributes};
