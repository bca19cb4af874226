use std::fmt;

use serde::{Deserialize, Serialize};

use super::CodecError;

/// Where the server should place the incoming file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Explicit destination path.
    Path(String),
    /// Server-side identifier.
    Uuid(String),
    /// Directory to drop the file into under its own name.
    Directory(String),
}

// client -> server, first frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub filename: String,
    pub destination: Destination,
    pub size: u64,
    pub checksum: Vec<u8>,
}

// server -> client, only frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerResponse {
    AlreadyDownloaded,
    ResumeAt(u64),
    Error(ServerErrorKind),
}

impl ServerResponse {
    const TAGS: u32 = 3;
}

/// Rejection reason reported by the server. Carried as a string on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ServerErrorKind {
    PermissionDenied,
    Other(String),
}

impl ServerErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ServerErrorKind::PermissionDenied => "permission_denied",
            ServerErrorKind::Other(kind) => kind,
        }
    }
}

impl From<String> for ServerErrorKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "permission_denied" | "permission-denied" | "eacces" => {
                ServerErrorKind::PermissionDenied
            }
            _ => ServerErrorKind::Other(kind),
        }
    }
}

impl From<&str> for ServerErrorKind {
    fn from(kind: &str) -> Self {
        ServerErrorKind::from(kind.to_string())
    }
}

impl From<ServerErrorKind> for String {
    fn from(kind: ServerErrorKind) -> Self {
        match kind {
            ServerErrorKind::PermissionDenied => "permission_denied".to_string(),
            ServerErrorKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes the server's response frame.
///
/// The variant tag is checked before the body so that a response from a newer
/// server shows up as [`CodecError::UnknownTag`] rather than a generic
/// deserialization failure.
pub fn decode_response(buf: &[u8]) -> Result<ServerResponse, CodecError> {
    let tag: u32 = bincode::deserialize(buf)?;
    if tag >= ServerResponse::TAGS {
        return Err(CodecError::UnknownTag(tag));
    }
    Ok(bincode::deserialize(buf)?)
}
