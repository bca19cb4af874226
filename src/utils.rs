use std::fmt;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::config::CHUNK_SIZE;
use crate::error::Fault;

/// blake3 digest of a file's full content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; blake3::OUT_LEN]);

impl Checksum {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Checksum {
    fn from(hash: blake3::Hash) -> Self {
        Checksum(*hash.as_bytes())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

/// Snapshot of the local file taken before talking to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub size: u64,
    pub checksum: Checksum,
    pub basename: String,
}

pub async fn hash_file(path: &Path) -> std::io::Result<Checksum> {
    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 { break; }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

pub async fn get_file_length(path: &Path) -> std::io::Result<u64> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(meta.len())
}

/// Reads size, digest and file name of `path`.
///
/// Fails with [`Fault::InvalidPath`] when the path has no file name or the
/// name is not valid UTF-8. Size comes from a metadata query, separate from
/// the hashing pass. No lock is taken, so a file modified concurrently may
/// yield a size and digest that do not describe the same content.
pub(crate) async fn read_attributes(path: &Path) -> Result<FileAttributes, Fault> {
    let local = |source| Fault::LocalFile { path: path.to_path_buf(), source };

    // .../.../test.txt -> test.txt; the name goes on the wire, so it must be UTF-8
    let basename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Fault::InvalidPath(PathBuf::from(path)))?;

    let size = get_file_length(path).await.map_err(local)?;
    let checksum = hash_file(path).await.map_err(local)?;

    Ok(FileAttributes { size, checksum, basename })
}
