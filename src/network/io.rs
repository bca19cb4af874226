use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::MAX_FRAME_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error("connection closed before a frame was received")]
    Closed,

    #[error("unknown response tag {0}")]
    UnknownTag(u32),

    #[error("malformed payload: {0}")]
    Payload(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes `payload` preceded by its length as a 4-byte big-endian integer.
pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<(), CodecError>
where
    S: AsyncWrite + Unpin
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }
    let len = (payload.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(payload).await?;
    Ok(())
}

/// Reads one frame. Returns `None` when the peer closed the stream cleanly
/// between frames.
pub async fn read_frame<S>(stream: &mut S) -> Result<Option<Vec<u8>>, CodecError>
where
    S: AsyncRead + Unpin
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = stream.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

pub async fn send_message<T, S>(stream: &mut S, msg: &T) -> Result<(), CodecError>
where
    T: Serialize,
    S: AsyncWrite + Unpin
{
    let data = bincode::serialize(msg)?;
    write_frame(stream, &data).await?;
    stream.flush().await?;
    Ok(())
}

pub async fn recv_message<T, S>(stream: &mut S) -> Result<T, CodecError>
where
    T: DeserializeOwned,
    S: AsyncRead + Unpin
{
    let buf = read_frame(stream).await?.ok_or(CodecError::Closed)?;
    Ok(bincode::deserialize(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_has_big_endian_length_prefix() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"abc").await.unwrap();
        assert_eq!(buf, [0, 0, 0, 3, b'a', b'b', b'c']);

        let mut cursor = &buf[..];
        assert_eq!(read_frame(&mut cursor).await.unwrap().unwrap(), b"abc");
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_frame_is_not_end_of_stream() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"").await.unwrap();

        let mut cursor = &buf[..];
        assert_eq!(read_frame(&mut cursor).await.unwrap(), Some(Vec::new()));
        assert_eq!(read_frame(&mut cursor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_header_is_an_error() {
        let mut cursor: &[u8] = &[0, 0];
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, CodecError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn truncated_payload_is_an_error() {
        let mut cursor: &[u8] = &[0, 0, 0, 5, 1, 2];
        assert!(matches!(read_frame(&mut cursor).await, Err(CodecError::Io(_))));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let len = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
        let mut cursor: &[u8] = &len;
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(n) if n == MAX_FRAME_SIZE + 1));
    }

    #[tokio::test]
    async fn recv_on_closed_stream() {
        let mut cursor: &[u8] = &[];
        let err = recv_message::<u64, _>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, CodecError::Closed));
    }

    #[tokio::test]
    async fn messages_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        send_message(&mut client, &(String::from("movie.mkv"), 42u64)).await.unwrap();
        let got: (String, u64) = recv_message(&mut server).await.unwrap();

        assert_eq!(got, ("movie.mkv".to_string(), 42));
    }
}
