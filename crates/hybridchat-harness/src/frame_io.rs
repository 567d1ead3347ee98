//! Length-prefixed frame I/O over simulated TCP.
//!
//! Same framing as the QUIC transport, except that one TCP stream carries
//! many request/response pairs back to back.

use std::io::{self, ErrorKind};

use hybridchat_proto::codec;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one frame body. `None` if the peer closed the stream between frames.
pub async fn read_body<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; codec::PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {},
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = codec::body_length(prefix).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(body))
}

/// Encode `value` as one frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    value: &T,
) -> io::Result<()> {
    let frame = codec::to_frame(value).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}
