use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::constants::{CONNECT_TIMEOUT_S, FRAME_IDLE_TIMEOUT_S};
use crate::error::NetworkError;

/// Write `payload` as a 4-byte big-endian length prefix followed by the bytes.
pub async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> Result<(), NetworkError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| NetworkError::Framing("payload exceeds 4GiB frame limit".to_string()))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame, bounding the whole read by
/// [`FRAME_IDLE_TIMEOUT_S`] so a stalled peer cannot hang a handler forever.
pub async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>, NetworkError> {
    let timeout = Duration::from_secs(FRAME_IDLE_TIMEOUT_S);

    let mut len_buf = [0u8; 4];
    tokio::time::timeout(timeout, stream.read_exact(&mut len_buf))
        .await
        .map_err(|_| NetworkError::Framing("timed out reading frame length".to_string()))??;
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    tokio::time::timeout(timeout, stream.read_exact(&mut payload))
        .await
        .map_err(|_| NetworkError::Framing("timed out reading frame body".to_string()))??;
    Ok(payload)
}

/// Connect to `addr`, bounded by [`CONNECT_TIMEOUT_S`].
pub async fn connect(addr: SocketAddr) -> Result<TcpStream, NetworkError> {
    let timeout = Duration::from_secs(CONNECT_TIMEOUT_S);
    tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| NetworkError::Transport(std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")))?
        .map_err(NetworkError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn write_then_read_round_trips_a_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream).await.unwrap()
        });

        let mut client = connect(addr).await.unwrap();
        write_frame(&mut client, b"hello mesh").await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, b"hello mesh");
    }

    #[tokio::test]
    async fn read_frame_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream).await
        });

        let _client = connect(addr).await.unwrap();
        let result = server.await.unwrap();
        assert!(result.is_err());
    }
}
