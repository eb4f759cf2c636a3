//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound outbound connection establishment
//! - Bound the silence tolerated on a single read
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - An elapsed deadline surfaces as `io::ErrorKind::TimedOut`, so callers
//!   treat it like any other I/O failure
//! - `None` means no deadline

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::TcpStream;

/// Await `fut`, failing with `TimedOut` if `limit` elapses first.
pub async fn with_deadline<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no progress within {:?}", limit),
            )),
        },
        None => fut.await,
    }
}

/// Open a TCP connection to `host:port` within `limit`.
pub async fn connect(host: &str, port: u16, limit: Option<Duration>) -> io::Result<TcpStream> {
    with_deadline(limit, TcpStream::connect((host, port))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn deadline_elapses() {
        let err = with_deadline(Some(Duration::from_millis(20)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, io::Error>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn no_deadline_passes_through() {
        let value = with_deadline(None, async { Ok::<_, io::Error>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn connect_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect("127.0.0.1", port, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }
}
