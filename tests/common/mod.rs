//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use caching_proxy::net::Listener;
use caching_proxy::{ProxyConfig, ProxyServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Upper bound on any single client exchange in these tests.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A mock origin server answering every connection with the same bytes.
pub struct MockOrigin {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockOrigin {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Format a minimal HTTP/1.0 response carrying `body`.
pub fn http_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.0 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Start a mock origin that returns a fixed 200 response with `body`.
pub async fn start_mock_origin(body: &str) -> MockOrigin {
    start_raw_origin(http_response(body)).await
}

/// Start a mock origin that writes `response` verbatim, then closes.
pub async fn start_raw_origin(response: Vec<u8>) -> MockOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let response = Arc::new(response);

    let origin = MockOrigin {
        addr,
        connections: Arc::clone(&connections),
        requests: Arc::clone(&requests),
    };

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let response = Arc::clone(&response);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        requests.lock().unwrap().push(head);
                        let _ = socket.write_all(&response).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    origin
}

/// Start an origin that accepts connections and never answers.
pub async fn start_silent_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Start a TCP server that echoes bytes back until the client half-closes.
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    addr
}

/// Start a TCP server that writes `reply` to each client and closes at once.
pub async fn start_parting_server(reply: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(reply).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Test configuration pointing the forwarder at `origin_port`.
pub fn proxy_config(origin_port: u16) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.http_port = origin_port;
    config.timeouts.connect_secs = 2;
    config.timeouts.idle_secs = 5;
    config
}

/// A running proxy on an ephemeral loopback port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub server: ProxyServer,
    shutdown: Shutdown,
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy with `config`; the bind address is ignored.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inner.local_addr().unwrap();
    let listener = Listener::from_listener(inner, config.listener.max_connections);

    let server = ProxyServer::new(&config);
    let handle = server.clone();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    TestProxy {
        addr,
        server: handle,
        shutdown,
    }
}

/// Send `request`, half-close, and read until the proxy closes the
/// connection.
pub async fn exchange(proxy: SocketAddr, request: &[u8]) -> io::Result<Vec<u8>> {
    tokio::time::timeout(CLIENT_TIMEOUT, async {
        let mut stream = TcpStream::connect(proxy).await?;
        stream.write_all(request).await?;
        stream.shutdown().await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok::<_, io::Error>(response)
    })
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "proxy did not close the connection"))?
}

/// GET `url` through the proxy and return the raw response.
pub async fn get(proxy: SocketAddr, url: &str) -> Vec<u8> {
    let request = format!(
        "GET {} HTTP/1.0\r\nUser-Agent: proxy-test\r\nAccept: */*\r\n\r\n",
        url
    );
    exchange(proxy, request.as_bytes()).await.unwrap()
}

/// Open a CONNECT tunnel to `target` and consume the 200 line.
pub async fn open_tunnel(proxy: SocketAddr, target: &str) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n\r\n", target, target);
    stream.write_all(request.as_bytes()).await.unwrap();

    let expected = caching_proxy::proxy::tunnel::CONNECTION_ESTABLISHED;
    let mut status = vec![0u8; expected.len()];
    tokio::time::timeout(CLIENT_TIMEOUT, stream.read_exact(&mut status))
        .await
        .expect("tunnel was not acknowledged")
        .unwrap();
    assert_eq!(status, expected);
    stream
}

/// Poll `condition` until it holds or `CLIENT_TIMEOUT` passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + CLIENT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
