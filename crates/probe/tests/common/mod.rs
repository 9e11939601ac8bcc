//! Local HTTP servers returning canned responses.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use probe::timing::{Resolver, StaticResolver, Transport, default_tls_config};
use probe::{Executor, ExecutorOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub struct CannedServer {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<String>,
}

impl CannedServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Serve `response` verbatim to every connection, recording each request
pub async fn serve(response: &'static str) -> CannedServer {
    serve_delayed(response, Duration::ZERO).await
}

pub async fn serve_delayed(response: &'static str, delay: Duration) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, requests) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                tokio::time::sleep(delay).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    CannedServer { addr, requests }
}

/// Write `bytes` as soon as a connection is accepted, without reading first
pub async fn serve_raw(bytes: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(bytes).await;
                // Drain until the client gives up so it never sees a reset
                let mut rest = Vec::new();
                let _ = socket.read_to_end(&mut rest).await;
            });
        }
    });

    addr
}

/// Accept connections and never answer
pub async fn serve_silent() -> SocketAddr {
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

/// Address nothing is listening on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if raw.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&raw).into_owned()
}

pub fn executor() -> Executor {
    executor_with(StaticResolver::new())
}

pub fn executor_with(resolver: impl Resolver + 'static) -> Executor {
    let transport = Transport::new(Arc::new(resolver), default_tls_config().unwrap());
    Executor::new(transport, options())
}

pub fn executor_with_options(options: ExecutorOptions) -> Executor {
    let transport = Transport::new(Arc::new(StaticResolver::new()), default_tls_config().unwrap());
    Executor::new(transport, options)
}

pub fn options() -> ExecutorOptions {
    ExecutorOptions {
        location: "test".to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}
