//! Instrumented HTTP/1.1 transport.
//!
//! Each phase is performed explicitly (resolve, connect, TLS, request,
//! response) so the recorder can mark every boundary. No timeout is applied
//! here; callers bound `send` themselves.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use super::io::TimedStream;
use super::recorder::{Mark, PhaseRecorder};
use super::resolver::{Resolver, SystemResolver};
use crate::error::TransportError;
use crate::request::PreparedRequest;
use crate::types::Tuple;

/// Default cap on downloaded response bodies
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// What came back from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub code: u16,
    pub protocol: String,
    pub ip: String,
    pub headers: Vec<Tuple>,
    pub body: Vec<u8>,
    /// Body was cut at the configured maximum
    pub truncated: bool,
}

/// Build a rustls client config trusting the platform's root certificates
pub fn default_tls_config() -> Result<Arc<ClientConfig>, rustls::Error> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        warn!("Failed to load a native root certificate: {error}");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "Loaded native root certificates");

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Aborts the connection driver when the request is done or abandoned
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// HTTP transport that records phase timings for every request.
///
/// Cheap to clone and safe to share between concurrent executions; each
/// `send` opens its own connection.
#[derive(Clone)]
pub struct Transport {
    resolver: Arc<dyn Resolver>,
    tls: Arc<ClientConfig>,
    max_body_bytes: usize,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").field("max_body_bytes", &self.max_body_bytes).finish()
    }
}

impl Transport {
    pub fn new(resolver: Arc<dyn Resolver>, tls: Arc<ClientConfig>) -> Self {
        Self { resolver, tls, max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    /// Transport using the system resolver and native roots
    pub fn system() -> Result<Self, rustls::Error> {
        Ok(Self::new(Arc::new(SystemResolver), default_tls_config()?))
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Perform the request, marking phases on `recorder` as they complete
    pub async fn send(
        &self,
        request: &PreparedRequest,
        recorder: &PhaseRecorder,
    ) -> Result<ObservedResponse, TransportError> {
        let addrs = self.resolve(request, recorder).await?;
        let tcp = self.connect(&addrs, recorder).await?;
        let ip = recorder.remote().map(|addr| addr.ip().to_string()).unwrap_or_default();

        if request.is_tls() {
            recorder.mark(Mark::TlsStart);
            let server_name = ServerName::try_from(request.host().trim_matches(['[', ']']).to_string())
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            let tls = TlsConnector::from(self.tls.clone())
                .connect(server_name, tcp)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            recorder.mark(Mark::TlsEnd);

            self.exchange(TimedStream::new(tls, recorder.clone()), request, recorder, ip).await
        } else {
            self.exchange(TimedStream::new(tcp, recorder.clone()), request, recorder, ip).await
        }
    }

    async fn resolve(
        &self,
        request: &PreparedRequest,
        recorder: &PhaseRecorder,
    ) -> Result<Vec<SocketAddr>, TransportError> {
        let port = request.port();

        recorder.mark(Mark::DnsStart);
        let addrs = match request.url.host() {
            Some(url::Host::Ipv4(ip)) => vec![SocketAddr::new(IpAddr::V4(ip), port)],
            Some(url::Host::Ipv6(ip)) => vec![SocketAddr::new(IpAddr::V6(ip), port)],
            Some(url::Host::Domain(domain)) => self
                .resolver
                .resolve(domain, port)
                .await
                .map_err(|e| TransportError::Dns(e.to_string()))?,
            None => return Err(TransportError::Dns("missing host".to_string())),
        };
        recorder.mark(Mark::DnsEnd);

        if addrs.is_empty() {
            return Err(TransportError::Dns(format!("no addresses found for {}", request.host())));
        }

        Ok(addrs)
    }

    /// Try each resolved address in order until one accepts
    async fn connect(
        &self,
        addrs: &[SocketAddr],
        recorder: &PhaseRecorder,
    ) -> Result<TcpStream, TransportError> {
        recorder.mark(Mark::ConnectStart);

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    recorder.mark(Mark::ConnectEnd);
                    recorder.set_remote(*addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY on {addr}: {e}");
                    }
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Connect to {addr} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(TransportError::from_connect)
            .unwrap_or_else(|| TransportError::Connect("no address to connect to".to_string())))
    }

    async fn exchange<S>(
        &self,
        stream: TimedStream<S>,
        request: &PreparedRequest,
        recorder: &PhaseRecorder,
        ip: String,
    ) -> Result<ObservedResponse, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream)).await?;
        let _driver = AbortOnDrop(tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Connection closed with error: {e}");
            }
        }));

        let uri: Uri = request
            .target()
            .parse()
            .map_err(|e: http::uri::InvalidUri| TransportError::Protocol(e.to_string()))?;

        let mut outgoing = Request::new(Full::new(request.body.clone()));
        *outgoing.method_mut() = request.method.clone();
        *outgoing.uri_mut() = uri;
        *outgoing.headers_mut() = request.headers.clone();

        let response = sender.send_request(outgoing).await?;

        let code = response.status().as_u16();
        let protocol = format!("{:?}", response.version());
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect();

        let (body, truncated) = self.download(response.into_body()).await?;
        recorder.mark(Mark::End);

        Ok(ObservedResponse { code, protocol, ip, headers, body, truncated })
    }

    async fn download(
        &self,
        mut body: hyper::body::Incoming,
    ) -> Result<(Vec<u8>, bool), TransportError> {
        let mut collected = Vec::new();

        while let Some(frame) = body.frame().await {
            let Ok(data) = frame?.into_data() else {
                continue;
            };
            let room = self.max_body_bytes.saturating_sub(collected.len());
            if data.len() > room {
                collected.extend_from_slice(&data[..room]);
                return Ok((collected, true));
            }
            collected.extend_from_slice(&data);
        }

        Ok((collected, false))
    }
}
