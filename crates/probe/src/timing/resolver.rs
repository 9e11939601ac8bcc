//! Host name resolution.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;

/// Resolves a host name to the socket addresses to try, in order
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.collect())
    }
}

/// Resolver returning fixed answers, for tests and pinned hosts
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    entries: Vec<(String, Vec<SocketAddr>)>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, addrs: Vec<SocketAddr>) -> Self {
        self.entries.push((host.into(), addrs));
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(host))
            .map(|(_, addrs)| addrs.iter().map(|addr| SocketAddr::new(addr.ip(), port)).collect())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("failed to lookup address for {host}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new()
            .with_host("example.test", vec!["127.0.0.1:0".parse().unwrap()]);

        let addrs = resolver.resolve("Example.Test", 8080).await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]);

        assert!(resolver.resolve("missing.test", 80).await.is_err());
    }

    #[tokio::test]
    async fn test_system_resolver_ip_literal() {
        let addrs = SystemResolver.resolve("127.0.0.1", 80).await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:80".parse::<SocketAddr>().unwrap()]);
    }
}
