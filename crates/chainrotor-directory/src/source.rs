//! Where the catalog comes from.

use async_trait::async_trait;

use crate::catalog::ChainInfo;
use crate::config::DirectoryConfig;
use crate::error::DirectoryError;

/// A remote (or fake) provider of the full catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Vec<ChainInfo>, DirectoryError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> &str;
}

/// One HTTP GET against a chainlist-style URL.
pub struct HttpCatalogSource {
    url: String,
    http: reqwest::Client,
}

impl HttpCatalogSource {
    pub fn new(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("chainrotor/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.fetch_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()
            .map_err(|e| DirectoryError::Fetch(e.to_string()))?;
        Ok(Self { url: config.catalog_url.clone(), http })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<Vec<ChainInfo>, DirectoryError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DirectoryError::Fetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DirectoryError::Status { status: resp.status().as_u16() });
        }

        let body = resp.bytes().await.map_err(|e| DirectoryError::Fetch(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn describe(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = sock.write_all(reply.as_bytes()).await;
            let _ = sock.shutdown().await;
        });
        format!("http://{addr}/rpcs.json")
    }

    fn source_for(url: String) -> HttpCatalogSource {
        let config = DirectoryConfig { catalog_url: url, ..Default::default() };
        HttpCatalogSource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_parses_catalog() {
        let url = serve_once("200 OK", r#"[{"chainId":1,"name":"Ethereum","rpc":[{"url":"https://a"}]}]"#).await;
        let catalog = source_for(url).fetch().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].rpc[0].url, "https://a");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let url = serve_once("502 Bad Gateway", "").await;
        let err = source_for(url).fetch().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Status { status: 502 }));
    }

    #[tokio::test]
    async fn non_array_body_is_a_parse_error() {
        let url = serve_once("200 OK", r#"{"chains":[]}"#).await;
        let err = source_for(url).fetch().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Parse(_)));
    }

    #[tokio::test]
    async fn untimed_source_still_fetches() {
        let url = serve_once("200 OK", r#"[{"chainId":10,"name":"OP Mainnet","rpc":[]}]"#).await;
        let config = DirectoryConfig { catalog_url: url, fetch_timeout_secs: 0, ..Default::default() };
        let catalog = HttpCatalogSource::new(&config).unwrap().fetch().await.unwrap();
        assert_eq!(catalog[0].chain_id, 10);
    }
}
