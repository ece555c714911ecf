use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use wreq::Client;
use wreq_util::Emulation;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Injected fetch capability. Implementations report every failure as a
/// [`FetchError`]; deciding what to do about it is the fetch policy's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Plain HTTP transport with browser TLS/header emulation.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .emulation(Emulation::Firefox136)
            .build()?;

        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, wreq::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(request.timeout, exchange).await {
            Err(_) => return Err(FetchError::Timeout),
            Ok(Err(e)) if e.is_timeout() => return Err(FetchError::Timeout),
            Ok(Err(e)) => return Err(FetchError::ConnectionRefused(e.to_string())),
            Ok(Ok(exchange)) => exchange,
        };

        debug!("GET {} -> {} ({} bytes)", request.url, status, body.len());

        if !(200..300).contains(&status) {
            return Err(FetchError::HttpStatus(status));
        }

        Ok(FetchResponse {
            url: request.url.clone(),
            status,
            body,
        })
    }
}
