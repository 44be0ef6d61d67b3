use crate::error::{Result, WriteError};
use futures::future::BoxFuture;
use log::trace;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::{Duration, Instant};

pub const LINE_PROTOCOL_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// One POST to the write endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub url: Url,
    pub body: String,
    pub timeout: Duration,
}

/// What came back from the server. Any status, including non-2xx, counts as a
/// response; only the absence of one is a transport error.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub status: u16,
    pub body: String,
}

pub trait Transport: Send + Sync {
    fn post(&self, request: WriteRequest) -> BoxFuture<'_, Result<WriteResponse>>;
}

/// `Transport` backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: WriteRequest) -> BoxFuture<'_, Result<WriteResponse>> {
        Box::pin(async move {
            let function_start = Instant::now();
            let response = self
                .client
                .post(request.url)
                .header(CONTENT_TYPE, LINE_PROTOCOL_CONTENT_TYPE)
                .timeout(request.timeout)
                .body(request.body)
                .send()
                .await
                .map_err(|error| WriteError::Transport(Box::new(error)))?;

            let status = response.status().as_u16();
            // The body only carries diagnostics; losing it is not a failure
            let body = response.text().await.unwrap_or_default();
            trace!("post duration: {:?}", function_start.elapsed());
            Ok(WriteResponse { status, body })
        })
    }
}
