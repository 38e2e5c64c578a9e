//! Network fetch through reqwest-middleware.

use std::time::Duration;

use async_trait::async_trait;
use offbox_core::{Fetch, FetchError, InterceptedRequest, ResponseSnapshot};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::{debug, trace};

/// Sends intercepted requests over HTTP.
///
/// Any response, whatever its status, is a successful fetch. Connection
/// failures map to [`FetchError::Unreachable`], everything else the client
/// or a middleware reports maps to [`FetchError::Transport`].
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: ClientWithMiddleware,
    timeout: Option<Duration>,
}

impl ReqwestFetch {
    /// Wraps a plain client without middleware.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_middleware(ClientBuilder::new(client).build())
    }

    /// Wraps a client with a middleware stack.
    pub fn with_middleware(client: ClientWithMiddleware) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Per-request timeout. A timed out request is a transport failure.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, FetchError> {
        let url = request.uri().to_string();
        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(request.headers().clone());
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|error| map_error(&url, error))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|error| FetchError::Transport(Box::new(error)))?;
        trace!(%url, %status, len = body.len(), "Fetched");
        Ok(ResponseSnapshot::new(status, headers, body))
    }
}

fn map_error(url: &str, error: reqwest_middleware::Error) -> FetchError {
    debug!(url, %error, "Fetch failed");
    match error {
        reqwest_middleware::Error::Reqwest(error) if error.is_connect() => {
            FetchError::Unreachable(format!("{url}: {error}"))
        }
        reqwest_middleware::Error::Reqwest(error) => FetchError::Transport(Box::new(error)),
        reqwest_middleware::Error::Middleware(error) => FetchError::Transport(error.into()),
    }
}
