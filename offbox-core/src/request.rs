//! Intercepted request type.
//!
//! [`InterceptedRequest`] is what the host application hands over for every
//! outbound call: method, URI, headers, the declared destination and an
//! optional body (used by deferred writes).

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Uri, header};
use smol_str::SmolStr;

use crate::RequestIdentity;

/// Declared destination of a request, as reported by the client runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation to a page.
    Document,
    /// Image element or CSS image.
    Image,
    /// Script load.
    Script,
    /// Stylesheet load.
    Style,
    /// Web font load.
    Font,
    /// Programmatic fetch with no destination.
    #[default]
    Empty,
    /// Anything else.
    Other,
}

/// An outbound request captured from the client application.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    destination: Destination,
    body: Bytes,
}

impl InterceptedRequest {
    /// Creates a request with the given method and URI.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            destination: Destination::default(),
            body: Bytes::new(),
        }
    }

    /// Shortcut for a `GET` request.
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Sets the declared destination.
    pub fn with_destination(self, destination: Destination) -> Self {
        Self {
            destination,
            ..self
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..self
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the declared destination.
    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Returns the request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the lowercased host, if the URI is absolute.
    pub fn host(&self) -> Option<String> {
        self.uri.host().map(str::to_ascii_lowercase)
    }

    /// Returns the URI path, `/` when empty.
    pub fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            path => path,
        }
    }

    /// Returns the value of a query parameter.
    ///
    /// Values are returned raw, without percent-decoding.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    /// Whether this request is a page navigation or accepts HTML.
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
            || self
                .headers
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|accept| accept.contains("text/html"))
    }

    /// Computes the store identity of this request.
    pub fn identity(&self, vary: &[SmolStr]) -> RequestIdentity {
        RequestIdentity::new(&self.method, &self.uri, &self.headers, vary)
    }
}
