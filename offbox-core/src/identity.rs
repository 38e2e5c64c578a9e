//! Request identity used as the artifact store key.
//!
//! A [`RequestIdentity`] is the tuple `(method, normalized URL, header subset)`.
//! Two requests with equal identities are interchangeable cache entries.
//!
//! ## Normalization
//!
//! - scheme and host are lowercased
//! - the default port of the scheme is dropped
//! - an empty path becomes `/`
//! - only the configured header names take part, lowercased and sorted
//!
//! ```
//! use http::{HeaderMap, Method, Uri};
//! use offbox_core::RequestIdentity;
//!
//! let uri: Uri = "HTTPS://App.Example:443/card.html?id=42".parse().unwrap();
//! let identity = RequestIdentity::new(&Method::GET, &uri, &HeaderMap::new(), &[]);
//! assert_eq!(identity.url(), "https://app.example/card.html?id=42");
//! assert_eq!(format!("{}", identity), "GET https://app.example/card.html?id=42");
//! ```
//!
//! ## Performance
//!
//! [`RequestIdentity`] uses `Arc` internally, copying an identity only
//! increments a reference count.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use http::{HeaderMap, Method, Uri};
use smol_str::SmolStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
struct IdentityInner {
    method: SmolStr,
    url: String,
    headers: Vec<(SmolStr, SmolStr)>,
}

/// Store key identifying a request.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(from = "IdentityInner", into = "IdentityInner")]
pub struct RequestIdentity {
    inner: Arc<IdentityInner>,
}

impl PartialEq for RequestIdentity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for RequestIdentity {}

impl Hash for RequestIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<IdentityInner> for RequestIdentity {
    fn from(inner: IdentityInner) -> Self {
        RequestIdentity {
            inner: Arc::new(inner),
        }
    }
}

impl From<RequestIdentity> for IdentityInner {
    fn from(identity: RequestIdentity) -> Self {
        Arc::try_unwrap(identity.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.inner.method, self.inner.url)?;
        for (i, (name, value)) in self.inner.headers.iter().enumerate() {
            if i == 0 {
                write!(f, " [")?;
            } else {
                write!(f, "&")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        if !self.inner.headers.is_empty() {
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl RequestIdentity {
    /// Builds the identity of a request.
    ///
    /// `vary` lists the header names that take part in the identity. Headers
    /// missing from the request are recorded with an empty value so that
    /// "absent" and "present" never collide.
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap, vary: &[SmolStr]) -> Self {
        let mut subset: Vec<(SmolStr, SmolStr)> = vary
            .iter()
            .map(|name| {
                let name = SmolStr::new(name.to_ascii_lowercase());
                let value = headers
                    .get(name.as_str())
                    .and_then(|v| v.to_str().ok())
                    .map(SmolStr::new)
                    .unwrap_or_default();
                (name, value)
            })
            .collect();
        subset.sort();
        subset.dedup_by(|a, b| a.0 == b.0);

        RequestIdentity {
            inner: Arc::new(IdentityInner {
                method: SmolStr::new(method.as_str()),
                url: normalize_url(uri),
                headers: subset,
            }),
        }
    }

    /// Identity of a plain `GET` for the given URI, without header subset.
    pub fn get(uri: &Uri) -> Self {
        Self::new(&Method::GET, uri, &HeaderMap::new(), &[])
    }

    /// Returns the request method.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Returns the normalized URL.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Returns the header subset taking part in the identity.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Renders the normalized form of a URI.
pub fn normalize_url(uri: &Uri) -> String {
    let path = match uri.path_and_query() {
        Some(pq) if pq.path().is_empty() => match pq.query() {
            Some(query) => format!("/?{query}"),
            None => "/".to_owned(),
        },
        Some(pq) => pq.as_str().to_owned(),
        None => "/".to_owned(),
    };

    let Some(host) = uri.host() else {
        return path;
    };

    let scheme = uri
        .scheme_str()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "https".to_owned());
    let default_port = match scheme.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    let port = uri
        .port_u16()
        .filter(|port| Some(*port) != default_port)
        .map(|port| format!(":{port}"))
        .unwrap_or_default();

    format!("{scheme}://{}{port}{path}", host.to_ascii_lowercase())
}
