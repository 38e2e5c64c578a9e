//! Versioned orchestration configuration.
//!
//! An [`OfflineConfig`] describes one deployed version of the client
//! application: which assets form the shell, how requests are classified,
//! how generations are named and what is served when the network is gone.
//! A new version is rolled out by installing a new configuration.
//!
//! Configurations are built in code with [`OfflineConfig::builder`] or
//! loaded from YAML with [`OfflineConfig::from_yaml`]:
//!
//! ```
//! use offbox::OfflineConfig;
//!
//! let config = OfflineConfig::from_yaml(r#"
//! version: v2
//! prefix: shop
//! origin: https://shop.example.com
//! api_host: api.example.com
//! essential_assets: ["/", "/product.html", "/offline.html"]
//! page_template: { path: /product.html, param: id }
//! fallback_page: /offline.html
//! media_hosts: [images.example.com]
//! external_hosts: [gstatic.com, cdn.jsdelivr.net]
//! replay: { step: 10s, max: 5m }
//! "#).unwrap();
//!
//! assert_eq!(config.generation_name(offbox::Category::Pages), "shop-pages-v2");
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use http::Uri;
use offbox_core::{Category, InterceptedRequest};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};
use thiserror::Error;

use crate::queue::ReplayBackoff;

const DEFAULT_OFFLINE_PAGE: &str = "<!DOCTYPE html><html><head><title>Offline</title></head>\
<body><h1>You are offline</h1><p>This page is not available without a connection.</p></body></html>";

const DEFAULT_PLACEHOLDER_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"200\" height=\"200\" \
viewBox=\"0 0 200 200\"><rect width=\"200\" height=\"200\" fill=\"#eeeeee\"/>\
<text x=\"100\" y=\"105\" font-family=\"sans-serif\" font-size=\"16\" fill=\"#999999\" \
text-anchor=\"middle\">Image Offline</text></svg>";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be deserialized.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// The version label is empty.
    #[error("configuration version must not be empty")]
    EmptyVersion,
    /// The origin is not an absolute URL with a host.
    #[error("invalid origin {0:?}: expected an absolute URL such as https://app.example.com")]
    InvalidOrigin(String),
    /// A same-origin path does not start with `/`.
    #[error("path {0:?} must start with '/'")]
    RelativePath(String),
    /// The fallback page is not pre-seeded at install time.
    #[error("fallback page {0:?} must be one of the essential assets")]
    FallbackNotEssential(String),
}

/// Page template served for many items, selected by a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTemplate {
    /// Template path, e.g. `/product.html`.
    pub path: String,
    /// Name of the identifying query parameter, e.g. `id`.
    #[serde(default = "default_param")]
    pub param: String,
}

fn default_param() -> String {
    "id".to_owned()
}

/// Non-GET request route whose failed deliveries are deferred and replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRoute {
    /// Host the route lives on. `None` means the app origin or the API host.
    #[serde(default)]
    pub host: Option<String>,
    /// Path prefix, e.g. `/api/orders`.
    pub path_prefix: String,
}

impl WriteRoute {
    /// Creates a route matching any path under `path_prefix`.
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            host: None,
            path_prefix: path_prefix.into(),
        }
    }

    /// Restricts the route to a host.
    pub fn on_host(self, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into().to_ascii_lowercase()),
            ..self
        }
    }
}

/// Periodic cleanup limits for non-static generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    /// Entries fetched longer ago than this are deleted (e.g. "7d").
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,
    /// Oldest entries beyond this count are deleted.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            max_age: Some(Duration::from_secs(7 * 24 * 60 * 60)),
            max_entries: Some(200),
        }
    }
}

fn default_prefix() -> SmolStr {
    SmolStr::new_static("offbox")
}

fn default_offline_page() -> String {
    DEFAULT_OFFLINE_PAGE.to_owned()
}

fn default_placeholder_svg() -> String {
    DEFAULT_PLACEHOLDER_SVG.to_owned()
}

/// Configuration of one application version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Version label. Part of every default generation name.
    pub version: SmolStr,
    /// Generation name prefix.
    #[serde(default = "default_prefix")]
    pub prefix: SmolStr,
    /// Absolute origin of the application, e.g. `https://shop.example.com`.
    pub origin: String,
    /// Host serving the API.
    #[serde(default)]
    pub api_host: Option<String>,
    /// Same-origin paths pre-seeded at install time.
    #[serde(default)]
    pub essential_assets: Vec<String>,
    /// Page template for dynamic pages.
    #[serde(default)]
    pub page_template: Option<PageTemplate>,
    /// Essential page served when a page cannot be fetched nor found stored.
    #[serde(default)]
    pub fallback_page: Option<String>,
    /// Hosts whose responses are treated as images.
    #[serde(default)]
    pub media_hosts: Vec<String>,
    /// Foreign hosts (CDNs, fonts) cached as external resources.
    #[serde(default)]
    pub external_hosts: Vec<String>,
    /// Request headers that are part of the store identity.
    #[serde(default)]
    pub vary_headers: Vec<SmolStr>,
    /// Generation name overrides per category.
    #[serde(default)]
    pub generations: BTreeMap<Category, SmolStr>,
    /// HTML served to navigations that cannot be satisfied.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,
    /// SVG served for images that cannot be satisfied.
    #[serde(default = "default_placeholder_svg")]
    pub placeholder_svg: String,
    /// Routes whose failed writes are deferred.
    #[serde(default)]
    pub write_routes: Vec<WriteRoute>,
    /// Backoff between replay attempts.
    #[serde(default)]
    pub replay: ReplayBackoff,
    /// Periodic cleanup limits.
    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

impl OfflineConfig {
    /// Creates a builder for the given version and origin.
    pub fn builder(version: impl Into<SmolStr>, origin: impl Into<String>) -> OfflineConfigBuilder {
        OfflineConfigBuilder::new(version, origin)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: OfflineConfig =
            serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.normalized().validate()
    }

    /// Serializes the configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_saphyr::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    fn normalized(mut self) -> Self {
        self.api_host = self.api_host.map(|host| host.to_ascii_lowercase());
        for host in self.media_hosts.iter_mut().chain(self.external_hosts.iter_mut()) {
            host.make_ascii_lowercase();
        }
        for route in &mut self.write_routes {
            route.host = route.host.take().map(|host| host.to_ascii_lowercase());
        }
        self.vary_headers = self
            .vary_headers
            .iter()
            .map(|name| SmolStr::new(name.to_ascii_lowercase()))
            .collect();
        self.vary_headers.sort();
        self.vary_headers.dedup();
        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        self.origin_uri()?;
        let same_origin_paths = self
            .essential_assets
            .iter()
            .chain(self.page_template.iter().map(|template| &template.path))
            .chain(self.fallback_page.iter())
            .chain(self.write_routes.iter().map(|route| &route.path_prefix));
        for path in same_origin_paths {
            if !path.starts_with('/') {
                return Err(ConfigError::RelativePath(path.clone()));
            }
        }
        if let Some(fallback) = &self.fallback_page
            && !self.essential_assets.contains(fallback)
        {
            return Err(ConfigError::FallbackNotEssential(fallback.clone()));
        }
        Ok(self)
    }

    fn origin_uri(&self) -> Result<Uri, ConfigError> {
        let invalid = || ConfigError::InvalidOrigin(self.origin.clone());
        let uri: Uri = self.origin.parse().map_err(|_| invalid())?;
        if uri.scheme().is_none() || uri.host().is_none() {
            return Err(invalid());
        }
        Ok(uri)
    }

    /// Lowercased host of the application origin.
    pub fn origin_host(&self) -> String {
        self.origin_uri()
            .ok()
            .and_then(|uri| uri.host().map(str::to_ascii_lowercase))
            .unwrap_or_default()
    }

    /// Absolute URI of a same-origin path.
    pub fn asset_uri(&self, path: &str) -> Result<Uri, ConfigError> {
        let origin = self.origin.trim_end_matches('/');
        format!("{origin}{path}")
            .parse()
            .map_err(|_| ConfigError::RelativePath(path.to_owned()))
    }

    /// Name of the current generation for a category.
    ///
    /// Defaults to `{prefix}-{category}-{version}`.
    pub fn generation_name(&self, category: Category) -> SmolStr {
        self.generations
            .get(&category)
            .cloned()
            .unwrap_or_else(|| format_smolstr!("{}-{}-{}", self.prefix, category, self.version))
    }

    /// Current generation names of every category.
    pub fn generation_names(&self) -> Vec<(Category, SmolStr)> {
        Category::ALL
            .into_iter()
            .map(|category| (category, self.generation_name(category)))
            .collect()
    }

    /// Whether a failed request should be deferred instead of failing.
    pub fn is_write_route(&self, request: &InterceptedRequest) -> bool {
        if matches!(*request.method(), http::Method::GET | http::Method::HEAD) {
            return false;
        }
        let host = request.host();
        self.write_routes.iter().any(|route| {
            let host_matches = match (&route.host, &host) {
                (Some(expected), Some(actual)) => expected == actual,
                (Some(_), None) => false,
                (None, None) => true,
                (None, Some(actual)) => {
                    *actual == self.origin_host() || self.api_host.as_ref() == Some(actual)
                }
            };
            host_matches && request.path().starts_with(&route.path_prefix)
        })
    }
}

/// Builder for [`OfflineConfig`].
///
/// Use [`OfflineConfig::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct OfflineConfigBuilder {
    config: OfflineConfig,
}

impl OfflineConfigBuilder {
    /// Creates a builder with defaults for everything but version and origin.
    pub fn new(version: impl Into<SmolStr>, origin: impl Into<String>) -> Self {
        Self {
            config: OfflineConfig {
                version: version.into(),
                prefix: default_prefix(),
                origin: origin.into(),
                api_host: None,
                essential_assets: Vec::new(),
                page_template: None,
                fallback_page: None,
                media_hosts: Vec::new(),
                external_hosts: Vec::new(),
                vary_headers: Vec::new(),
                generations: BTreeMap::new(),
                offline_page: default_offline_page(),
                placeholder_svg: default_placeholder_svg(),
                write_routes: Vec::new(),
                replay: ReplayBackoff::default(),
                cleanup: CleanupPolicy::default(),
            },
        }
    }

    /// Sets the generation name prefix.
    pub fn prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Sets the API host.
    pub fn api_host(mut self, host: impl Into<String>) -> Self {
        self.config.api_host = Some(host.into());
        self
    }

    /// Adds essential asset paths.
    pub fn essential_assets<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .essential_assets
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Sets the page template.
    pub fn page_template(mut self, path: impl Into<String>, param: impl Into<String>) -> Self {
        self.config.page_template = Some(PageTemplate {
            path: path.into(),
            param: param.into(),
        });
        self
    }

    /// Sets the fallback page path.
    pub fn fallback_page(mut self, path: impl Into<String>) -> Self {
        self.config.fallback_page = Some(path.into());
        self
    }

    /// Adds a media host.
    pub fn media_host(mut self, host: impl Into<String>) -> Self {
        self.config.media_hosts.push(host.into());
        self
    }

    /// Adds an external host.
    pub fn external_host(mut self, host: impl Into<String>) -> Self {
        self.config.external_hosts.push(host.into());
        self
    }

    /// Adds a header to the store identity.
    pub fn vary_header(mut self, name: impl Into<SmolStr>) -> Self {
        self.config.vary_headers.push(name.into());
        self
    }

    /// Overrides the generation name of a category.
    pub fn generation(mut self, category: Category, name: impl Into<SmolStr>) -> Self {
        self.config.generations.insert(category, name.into());
        self
    }

    /// Sets the offline page HTML.
    pub fn offline_page(mut self, html: impl Into<String>) -> Self {
        self.config.offline_page = html.into();
        self
    }

    /// Sets the image placeholder SVG.
    pub fn placeholder_svg(mut self, svg: impl Into<String>) -> Self {
        self.config.placeholder_svg = svg.into();
        self
    }

    /// Adds a deferred write route.
    pub fn write_route(mut self, route: WriteRoute) -> Self {
        self.config.write_routes.push(route);
        self
    }

    /// Sets the replay backoff.
    pub fn replay(mut self, backoff: ReplayBackoff) -> Self {
        self.config.replay = backoff;
        self
    }

    /// Sets the cleanup limits.
    pub fn cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<OfflineConfig, ConfigError> {
        self.config.normalized().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_generation_names_follow_prefix_category_version() {
        let config = OfflineConfig::builder("v3", "https://app.example.com")
            .prefix("app")
            .build()
            .unwrap();
        let names: Vec<_> = config
            .generation_names()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, ["app-static-v3", "app-pages-v3", "app-api-v3", "app-media-v3"]);
    }

    #[test]
    fn overridden_generation_name_wins() {
        let config = OfflineConfig::builder("v3", "https://app.example.com")
            .generation(Category::Media, "images-forever")
            .build()
            .unwrap();
        assert_eq!(config.generation_name(Category::Media), "images-forever");
    }

    #[test]
    fn relative_origin_is_rejected() {
        let err = OfflineConfig::builder("v1", "app.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin(_)));
    }

    #[test]
    fn fallback_must_be_essential() {
        let err = OfflineConfig::builder("v1", "https://app.example.com")
            .essential_assets(["/"])
            .fallback_page("/offline.html")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FallbackNotEssential(_)));
    }

    #[test]
    fn asset_uri_joins_origin_and_path() {
        let config = OfflineConfig::builder("v1", "https://app.example.com/")
            .build()
            .unwrap();
        assert_eq!(
            config.asset_uri("/index.html").unwrap(),
            "https://app.example.com/index.html"
        );
    }

    #[test]
    fn write_routes_only_match_non_get_requests() {
        let config = OfflineConfig::builder("v1", "https://app.example.com")
            .api_host("api.example.com")
            .write_route(WriteRoute::new("/orders"))
            .build()
            .unwrap();
        let post = InterceptedRequest::new(
            http::Method::POST,
            Uri::from_static("https://api.example.com/orders/new"),
        );
        let get = InterceptedRequest::get(Uri::from_static("https://api.example.com/orders"));
        let elsewhere = InterceptedRequest::new(
            http::Method::POST,
            Uri::from_static("https://tracker.example.net/orders"),
        );
        assert!(config.is_write_route(&post));
        assert!(!config.is_write_route(&get));
        assert!(!config.is_write_route(&elsewhere));
    }
}
