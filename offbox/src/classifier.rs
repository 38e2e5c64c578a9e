//! Request classification.
//!
//! The [`Classifier`] maps an [`InterceptedRequest`] to a [`TrafficClass`]
//! with an ordered rule table built from an [`OfflineConfig`]. The first
//! matching rule wins. Classification is pure and never touches the network
//! or the store.
//!
//! ```
//! use http::Uri;
//! use offbox::{Classifier, OfflineConfig, TrafficClass};
//! use offbox_core::InterceptedRequest;
//!
//! let config = OfflineConfig::builder("v1", "https://shop.example.com")
//!     .api_host("api.example.com")
//!     .build()
//!     .unwrap();
//! let classifier = Classifier::new(&config);
//!
//! let request = InterceptedRequest::get(Uri::from_static("https://api.example.com/products"));
//! assert_eq!(classifier.classify(&request), Some(TrafficClass::ApiCall));
//! ```

use std::collections::HashSet;

use http::Method;
use offbox_core::{Destination, InterceptedRequest, TrafficClass};

use crate::OfflineConfig;

/// Condition of a classification rule.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Method other than GET or HEAD.
    NotRead,
    /// Same-origin request whose path and query equal one of the seeded
    /// targets. `/card.html?id=1` does not match a seeded `/card.html`.
    EssentialPath {
        /// Application origin host.
        origin_host: String,
        /// Essential targets.
        paths: HashSet<String>,
    },
    /// Same-origin request for the template path with a non-empty parameter.
    PageTemplate {
        /// Application origin host.
        origin_host: String,
        /// Template path.
        path: String,
        /// Identifying query parameter.
        param: String,
    },
    /// Image destination or allowlisted media host.
    Image {
        /// Media host allowlist.
        hosts: Vec<String>,
    },
    /// Exact API host.
    Host(String),
    /// Foreign host in the allowlist.
    ForeignHost {
        /// Application origin host.
        origin_host: String,
        /// External host allowlist.
        hosts: Vec<String>,
    },
    /// Matches everything.
    Any,
}

impl Matcher {
    /// Whether the request satisfies this condition.
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        match self {
            Matcher::NotRead => !matches!(*request.method(), Method::GET | Method::HEAD),
            Matcher::EssentialPath { origin_host, paths } => {
                is_same_origin(request, origin_host)
                    && match request.uri().query() {
                        Some(query) => paths.contains(&format!("{}?{query}", request.path())),
                        None => paths.contains(request.path()),
                    }
            }
            Matcher::PageTemplate {
                origin_host,
                path,
                param,
            } => {
                is_same_origin(request, origin_host)
                    && request.path() == path
                    && request.query_param(param).is_some_and(|value| !value.is_empty())
            }
            Matcher::Image { hosts } => {
                request.destination() == Destination::Image
                    || request
                        .host()
                        .is_some_and(|host| in_allowlist(&host, hosts))
            }
            Matcher::Host(expected) => request.host().as_deref() == Some(expected.as_str()),
            Matcher::ForeignHost { origin_host, hosts } => request
                .host()
                .is_some_and(|host| host != *origin_host && in_allowlist(&host, hosts)),
            Matcher::Any => true,
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule name for logs.
    pub name: &'static str,
    /// Condition.
    pub matcher: Matcher,
    /// Class assigned on match. `None` passes the request through.
    pub class: Option<TrafficClass>,
}

/// Ordered rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Builds the rule table for a configuration.
    pub fn new(config: &OfflineConfig) -> Self {
        let origin_host = config.origin_host();
        let mut rules = vec![
            Rule {
                name: "non-read-method",
                matcher: Matcher::NotRead,
                class: None,
            },
            Rule {
                name: "essential-asset",
                matcher: Matcher::EssentialPath {
                    origin_host: origin_host.clone(),
                    paths: config.essential_assets.iter().cloned().collect(),
                },
                class: Some(TrafficClass::EssentialStatic),
            },
        ];
        if let Some(template) = &config.page_template {
            rules.push(Rule {
                name: "page-template",
                matcher: Matcher::PageTemplate {
                    origin_host: origin_host.clone(),
                    path: template.path.clone(),
                    param: template.param.clone(),
                },
                class: Some(TrafficClass::DynamicPage),
            });
        }
        rules.push(Rule {
            name: "image",
            matcher: Matcher::Image {
                hosts: config.media_hosts.clone(),
            },
            class: Some(TrafficClass::Image),
        });
        if let Some(api_host) = &config.api_host {
            rules.push(Rule {
                name: "api-host",
                matcher: Matcher::Host(api_host.clone()),
                class: Some(TrafficClass::ApiCall),
            });
        }
        rules.push(Rule {
            name: "external-host",
            matcher: Matcher::ForeignHost {
                origin_host,
                hosts: config.external_hosts.clone(),
            },
            class: Some(TrafficClass::ExternalResource),
        });
        rules.push(Rule {
            name: "fallthrough",
            matcher: Matcher::Any,
            class: Some(TrafficClass::Other),
        });
        Self { rules }
    }

    /// Classifies a request. `None` means it is not orchestrated.
    pub fn classify(&self, request: &InterceptedRequest) -> Option<TrafficClass> {
        self.matching_rule(request).and_then(|rule| rule.class)
    }

    /// Returns the first rule matching the request.
    pub fn matching_rule(&self, request: &InterceptedRequest) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matcher.matches(request))
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

fn is_same_origin(request: &InterceptedRequest, origin_host: &str) -> bool {
    request.host().is_none_or(|host| host == origin_host)
}

/// Exact host or any subdomain of an allowlist entry.
fn in_allowlist(host: &str, allowlist: &[String]) -> bool {
    allowlist.iter().any(|entry| {
        host == entry
            || host
                .strip_suffix(entry.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_matches_subdomains_only_on_label_boundary() {
        let allowlist = vec!["gstatic.com".to_owned()];
        assert!(in_allowlist("gstatic.com", &allowlist));
        assert!(in_allowlist("fonts.gstatic.com", &allowlist));
        assert!(!in_allowlist("notgstatic.com", &allowlist));
        assert!(!in_allowlist("gstatic.com.evil.net", &allowlist));
    }

    #[test]
    fn rule_order_is_fixed() {
        let config = OfflineConfig::builder("v1", "https://shop.example.com")
            .api_host("api.example.com")
            .page_template("/product.html", "id")
            .build()
            .unwrap();
        let names: Vec<_> = Classifier::new(&config)
            .rules()
            .iter()
            .map(|rule| rule.name)
            .collect();
        assert_eq!(
            names,
            [
                "non-read-method",
                "essential-asset",
                "page-template",
                "image",
                "api-host",
                "external-host",
                "fallthrough"
            ]
        );
    }

    #[test]
    fn template_page_with_parameter_is_dynamic_even_when_seeded() {
        let config = OfflineConfig::builder("v1", "https://shop.example.com")
            .essential_assets(["/", "/card.html", "/offline.html"])
            .page_template("/card.html", "id")
            .fallback_page("/offline.html")
            .build()
            .unwrap();
        let classifier = Classifier::new(&config);
        let classify = |uri: &'static str| {
            classifier.classify(&InterceptedRequest::get(http::Uri::from_static(uri)))
        };

        assert_eq!(
            classify("https://shop.example.com/card.html?id=42"),
            Some(TrafficClass::DynamicPage)
        );
        assert_eq!(
            classify("https://shop.example.com/card.html"),
            Some(TrafficClass::EssentialStatic)
        );
        assert_eq!(
            classify("https://shop.example.com/card.html?id="),
            Some(TrafficClass::Other)
        );
        assert_eq!(
            classify("https://shop.example.com/?ref=mail"),
            Some(TrafficClass::Other)
        );
    }
}
