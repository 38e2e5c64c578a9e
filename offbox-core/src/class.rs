//! Traffic classes, storage categories and strategies.
//!
//! Every orchestrated request gets exactly one [`TrafficClass`]. The class
//! decides which [`Strategy`] runs and which [`Category`] of generation the
//! snapshots land in:
//!
//! | Class | Strategy | Category |
//! |-------|----------|----------|
//! | `EssentialStatic` | `StoreFirst` | `Static` |
//! | `DynamicPage` | `NetworkFirst` | `Pages` |
//! | `ExternalResource` | `NetworkFirstDeferredWrite` | `Static` |
//! | `ApiCall` | `NetworkFirst` | `Api` |
//! | `Image` | `StoreFirstWithPlaceholder` | `Media` |
//! | `Other` | `NetworkFirst` | `Pages` |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Class assigned to a request by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficClass {
    /// Application shell assets, pre-seeded at install time.
    EssentialStatic,
    /// Page template requested with an identifying query parameter.
    DynamicPage,
    /// Allowlisted resource from a foreign origin (CDN, fonts).
    ExternalResource,
    /// Call to the API host.
    ApiCall,
    /// Image or allowlisted media host.
    Image,
    /// Anything else.
    Other,
}

impl TrafficClass {
    /// All classes, in classification priority order.
    pub const ALL: [TrafficClass; 6] = [
        TrafficClass::EssentialStatic,
        TrafficClass::DynamicPage,
        TrafficClass::Image,
        TrafficClass::ApiCall,
        TrafficClass::ExternalResource,
        TrafficClass::Other,
    ];

    /// Strategy applied to this class.
    pub fn strategy(self) -> Strategy {
        match self {
            TrafficClass::EssentialStatic => Strategy::StoreFirst,
            TrafficClass::DynamicPage | TrafficClass::ApiCall | TrafficClass::Other => {
                Strategy::NetworkFirst
            }
            TrafficClass::ExternalResource => Strategy::NetworkFirstDeferredWrite,
            TrafficClass::Image => Strategy::StoreFirstWithPlaceholder,
        }
    }

    /// Category of generation this class stores into.
    pub fn category(self) -> Category {
        match self {
            TrafficClass::EssentialStatic | TrafficClass::ExternalResource => Category::Static,
            TrafficClass::DynamicPage | TrafficClass::Other => Category::Pages,
            TrafficClass::ApiCall => Category::Api,
            TrafficClass::Image => Category::Media,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficClass::EssentialStatic => "essential-static",
            TrafficClass::DynamicPage => "dynamic-page",
            TrafficClass::ExternalResource => "external-resource",
            TrafficClass::ApiCall => "api-call",
            TrafficClass::Image => "image",
            TrafficClass::Other => "other",
        }
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of generation. Exactly one generation per category is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Static assets.
    Static,
    /// Pages and navigations.
    Pages,
    /// API responses.
    Api,
    /// Images and media.
    Media,
}

impl Category {
    /// All categories.
    pub const ALL: [Category; 4] = [
        Category::Static,
        Category::Pages,
        Category::Api,
        Category::Media,
    ];

    /// Label used in generation names, logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Static => "static",
            Category::Pages => "pages",
            Category::Api => "api",
            Category::Media => "media",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Serve from store, refresh in background; network on miss.
    StoreFirst,
    /// Network, store on success; fall back to store, category fallback, offline substitute.
    NetworkFirst,
    /// Network, store write detached from the response path; fall back to store.
    NetworkFirstDeferredWrite,
    /// Store, then network; placeholder when both fail.
    StoreFirstWithPlaceholder,
}
