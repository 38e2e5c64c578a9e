//! User-visible notifications and click routing.
//!
//! The [`NotificationDispatcher`] emits alerts through a [`Notifier`] and
//! routes notification clicks to the running application through a
//! [`ViewHost`]: a click focuses an already-open view of the target address
//! and only opens a new one when none matches.

use async_trait::async_trait;
use http::Uri;
use offbox_core::identity::normalize_url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Action id that closes a notification without further effect.
pub const DISMISS_ACTION: &str = "dismiss";

/// A user-visible alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Address opened when the notification is clicked.
    #[serde(default)]
    pub url: Option<String>,
    /// Notifications with the same tag replace each other.
    #[serde(default)]
    pub tag: Option<String>,
}

impl Notification {
    /// Creates a notification without url or tag.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: None,
            tag: None,
        }
    }

    /// Sets the click target.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..self
        }
    }

    /// Sets the tag.
    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..self
        }
    }
}

/// Shows notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Displays a notification.
    async fn show(&self, notification: Notification);
}

/// An open application view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Host-assigned view id.
    pub id: String,
    /// Current address of the view.
    pub url: String,
}

/// Access to the application's open views.
#[async_trait]
pub trait ViewHost: Send + Sync {
    /// Currently open views.
    async fn views(&self) -> Vec<View>;
    /// Brings a view to the front.
    async fn focus(&self, id: &str);
    /// Opens a new view at the address.
    async fn open(&self, url: &str);
}

/// What a notification click leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// Focus an existing view.
    Focus {
        /// View id.
        id: String,
    },
    /// Open a new view.
    Open {
        /// Address to open.
        url: String,
    },
}

/// Emits notifications and routes clicks.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher<N, V> {
    notifier: N,
    views: V,
}

impl<N, V> NotificationDispatcher<N, V>
where
    N: Notifier,
    V: ViewHost,
{
    /// Creates a dispatcher.
    pub fn new(notifier: N, views: V) -> Self {
        Self { notifier, views }
    }

    /// Shows a notification.
    pub async fn notify(&self, notification: Notification) {
        debug!(title = %notification.title, tag = ?notification.tag, "Showing notification");
        self.notifier.show(notification).await;
    }

    /// Decides what a click on `action` with target `url` does.
    ///
    /// Returns `None` for the dismiss action.
    pub async fn on_action(&self, action: &str, url: Option<&str>) -> Option<ViewAction> {
        if action == DISMISS_ACTION {
            debug!("Notification dismissed");
            return None;
        }
        let target = url.unwrap_or("/");
        let views = self.views.views().await;
        let action = match views.iter().find(|view| same_address(&view.url, target)) {
            Some(view) => ViewAction::Focus {
                id: view.id.clone(),
            },
            None => ViewAction::Open {
                url: target.to_owned(),
            },
        };
        Some(action)
    }

    /// Performs a view action.
    pub async fn perform(&self, action: &ViewAction) {
        match action {
            ViewAction::Focus { id } => self.views.focus(id).await,
            ViewAction::Open { url } => self.views.open(url).await,
        }
    }
}

/// Compares a view address with a click target, ignoring fragments.
///
/// Relative targets are compared against the view's path and query.
fn same_address(view_url: &str, target: &str) -> bool {
    let view_url = strip_fragment(view_url);
    let target = strip_fragment(target);
    let (Ok(view), Ok(target_uri)) = (view_url.parse::<Uri>(), target.parse::<Uri>()) else {
        return view_url == target;
    };
    if target_uri.host().is_some() {
        return normalize_url(&view) == normalize_url(&target_uri);
    }
    let view_path = view.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target_path = target_uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match (view_path, target_path) {
        ("", t) => t == "/",
        (v, t) => v == t,
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_ignored() {
        assert!(same_address(
            "https://shop.example.com/orders#latest",
            "https://shop.example.com/orders"
        ));
    }

    #[test]
    fn relative_target_matches_path_and_query() {
        assert!(same_address("https://shop.example.com/product.html?id=4", "/product.html?id=4"));
        assert!(!same_address("https://shop.example.com/product.html?id=4", "/product.html?id=5"));
        assert!(same_address("https://shop.example.com", "/"));
    }

    #[test]
    fn absolute_target_compares_normalized_urls() {
        assert!(same_address("https://Shop.Example.com:443/", "https://shop.example.com/"));
        assert!(!same_address("https://shop.example.com/", "https://other.example.com/"));
    }
}
