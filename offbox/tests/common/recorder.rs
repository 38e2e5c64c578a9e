//! Notifier and view host that record what they were asked to do.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offbox::{Notification, Notifier, View, ViewHost};

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    shown: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown().into_iter().map(|n| n.title).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: Notification) {
        self.shown.lock().unwrap().push(notification);
    }
}

#[derive(Clone, Default)]
pub struct RecordingViews {
    views: Arc<Mutex<Vec<View>>>,
    focused: Arc<Mutex<Vec<String>>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingViews {
    /// Pretends a view is open at `url`.
    pub fn with_view(&self, id: &str, url: &str) {
        self.views.lock().unwrap().push(View {
            id: id.to_owned(),
            url: url.to_owned(),
        });
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ViewHost for RecordingViews {
    async fn views(&self) -> Vec<View> {
        self.views.lock().unwrap().clone()
    }

    async fn focus(&self, id: &str) {
        self.focused.lock().unwrap().push(id.to_owned());
    }

    async fn open(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_owned());
    }
}
