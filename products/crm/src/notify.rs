use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

use crate::ports::NotificationSink;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Failure,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Sink that only writes notices to the tracing subscriber.
#[derive(Default, Debug, Clone, Copy)]
pub struct TracingNotifications;

impl NotificationSink for TracingNotifications {
    fn notify_success(&self, message: &str) {
        info!(target: "crm.notify", "{message}");
    }

    fn notify_failure(&self, message: &str) {
        warn!(target: "crm.notify", "{message}");
    }
}

/// Keeps every notice so a request handler can hand them back to the client.
#[derive(Default, Debug)]
pub struct BufferedNotifications {
    items: Mutex<Vec<Notification>>,
}

impl BufferedNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: NotificationLevel, message: &str) {
        let mut items = self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        items.push(Notification {
            level,
            message: message.to_string(),
        });
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn failures(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|n| n.level == NotificationLevel::Failure)
            .count()
    }
}

impl NotificationSink for BufferedNotifications {
    fn notify_success(&self, message: &str) {
        TracingNotifications.notify_success(message);
        self.push(NotificationLevel::Success, message);
    }

    fn notify_failure(&self, message: &str) {
        TracingNotifications.notify_failure(message);
        self.push(NotificationLevel::Failure, message);
    }
}
