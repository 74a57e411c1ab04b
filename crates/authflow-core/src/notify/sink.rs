use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::error;

use crate::models::Notification;

/// Publish side of the notification channel.
///
/// Publishing is synchronous and fire-and-forget; events from one caller must
/// be delivered in the order they were published.
pub trait NotificationSink: Send + Sync + 'static {
    fn publish(&self, notification: Notification);
}

pub type SharedSink = Arc<dyn NotificationSink>;

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn publish(&self, notification: Notification) {
        if let Err(e) = self.send(notification) {
            error!(notification = ?e.0, "Failed to publish notification - channel closed");
        }
    }
}
