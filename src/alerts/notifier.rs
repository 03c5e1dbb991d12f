//! Notification sinks for alerts

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(skip)]
    pub token: String,
    pub title: String,
    pub body: String,
    pub priority: u8,
}

/// What a sink did with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by a remote server with this HTTP status
    Delivered { status: u16 },
    /// Written to the log only
    Logged,
    /// Kept in memory
    Recorded,
}

/// Destination for alert notifications.
///
/// Implementations make a single attempt; callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<DeliveryStatus, NotifierError>;
}

/// Gotify push-notification client
pub struct GotifyNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl GotifyNotifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn message_url(&self) -> String {
        format!("{}/message", self.base_url)
    }
}

#[async_trait]
impl NotificationSink for GotifyNotifier {
    async fn notify(&self, notification: &Notification) -> Result<DeliveryStatus, NotifierError> {
        let payload = serde_json::json!({
            "title": notification.title,
            "message": notification.body,
            "priority": notification.priority,
        });

        let response = self
            .client
            .post(self.message_url())
            .query(&[("token", notification.token.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifierError::Status(status.as_u16()));
        }

        tracing::debug!(
            title = %notification.title,
            status = status.as_u16(),
            "Gotify notification sent"
        );

        Ok(DeliveryStatus::Delivered {
            status: status.as_u16(),
        })
    }
}

/// Sink that only logs, used when no Gotify server is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<DeliveryStatus, NotifierError> {
        tracing::warn!(
            priority = notification.priority,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(DeliveryStatus::Logged)
    }
}

/// Sink that keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failure: Option<String>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records each attempt and then fails it
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<DeliveryStatus, NotifierError> {
        self.sent.lock().push(notification.clone());
        match &self.failure {
            Some(reason) => Err(NotifierError::Transport(reason.clone())),
            None => Ok(DeliveryStatus::Recorded),
        }
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to send notification: {0}")]
    Transport(String),

    #[error("Notification server returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    type Received = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    /// Start a fake Gotify server answering every message with `status`
    async fn spawn_gotify(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&received);

        let app = Router::new().route(
            "/message",
            post(
                move |Query(params): Query<HashMap<String, String>>,
                      Json(body): Json<serde_json::Value>| {
                    let captured = Arc::clone(&captured);
                    async move {
                        let token = params.get("token").cloned().unwrap_or_default();
                        captured.lock().push((token, body));
                        status
                    }
                },
            ),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/", addr), received)
    }

    fn notification() -> Notification {
        Notification {
            token: "AbC123".to_string(),
            title: "Pump Alert: wellpump".to_string(),
            body: "Well may be low or dry.".to_string(),
            priority: 7,
        }
    }

    #[tokio::test]
    async fn test_gotify_posts_message() {
        let (url, received) = spawn_gotify(StatusCode::OK).await;
        let notifier = GotifyNotifier::new(url, Duration::from_secs(5)).unwrap();

        let status = notifier.notify(&notification()).await.unwrap();
        assert_eq!(status, DeliveryStatus::Delivered { status: 200 });

        let received = received.lock();
        assert_eq!(received.len(), 1);
        let (token, body) = &received[0];
        assert_eq!(token, "AbC123");
        assert_eq!(body["title"], "Pump Alert: wellpump");
        assert_eq!(body["message"], "Well may be low or dry.");
        assert_eq!(body["priority"], 7);
    }

    #[tokio::test]
    async fn test_gotify_error_status() {
        let (url, _) = spawn_gotify(StatusCode::UNAUTHORIZED).await;
        let notifier = GotifyNotifier::new(url, Duration::from_secs(5)).unwrap();

        let result = notifier.notify(&notification()).await;
        assert!(matches!(result, Err(NotifierError::Status(401))));
    }

    #[tokio::test]
    async fn test_gotify_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier =
            GotifyNotifier::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let result = notifier.notify(&notification()).await;
        assert!(matches!(result, Err(NotifierError::Transport(_))));
    }

    #[tokio::test]
    async fn test_log_notification() {
        // Log notification should always succeed
        let status = LogNotifier.notify(&notification()).await.unwrap();
        assert_eq!(status, DeliveryStatus::Logged);
    }

    #[tokio::test]
    async fn test_memory_notifier() {
        let notifier = MemoryNotifier::new();
        notifier.notify(&notification()).await.unwrap();
        assert_eq!(notifier.sent(), vec![notification()]);

        let failing = MemoryNotifier::failing("offline");
        assert!(failing.notify(&notification()).await.is_err());
        assert_eq!(failing.sent().len(), 1);
    }
}
