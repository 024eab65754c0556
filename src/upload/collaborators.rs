use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// The signed-in uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

/// Supplies the currently authenticated user, if any.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;
}

/// A session resolved once up front, e.g. from request headers.
#[derive(Debug, Clone, Default)]
pub struct StaticSession(Option<User>);

impl StaticSession {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(User { id: user_id.into() }))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}

/// User-facing messages. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Notification {
    Success(String),
    Error(String),
}

/// Notifier that keeps every message so it can be returned to the client.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    pub fn snapshot(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn errors(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|n| matches!(n, Notification::Error(_)))
            .count()
    }

    pub fn successes(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|n| matches!(n, Notification::Success(_)))
            .count()
    }

    fn push(&self, notification: Notification) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}

impl Notifier for NotificationLog {
    fn success(&self, message: &str) {
        tracing::debug!(text = message, "notify success");
        self.push(Notification::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        tracing::debug!(text = message, "notify error");
        self.push(Notification::Error(message.to_string()));
    }
}

/// Signals sent to whatever is presenting the upload form.
pub trait PresentationSurface: Send + Sync {
    /// The form finished and should be dismissed.
    fn on_close(&self);
    /// The song listing is stale and should be fetched again.
    fn on_refresh(&self);
}

/// Counts presentation signals.
#[derive(Debug, Default)]
pub struct SurfaceSignals {
    closes: AtomicUsize,
    refreshes: AtomicUsize,
}

impl SurfaceSignals {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::Acquire)
    }
}

impl PresentationSurface for SurfaceSignals {
    fn on_close(&self) {
        self.closes.fetch_add(1, Ordering::AcqRel);
    }

    fn on_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::AcqRel);
    }
}
