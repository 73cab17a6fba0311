//! User-facing notifications.
//!
//! Auth flows produce a handful of moments the user should hear about
//! (signed in, signed out, session expired, profile saved). The client
//! reports each one as a [`Notice`] through a pluggable [`Notifier`] so
//! the embedding application decides how to surface them: toasts in a
//! browser shell, a status line in a TUI, or nothing at all.
//!
//! Raw provider errors never reach this layer. The client passes along
//! the human-readable message of its own error types, which are written
//! to be shown to people.

use tracing::{error, info, warn};

/// Severity of a [`Notice`], used to pick the presentation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Something the user asked for worked.
    Success,
    /// Neutral information, e.g. "check your inbox".
    Info,
    /// Something degraded but recoverable.
    Warning,
    /// Something the user asked for failed.
    Error,
}

impl NoticeKind {
    /// Stable lowercase label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

/// A single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, message: message.into() }
    }
}

/// Sink for user-facing notices.
///
/// Implementations must be cheap and non-blocking: the client calls
/// [`notify`](Notifier::notify) inline from its async operations and
/// does not await the result.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

/// Default [`Notifier`] that writes every notice to the tracing log.
///
/// Useful for headless tools and tests; interactive applications will
/// usually install their own sink via
/// [`AuthClientBuilder::notifier`](crate::AuthClientBuilder::notifier).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success | NoticeKind::Info => {
                info!(kind = notice.kind.label(), "{}", notice.message);
            }
            NoticeKind::Warning => {
                warn!(kind = notice.kind.label(), "{}", notice.message);
            }
            NoticeKind::Error => {
                error!(kind = notice.kind.label(), "{}", notice.message);
            }
        }
    }
}
