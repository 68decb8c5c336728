//! Result delivery to callers.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::ApiError;

/// Everything an operation can report to its listener.
///
/// Single-response operations deliver exactly one `Response` or one
/// `Failed`. Streaming operations deliver `Established`, then zero or more
/// `Item`s, then at most one of `Completed` or `Failed`.
#[derive(Debug, Clone)]
pub enum ApiEvent<T> {
    /// The result of a single-response operation.
    Response(T),
    /// The subscription is registered on a live connection.
    Established { subscription_id: String },
    /// One item of a stream.
    Item(T),
    /// The stream ended normally.
    Completed,
    /// The operation failed. Nothing follows.
    Failed(ApiError),
}

impl<T> ApiEvent<T> {
    /// Whether no further event can follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Response(_) | Self::Completed | Self::Failed(_))
    }

    /// The carried value, for responses and items.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Response(value) | Self::Item(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Callback receiving the events of one operation.
///
/// Invoked from a runtime worker, never from the thread that issued the call.
pub struct Listener<T> {
    callback: Arc<dyn Fn(ApiEvent<T>) + Send + Sync>,
}

impl<T> Listener<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ApiEvent<T>) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// A listener that forwards every event into a channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ApiEvent<T>>)
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Self::new(move |event| {
            let _ = tx.send(event);
        });
        (listener, rx)
    }

    pub(crate) fn notify(&self, event: ApiEvent<T>) {
        (self.callback)(event)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_terminal_events() {
        assert!(ApiEvent::Response(1).is_terminal());
        assert!(ApiEvent::<u8>::Completed.is_terminal());
        assert!(!ApiEvent::Item(1).is_terminal());
        assert!(
            !ApiEvent::<u8>::Established {
                subscription_id: "a".into()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_callback_listener() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let listener = Listener::new(move |event: ApiEvent<u32>| {
            seen.fetch_add(event.into_value().unwrap_or(0) as usize, Ordering::SeqCst);
        });

        listener.notify(ApiEvent::Item(2));
        listener.clone().notify(ApiEvent::Item(3));
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_channel_listener() {
        let (listener, mut rx) = Listener::channel();
        listener.notify(ApiEvent::Response("done"));
        assert_eq!(rx.recv().await.unwrap().into_value(), Some("done"));
    }
}
