use futures::stream::{AbortHandle, Abortable};
use futures::Stream;
use ragchat_types::StreamEvent;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::Result;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Ordered, finite, non-restartable sequence of events for one chat request
///
/// The stream owns the HTTP response. Dropping it, calling [`ChatStream::cancel`],
/// or firing a [`CancelHandle`] releases the connection. A cancelled stream simply
/// ends; use [`ChatStream::was_cancelled`] to tell that apart from a dropped connection.
pub struct ChatStream {
    inner: Option<Abortable<EventStream>>,
    handle: AbortHandle,
    cancelled: bool,
}

impl ChatStream {
    pub fn new(events: EventStream) -> Self {
        let (inner, handle) = futures::stream::abortable(events);
        Self {
            inner: Some(inner),
            handle,
            cancelled: false,
        }
    }

    /// Wrap already-decoded events (used by tests and replay)
    pub fn from_events(events: Vec<Result<StreamEvent>>) -> Self {
        Self::new(Box::pin(futures::stream::iter(events)))
    }

    /// Handle that can cancel this stream from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            handle: self.handle.clone(),
        }
    }

    /// Cancel now and drop the underlying response
    pub fn cancel(&mut self) {
        self.handle.abort();
        if self.inner.take().is_some() {
            tracing::debug!("Chat stream cancelled by caller");
        }
        self.cancelled = true;
    }

    /// True when the stream ended because the caller cancelled it
    pub fn was_cancelled(&self) -> bool {
        self.cancelled || self.handle.is_aborted()
    }

    /// True once no more items will be produced
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for ChatStream {
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(None) => {
                if this.handle.is_aborted() {
                    this.cancelled = true;
                    tracing::debug!("Chat stream cancelled via handle");
                }
                // Release the response as soon as nothing more can be read
                this.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Cloneable cancellation handle for a [`ChatStream`]
#[derive(Debug, Clone)]
pub struct CancelHandle {
    handle: AbortHandle,
}

impl CancelHandle {
    /// Request cancellation; the stream ends at its next poll
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_from_events_in_order() {
        let mut stream = ChatStream::from_events(vec![
            Ok(StreamEvent::text("a")),
            Ok(StreamEvent::text("b")),
            Ok(StreamEvent::Done),
        ]);

        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::text("a"));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::text("b"));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Done);
        assert!(stream.next().await.is_none());
        assert!(stream.is_finished());
        assert!(!stream.was_cancelled());
    }

    #[test]
    fn test_pending_until_next_event_arrives() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<StreamEvent>>();
        let mut stream = ChatStream::new(Box::pin(rx));

        let mut next = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(next.poll());

        tx.unbounded_send(Ok(StreamEvent::Done)).unwrap();
        assert!(next.is_woken());
        let item = tokio_test::assert_ready!(next.poll());
        assert_eq!(item.unwrap().unwrap(), StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_cancel_drops_inner() {
        let mut stream = ChatStream::new(Box::pin(futures::stream::pending::<Result<StreamEvent>>()));

        stream.cancel();
        assert!(stream.is_finished());
        assert!(stream.was_cancelled());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_handle_from_other_task() {
        let mut stream = ChatStream::new(Box::pin(futures::stream::pending::<Result<StreamEvent>>()));
        let handle = stream.cancel_handle();

        tokio::spawn(async move {
            handle.cancel();
        });

        assert!(stream.next().await.is_none());
        assert!(stream.was_cancelled());
        assert!(stream.is_finished());
    }
}
