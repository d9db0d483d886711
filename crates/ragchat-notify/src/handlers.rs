use ragchat_types::Notification;
use std::collections::HashMap;

pub type NotificationHandler = Box<dyn FnMut(&Notification) + Send + 'static>;

/// Outcome of routing one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Unhandled,
}

/// At most one handler per notification type
///
/// Registering a second handler for the same type replaces the first.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, NotificationHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if an earlier handler was replaced
    pub fn register(&mut self, kind: impl Into<String>, handler: NotificationHandler) -> bool {
        let kind = kind.into();
        let replaced = self.handlers.insert(kind.clone(), handler).is_some();
        if replaced {
            tracing::debug!(kind = %kind, "Replaced notification handler");
        }
        replaced
    }

    pub fn remove(&mut self, kind: &str) -> bool {
        self.handlers.remove(kind).is_some()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&mut self, notification: &Notification) -> Dispatch {
        match self.handlers.get_mut(notification.kind()) {
            Some(handler) => {
                handler(notification);
                Dispatch::Handled
            }
            None => Dispatch::Unhandled,
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
