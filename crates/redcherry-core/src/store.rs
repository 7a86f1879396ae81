//! Append-only record of the visible conversation.
//!
//! `ConversationStore` owns the only mutable state of a chat session: the
//! ordered message log and the in-flight flag. Front ends observe it through
//! plain listener callbacks instead of reactive bindings.

use crate::message::{Message, GREETING};

/// Notifications emitted to front ends when the store changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// A message landed at `index`; front ends scroll to the newest entry.
    MessageAppended { index: usize },
    LoadingChanged(bool),
}

type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

pub struct ConversationStore {
    messages: Vec<Message>,
    loading: bool,
    listeners: Vec<Listener>,
}

impl ConversationStore {
    /// Start a conversation seeded with the assistant greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
            loading: false,
            listeners: Vec::new(),
        }
    }

    /// Register an observer. Listeners run synchronously, in registration order.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        let index = self.messages.len() - 1;
        self.notify(StoreEvent::MessageAppended { index });
    }

    pub fn set_loading(&mut self, loading: bool) {
        if self.loading == loading {
            return;
        }
        self.loading = loading;
        self.notify(StoreEvent::LoadingChanged(loading));
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the greeting is present from creation.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn notify(&self, event: StoreEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.messages)
            .field("loading", &self.loading)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_new_store_holds_only_greeting() {
        let store = ConversationStore::new();
        assert_eq!(store.len(), 1);
        assert!(!store.is_loading());
        let first = &store.messages()[0];
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.text, GREETING);
    }

    #[test]
    fn test_append_preserves_order_and_notifies() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut store = ConversationStore::new();
        let sink = Arc::clone(&events);
        store.subscribe(move |event| sink.lock().unwrap().push(*event));

        store.append(Message::user("first"));
        store.append(Message::assistant("second"));

        let texts: Vec<&str> = store.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec![GREETING, "first", "second"]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StoreEvent::MessageAppended { index: 1 },
                StoreEvent::MessageAppended { index: 2 },
            ]
        );
    }

    #[test]
    fn test_set_loading_only_notifies_on_change() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut store = ConversationStore::new();
        let sink = Arc::clone(&events);
        store.subscribe(move |event| sink.lock().unwrap().push(*event));

        store.set_loading(false);
        store.set_loading(true);
        store.set_loading(true);
        store.set_loading(false);

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StoreEvent::LoadingChanged(true),
                StoreEvent::LoadingChanged(false),
            ]
        );
    }
}
