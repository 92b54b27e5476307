//! Dispatch notifications
//!
//! Every message that completes the send path is reported here, including
//! sends made through a suppressed (dry) session. The registry is an
//! explicit value held by the [`Mailer`][crate::Mailer] rather than
//! process-global state; cloning the handle shares the same listener list.

use std::sync::{Arc, Mutex};

use crate::message::Message;

type Listener = Box<dyn Fn(&Message) + Send + Sync + 'static>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Registry of dispatch listeners
#[derive(Clone, Default)]
pub struct DispatchObserver {
    inner: Arc<Mutex<Registry>>,
}

impl DispatchObserver {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for the lifetime of the returned guard
    ///
    /// Listeners run synchronously, in registration order. Dropping the
    /// [`Subscription`] unregisters the listener, also when the owning
    /// scope unwinds on an error path.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock().unwrap();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Box::new(listener)));
        Subscription {
            observer: self.clone(),
            id,
        }
    }

    /// Notifies every registered listener about a dispatched message
    pub fn notify(&self, message: &Message) {
        let registry = self.inner.lock().unwrap();
        for (_id, listener) in &registry.listeners {
            listener(message);
        }
    }

    /// Starts recording dispatched messages
    ///
    /// Recording stops when the returned [`Outbox`] is dropped.
    pub fn record(&self) -> Outbox {
        let messages: Arc<Mutex<Vec<Message>>> = Arc::default();
        let sink = Arc::clone(&messages);
        let subscription = self.subscribe(move |message| {
            sink.lock().unwrap().push(message.clone());
        });
        Outbox {
            messages,
            _subscription: subscription,
        }
    }
}

impl std::fmt::Debug for DispatchObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.lock().unwrap();
        f.debug_struct("DispatchObserver")
            .field("listeners", &registry.listeners.len())
            .finish()
    }
}

/// Guard for a registered listener
///
/// The listener stays registered until this guard is dropped.
#[must_use = "the listener is unregistered when the subscription is dropped"]
pub struct Subscription {
    observer: DispatchObserver,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut registry = self.observer.inner.lock().unwrap();
        registry.listeners.retain(|(id, _)| *id != self.id);
    }
}

/// Recorded copies of dispatched messages
///
/// Returned by [`DispatchObserver::record`] and
/// [`Mailer::record_messages`][crate::Mailer::record_messages]; mainly
/// useful in tests to assert on "sent" mail without real delivery.
pub struct Outbox {
    messages: Arc<Mutex<Vec<Message>>>,
    _subscription: Subscription,
}

impl Outbox {
    /// Number of messages recorded so far
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    /// Tells if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clones of the recorded messages, in dispatch order
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::DispatchObserver;
    use crate::message::Message;

    fn message() -> Message {
        Message::builder().subject("ping").build()
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let observer = DispatchObserver::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = observer.subscribe(move |_| first.lock().unwrap().push(1));
        let second = Arc::clone(&order);
        let _b = observer.subscribe(move |_| second.lock().unwrap().push(2));

        observer.notify(&message());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let observer = DispatchObserver::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let subscription = observer.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observer.notify(&message());
        drop(subscription);
        observer.notify(&message());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn outbox_records_clones() {
        let observer = DispatchObserver::new();
        let outbox = observer.record();

        observer.notify(&message());
        observer.notify(&message());

        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox.messages()[0].subject(), "ping");

        drop(outbox);
        // no listeners remain
        observer.notify(&message());
    }
}
