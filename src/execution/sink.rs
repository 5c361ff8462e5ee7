use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use crate::model::{Event, Step};

/// Somewhere to post events.
pub trait EventSink: Send + Sync {
    fn post_event(&self, event: Event);
}

/// Something interested in the progress of a task.
pub trait TaskObserver: Send + Sync {
    fn on_step_starting(&self, _step: &Step) {}

    fn on_event_posted(&self, _event: &Event) {}
}

/// Broadcasts every posted event, and every step-starting notification, to
/// all subscribed observers.
///
/// Delivery happens on the posting thread, one notification at a time, so
/// every observer sees the same order. Observers must not post from inside a
/// callback.
#[derive(Default)]
pub struct EventBus {
    observers: Mutex<Vec<Arc<dyn TaskObserver>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn TaskObserver>) {
        self.lock().push(observer);
    }

    /// Subscribe a channel that receives a copy of every posted event.
    pub fn channel(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(Arc::new(ChannelObserver { tx: Mutex::new(tx) }));
        rx
    }

    pub fn notify_step_starting(&self, step: &Step) {
        tracing::debug!(%step, "step starting");
        for observer in self.lock().iter() {
            observer.on_step_starting(step);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn TaskObserver>>> {
        // Observers never leave the list half-updated, so a poisoned lock is still usable.
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for EventBus {
    fn post_event(&self, event: Event) {
        tracing::debug!(%event, "event posted");
        for observer in self.lock().iter() {
            observer.on_event_posted(&event);
        }
    }
}

/// Forwards events into an mpsc channel. Sends to a dropped receiver are ignored.
struct ChannelObserver {
    tx: Mutex<Sender<Event>>,
}

impl TaskObserver for ChannelObserver {
    fn on_event_posted(&self, event: &Event) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event.clone());
        }
    }
}
