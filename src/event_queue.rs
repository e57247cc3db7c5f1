use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

type Handler<T> = Box<dyn FnMut(T) + Send>;

/// Order preserving event buffer between a producer and a handler that may be
/// attached later.
///
/// Events emitted while no handler is attached are queued and handed to the handler
/// in order once one is set. The handler is always invoked without any lock held, so
/// it may emit new events or replace itself. Such events are delivered after the
/// current one, in the order they were emitted.
pub struct EventQueue<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    queue: VecDeque<T>,
    handler: Option<Handler<T>>,
    // bumped on every set/clear so a running delivery notices the change.
    generation: u64,
    delivering: bool,
}

impl<T> EventQueue<T> {
    /// Empty queue without a handler.
    pub fn new() -> Self {
        EventQueue {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                handler: None,
                generation: 0,
                delivering: false,
            }),
        }
    }

    /// Deliver the event now if there's a handler, otherwise queue it.
    pub fn emit(&self, event: T) {
        let mut lock = self.inner.lock().unwrap();
        lock.queue.push_back(event);

        if lock.handler.is_none() || lock.delivering {
            return;
        }

        drop(lock);
        self.deliver();
    }

    /// Attach a handler, replacing any previous one. Queued events are delivered to
    /// it straight away, events already delivered are not repeated.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut lock = self.inner.lock().unwrap();
        lock.handler = Some(Box::new(handler));
        lock.generation += 1;

        if lock.delivering {
            return;
        }

        drop(lock);
        self.deliver();
    }

    /// Detach the handler. Later events are queued again.
    pub fn clear_handler(&self) {
        let mut lock = self.inner.lock().unwrap();
        lock.handler = None;
        lock.generation += 1;
    }

    /// Tests if a handler is attached.
    pub fn has_handler(&self) -> bool {
        let lock = self.inner.lock().unwrap();
        lock.handler.is_some() || lock.delivering
    }

    /// Number of events waiting for a handler.
    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    fn deliver(&self) {
        let mut lock = self.inner.lock().unwrap();

        let mut handler = match lock.handler.take() {
            Some(h) => h,
            None => return,
        };
        let mut generation = lock.generation;
        lock.delivering = true;

        loop {
            let event = match lock.queue.pop_front() {
                Some(e) => e,
                None => break,
            };
            drop(lock);

            handler(event);

            lock = self.inner.lock().unwrap();

            if lock.generation != generation {
                // replaced or cleared from within the handler
                match lock.handler.take() {
                    Some(h) => {
                        handler = h;
                        generation = lock.generation;
                    }
                    None => {
                        lock.delivering = false;
                        return;
                    }
                }
            }
        }

        lock.handler = Some(handler);
        lock.delivering = false;
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        EventQueue::new()
    }
}

impl<T> fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = self.inner.lock().unwrap();
        write!(
            f,
            "EventQueue {{ pending: {}, handler: {} }}",
            lock.queue.len(),
            lock.handler.is_some() || lock.delivering
        )
    }
}
