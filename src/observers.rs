use std::fmt;

/// Callback list for in-memory model notifications.
///
/// Models own one of these and call [`Observers::notify`] after each
/// state change; listeners run synchronously on the caller's thread.
pub struct Observers<E> {
    listeners: Vec<Box<dyn FnMut(&E)>>,
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify(&mut self, event: &E) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
