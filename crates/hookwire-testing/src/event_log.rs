use std::cell::RefCell;
use std::rc::Rc;

/// Shared, ordered log for asserting on effect and callback order.
///
/// Clones append to the same log, so one copy can be moved into component
/// closures while the test keeps another.
#[derive(Clone, Default, Debug)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// A closure that records `entry` each time it is called; handy as an
    /// effect cleanup.
    pub fn recorder(&self, entry: impl Into<String>) -> impl Fn() + 'static {
        let log = self.clone();
        let entry = entry.into();
        move || log.record(entry.clone())
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Return everything recorded so far and start over.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
