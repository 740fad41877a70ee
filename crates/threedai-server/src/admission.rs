use parking_lot::{Condvar, Mutex};

/// Caps how many generations run at once. A limit of zero admits everyone.
#[derive(Debug)]
pub struct AdmissionGate {
    limit: usize,
    active: Mutex<usize>,
    freed: Condvar,
}

impl AdmissionGate {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            active: Mutex::new(0),
            freed: Condvar::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    pub fn active(&self) -> usize {
        *self.active.lock()
    }

    /// Blocks until a slot is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut active = self.active.lock();
        while self.limit > 0 && *active >= self.limit {
            self.freed.wait(&mut active);
        }
        *active += 1;
        Permit { gate: self }
    }
}

#[must_use = "the slot is released when the permit is dropped"]
pub struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut active = self.gate.active.lock();
        *active -= 1;
        self.gate.freed.notify_one();
    }
}
