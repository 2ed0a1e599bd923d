//! Generation-keyed deferred task slot
//!
//! Holds at most one pending side effect, due at a point on the audio clock.
//! Scheduling a new effect replaces the pending one and bumps the generation;
//! only a task whose generation is still the live one can fire.

/// A task taken out of the slot because it fell due
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    /// Audio-clock time the task was scheduled for
    pub due: f64,
    pub payload: T,
}

#[derive(Debug)]
struct Pending<T> {
    generation: u64,
    due: f64,
    payload: T,
}

/// Single-slot deferred task
#[derive(Debug)]
pub struct DeferredTask<T> {
    generation: u64,
    pending: Option<Pending<T>>,
}

impl<T> Default for DeferredTask<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            pending: None,
        }
    }
}

impl<T> DeferredTask<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` at `due`, replacing whatever was pending
    pub fn schedule(&mut self, due: f64, payload: T) {
        self.generation += 1;
        self.pending = Some(Pending {
            generation: self.generation,
            due,
            payload,
        });
    }

    /// Drop the pending task, if any
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    /// When the pending task is due
    pub fn deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Take the pending task if it is due at `now`
    pub fn take_due(&mut self, now: f64) -> Option<Fired<T>> {
        match &self.pending {
            Some(p) if p.due <= now && p.generation == self.generation => {}
            _ => return None,
        }
        self.pending.take().map(|p| Fired {
            due: p.due,
            payload: p.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_only_when_due() {
        let mut task = DeferredTask::new();
        task.schedule(1.0, "seek");
        assert!(task.take_due(0.5).is_none());
        let fired = task.take_due(1.0).unwrap();
        assert_eq!(fired.payload, "seek");
        assert_eq!(fired.due, 1.0);
        assert!(task.take_due(2.0).is_none());
    }

    #[test]
    fn test_schedule_replaces_pending() {
        let mut task = DeferredTask::new();
        task.schedule(1.0, 1);
        task.schedule(2.0, 2);
        assert_eq!(task.deadline(), Some(2.0));

        // The replaced task never fires, even though it was due first
        assert!(task.take_due(1.5).is_none());
        let fired = task.take_due(5.0).unwrap();
        assert_eq!(fired.payload, 2);
        assert!(task.take_due(5.0).is_none());
    }

    #[test]
    fn test_cancel_invalidates_generation() {
        let mut task = DeferredTask::new();
        task.schedule(1.0, ());
        task.cancel();
        assert_eq!(task.deadline(), None);
        assert!(task.take_due(10.0).is_none());

        task.schedule(3.0, ());
        assert!(task.take_due(3.0).is_some());
    }
}
