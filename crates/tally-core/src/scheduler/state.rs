use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one query loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Waiting for the next tick.
    Idle = 0,
    /// An execution is in flight.
    Running = 1,
    /// The loop observed cancellation and exited. Terminal.
    Stopped = 2,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }
}

/// Shared, lock-free view of a loop's current [`LoopState`].
#[derive(Debug, Clone)]
pub struct LoopStatus {
    name: String,
    state: Arc<AtomicU8>,
}

impl LoopStatus {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(AtomicU8::new(LoopState::Idle as u8)),
        }
    }

    /// Name of the query driving this loop.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_and_tracks_transitions() {
        let status = LoopStatus::new("q");
        assert_eq!(status.get(), LoopState::Idle);

        let view = status.clone();
        status.set(LoopState::Running);
        assert_eq!(view.get(), LoopState::Running);

        status.set(LoopState::Stopped);
        assert_eq!(view.get(), LoopState::Stopped);
        assert_eq!(view.name(), "q");
    }
}
