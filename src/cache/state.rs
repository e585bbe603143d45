use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a tiered cache.
///
/// `Uninitialized -> Loading -> Ready`, `Ready <-> Refreshing`, and any state
/// to `Disposed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReaderState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Refreshing = 3,
    Disposed = 4,
}

impl ReaderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Refreshing => "refreshing",
            Self::Disposed => "disposed",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Loading,
            2 => Self::Ready,
            3 => Self::Refreshing,
            _ => Self::Disposed,
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ReaderState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ReaderState {
        ReaderState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless already disposed. Returns the state actually held.
    pub(crate) fn transition(&self, next: ReaderState) -> ReaderState {
        let result = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            (current != ReaderState::Disposed as u8).then_some(next as u8)
        });
        match result {
            Ok(_) => next,
            Err(_) => ReaderState::Disposed,
        }
    }

    pub(crate) fn dispose(&self) -> bool {
        self.0.swap(ReaderState::Disposed as u8, Ordering::AcqRel) != ReaderState::Disposed as u8
    }
}
