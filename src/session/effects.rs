//! Deferred playback effects.
//!
//! Commands and ticks only enqueue intents; the runner drains the queue once
//! per scheduling turn. An intent queued after another is always applied
//! after it, so `Stop` following `Start` is observably last.

use std::collections::VecDeque;

use crate::types::PlaybackSlot;

/// A playback side effect waiting for the next drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackIntent {
    /// Start the loop for this slot, resolving its track when applied
    Start(PlaybackSlot),
    /// Stop whatever is playing
    Stop,
}

/// FIFO queue of [`PlaybackIntent`]s.
#[derive(Debug, Clone, Default)]
pub struct PendingEffects {
    queue: VecDeque<PlaybackIntent>,
}

impl PendingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, intent: PlaybackIntent) {
        self.queue.push_back(intent);
    }

    /// Takes the oldest intent.
    pub fn pop(&mut self) -> Option<PlaybackIntent> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drops everything still queued.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// The queued intents, oldest first.
    pub fn to_vec(&self) -> Vec<PlaybackIntent> {
        self.queue.iter().copied().collect()
    }
}
