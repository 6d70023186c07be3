//! Filtered view of the folded chunk stream for one consumer.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use radio_directory_protocol::filter::matches_optional;
use radio_directory_protocol::{Identifier, ProgramFilter, ProgramListChunk};

use super::synchronizer::{FoldedChunk, ProgramDirectory, Watermark};
use crate::error::FeedError;

/// One consumer's subscription to a [`ProgramDirectory`].
///
/// The subscription remembers which keys it has delivered, so that:
/// - removals are only forwarded for keys the consumer has seen,
/// - an entry that stops matching the filter turns into a removal,
/// - `exclude_modifications` silently drops every update to a key already
///   delivered, whether or not it still matches.
pub struct DirectorySubscription {
    filter: Option<ProgramFilter>,
    shown: HashSet<Identifier>,
    pending: Option<ProgramListChunk>,
    watermark: Watermark,
    receiver: broadcast::Receiver<Arc<FoldedChunk>>,
}

impl DirectorySubscription {
    pub(crate) fn new(
        filter: Option<ProgramFilter>,
        initial: ProgramListChunk,
        watermark: Watermark,
        receiver: broadcast::Receiver<Arc<FoldedChunk>>,
    ) -> Self {
        let shown = initial.modified.iter().map(|info| *info.key()).collect();
        let pending = if initial.is_empty() { None } else { Some(initial) };
        Self {
            filter,
            shown,
            pending,
            watermark,
            receiver,
        }
    }

    /// Filter this subscription was opened with.
    pub fn filter(&self) -> Option<&ProgramFilter> {
        self.filter.as_ref()
    }

    /// Position of the last folded chunk this subscription has consumed.
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Number of keys currently visible to the consumer.
    pub fn visible(&self) -> usize {
        self.shown.len()
    }

    /// Wait for the next non-empty chunk for this consumer.
    pub async fn recv(&mut self) -> Result<ProgramListChunk, FeedError> {
        if let Some(initial) = self.pending.take() {
            return Ok(initial);
        }

        loop {
            match self.receiver.recv().await {
                Ok(folded) => {
                    if let Some(chunk) = self.translate(&folded) {
                        return Ok(chunk);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("[DirectorySubscription] Lagged behind by {} chunk(s)", missed);
                    return Err(FeedError::Lagged(missed));
                }
                Err(RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Next non-empty chunk if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Option<ProgramListChunk>, FeedError> {
        if let Some(initial) = self.pending.take() {
            return Ok(Some(initial));
        }

        loop {
            match self.receiver.try_recv() {
                Ok(folded) => {
                    if let Some(chunk) = self.translate(&folded) {
                        return Ok(Some(chunk));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("[DirectorySubscription] Lagged behind by {} chunk(s)", missed);
                    return Err(FeedError::Lagged(missed));
                }
                Err(TryRecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Replace this subscription with a fresh one on `directory`.
    ///
    /// Returns a purge chunk carrying the full filtered list; the consumer
    /// discards its view and starts over from it.
    pub fn resync(&mut self, directory: &ProgramDirectory) -> ProgramListChunk {
        let fresh = directory.subscribe(self.filter.take());
        *self = fresh;

        let mut chunk = self.pending.take().unwrap_or_default();
        chunk.purge = true;
        debug!(
            "[DirectorySubscription] Resynchronized at {:?} with {} entries",
            self.watermark,
            chunk.modified.len()
        );
        chunk
    }

    /// Translate a folded chunk into what this consumer should see.
    ///
    /// Returns `None` when nothing is left for the consumer.
    fn translate(&mut self, folded: &FoldedChunk) -> Option<ProgramListChunk> {
        self.watermark = folded.watermark;

        let source = &folded.chunk;
        let exclude_modifications = self
            .filter
            .as_ref()
            .map_or(false, |f| f.exclude_modifications);

        let mut out = ProgramListChunk {
            purge: source.purge,
            complete: source.complete,
            ..Default::default()
        };

        if source.purge {
            self.shown.clear();
        }

        for key in &source.removed {
            if self.shown.remove(key) {
                out.removed.push(*key);
            }
        }

        for info in &source.modified {
            let key = *info.key();
            let known = self.shown.contains(&key);
            if known && exclude_modifications {
                continue;
            }

            if matches_optional(info, self.filter.as_ref()) {
                self.shown.insert(key);
                out.modified.push(info.clone());
            } else if known {
                self.shown.remove(&key);
                out.removed.push(key);
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

impl std::fmt::Debug for DirectorySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySubscription")
            .field("filter", &self.filter)
            .field("visible", &self.shown.len())
            .field("watermark", &self.watermark)
            .finish()
    }
}
