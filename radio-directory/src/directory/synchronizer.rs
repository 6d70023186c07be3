//! Program directory: folds the provider's chunk stream into the live
//! station list.
//!
//! The published state is an immutable map behind an `Arc`. The single
//! writer builds the next map from a copy and swaps it in after the whole
//! chunk has been applied, so readers never see half a chunk.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use radio_directory_protocol::filter::matches_optional;
use radio_directory_protocol::{Identifier, ProgramFilter, ProgramInfo, ProgramListChunk};

use super::subscription::DirectorySubscription;
use crate::error::{DirectoryError, Result};
use crate::supervisor::{ScanEvent, ScanStatus, ScanSupervisor};

/// Default scan completion bound.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of folded chunks buffered per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Directory session parameters.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Time a scan generation has to report completion.
    pub scan_timeout: Duration,
    /// Buffered folded chunks per subscriber before it lags.
    pub feed_capacity: usize,
    /// Entries that do not pass are never retained.
    pub admission: Option<ProgramFilter>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            feed_capacity: DEFAULT_FEED_CAPACITY,
            admission: None,
        }
    }
}

/// Position in the folded chunk stream.
///
/// The epoch advances on every purge; the sequence on every applied chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark {
    pub epoch: u64,
    pub sequence: u64,
}

/// A chunk as it was folded into the directory.
///
/// `chunk` holds the effective changes: ignored entries and entries losing
/// to a removal in the same chunk are gone, duplicates are collapsed.
#[derive(Debug, Clone)]
pub struct FoldedChunk {
    pub chunk: ProgramListChunk,
    pub watermark: Watermark,
}

/// Counters describing what a chunk did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkOutcome {
    pub watermark: Watermark,
    /// Entries inserted or replaced.
    pub upserted: usize,
    /// Entries that existed and were removed.
    pub removed: usize,
    /// Entries skipped (unknown kind, removal wins, not admitted, excluded modification).
    pub ignored: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    info: Arc<ProgramInfo>,
    updated_at: u64,
}

#[derive(Debug, Clone, Default)]
struct DirectoryState {
    entries: HashMap<Identifier, Slot>,
    epoch: u64,
    sequence: u64,
    /// Sequence of the last chunk that removed anything in this epoch.
    last_removal: u64,
    complete: bool,
}

impl DirectoryState {
    fn watermark(&self) -> Watermark {
        Watermark {
            epoch: self.epoch,
            sequence: self.sequence,
        }
    }

    /// Entries passing `filter`, ordered by key.
    fn collect(&self, filter: Option<&ProgramFilter>, since: Option<u64>) -> Vec<ProgramInfo> {
        let mut entries: Vec<&Slot> = self
            .entries
            .values()
            .filter(|slot| since.map_or(true, |seq| slot.updated_at > seq))
            .filter(|slot| matches_optional(&slot.info, filter))
            .collect();
        entries.sort_by(|a, b| a.info.key().cmp(b.info.key()));
        entries.into_iter().map(|slot| (*slot.info).clone()).collect()
    }

    fn diff_since(
        &self,
        watermark: Option<Watermark>,
        filter: Option<&ProgramFilter>,
    ) -> ProgramListChunk {
        let (purge, since) = match watermark {
            None => (false, None),
            Some(w)
                if w.epoch == self.epoch
                    && w.sequence <= self.sequence
                    && self.last_removal <= w.sequence =>
            {
                (false, Some(w.sequence))
            }
            Some(_) => (true, None),
        };

        // Entries changed since the mark that no longer pass the filter may
        // still be held by the consumer.
        let mut removed: Vec<Identifier> = match (since, filter) {
            (Some(seq), Some(_)) => self
                .entries
                .values()
                .filter(|slot| slot.updated_at > seq)
                .filter(|slot| !matches_optional(&slot.info, filter))
                .map(|slot| *slot.info.key())
                .collect(),
            _ => Vec::new(),
        };
        removed.sort();

        ProgramListChunk {
            purge,
            complete: self.complete,
            modified: self.collect(filter, since),
            removed,
        }
    }
}

#[derive(Debug, Default)]
struct WriterState {
    closed: bool,
}

/// Live program list for one listening session.
///
/// One task applies chunks; any number of tasks read snapshots, compute
/// diffs or hold subscriptions.
///
/// # Example
/// ```
/// use radio_directory::directory::{DirectoryConfig, ProgramDirectory};
/// use radio_directory_protocol::{Identifier, ProgramInfo, ProgramListChunk, ProgramSelector};
///
/// let directory = ProgramDirectory::start(DirectoryConfig::default());
/// directory
///     .apply_chunk(ProgramListChunk::modified(vec![ProgramInfo::new(ProgramSelector::amfm(100_000))]))
///     .unwrap();
/// assert_eq!(directory.len(), 1);
/// assert!(directory.get(&Identifier::amfm_frequency(100_000)).is_some());
/// ```
pub struct ProgramDirectory {
    config: DirectoryConfig,
    published: RwLock<Arc<DirectoryState>>,
    writer: Mutex<WriterState>,
    feed: broadcast::Sender<Arc<FoldedChunk>>,
    supervisor: ScanSupervisor,
}

impl ProgramDirectory {
    /// Start a listening session with an empty directory and an armed scan deadline.
    ///
    /// Called inside a tokio runtime, the deadline runs as a task and
    /// [`ScanEvent::TimedOut`] is delivered as soon as it expires. Without a
    /// runtime the expiry is only noticed, and the event only sent, when
    /// [`ProgramDirectory::scan_status`] is read or another chunk completes.
    pub fn start(config: DirectoryConfig) -> Self {
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));
        let supervisor = ScanSupervisor::new(config.scan_timeout);
        supervisor.start();

        info!(
            "[ProgramDirectory] Session started (scan timeout {:?}, admission filter: {})",
            config.scan_timeout,
            config.admission.is_some()
        );

        Self {
            config,
            published: RwLock::new(Arc::new(DirectoryState::default())),
            writer: Mutex::new(WriterState::default()),
            feed,
            supervisor,
        }
    }

    /// Session parameters.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Fold one chunk into the directory.
    ///
    /// The chunk applies completely or, on a protocol violation, not at all.
    pub fn apply_chunk(&self, chunk: ProgramListChunk) -> Result<ChunkOutcome> {
        let writer = self.writer.lock();
        if writer.closed {
            return Err(DirectoryError::Closed);
        }

        if let Err(violation) = chunk.validate() {
            warn!("[ProgramDirectory] Dropping chunk: {}", violation);
            return Err(violation.into());
        }

        let current = self.state();
        let mut next = (*current).clone();
        next.sequence += 1;
        let sequence = next.sequence;

        let mut outcome = ChunkOutcome::default();
        let mut effective = ProgramListChunk {
            purge: chunk.purge,
            complete: chunk.complete,
            ..Default::default()
        };

        // 1. purge
        if chunk.purge {
            debug!(
                "[ProgramDirectory] Purge: discarding {} entries",
                next.entries.len()
            );
            next.entries.clear();
            next.epoch += 1;
            next.last_removal = 0;
            next.complete = false;
        }

        // 2. removals
        let removed_keys: HashSet<Identifier> = chunk.removed.iter().copied().collect();
        for key in &chunk.removed {
            if next.entries.remove(key).is_some() {
                outcome.removed += 1;
                effective.removed.push(*key);
            } else {
                trace!("[ProgramDirectory] Removal of absent key {}", key);
            }
        }

        // 3. modifications
        let admission = self.config.admission.as_ref();
        let exclude_modifications = admission.map_or(false, |f| f.exclude_modifications);
        let mut positions: HashMap<Identifier, usize> = HashMap::new();

        for info in chunk.modified {
            let key = *info.key();

            if !key.kind.is_known() {
                debug!("[ProgramDirectory] Ignoring entry with unknown primary kind: {}", key);
                outcome.ignored += 1;
                continue;
            }
            if removed_keys.contains(&key) {
                debug!("[ProgramDirectory] {} both modified and removed; removal wins", key);
                outcome.ignored += 1;
                continue;
            }
            if exclude_modifications
                && next.entries.contains_key(&key)
                && !positions.contains_key(&key)
            {
                trace!("[ProgramDirectory] Excluded modification of {}", key);
                outcome.ignored += 1;
                continue;
            }
            if !matches_optional(&info, admission) {
                if next.entries.remove(&key).is_some() {
                    debug!("[ProgramDirectory] {} no longer admitted; removing", key);
                    outcome.removed += 1;
                    effective.removed.push(key);
                    if let Some(index) = positions.remove(&key) {
                        effective.modified.remove(index);
                        for position in positions.values_mut() {
                            if *position > index {
                                *position -= 1;
                            }
                        }
                    }
                } else {
                    outcome.ignored += 1;
                }
                continue;
            }

            next.entries.insert(
                key,
                Slot {
                    info: Arc::new(info.clone()),
                    updated_at: sequence,
                },
            );
            outcome.upserted += 1;

            match positions.get(&key) {
                Some(&index) => effective.modified[index] = info,
                None => {
                    positions.insert(key, effective.modified.len());
                    effective.modified.push(info);
                }
            }
        }

        if !effective.removed.is_empty() {
            next.last_removal = sequence;
        }

        // Readers woken by scan events block here until the new state is in.
        let mut published = self.published.write();

        if chunk.purge {
            self.supervisor.on_purge();
        }

        // 4. completion; a generation that already timed out stays stale
        if chunk.complete {
            let accepted = self.supervisor.on_complete();
            next.complete = accepted;
            effective.complete = accepted;
        }

        let watermark = next.watermark();
        outcome.watermark = watermark;
        *published = Arc::new(next);
        drop(published);

        debug!(
            "[ProgramDirectory] Applied chunk seq={} epoch={}: +{} -{} ignored={}",
            watermark.sequence, watermark.epoch, outcome.upserted, outcome.removed, outcome.ignored
        );

        // No receivers is fine
        let _ = self.feed.send(Arc::new(FoldedChunk {
            chunk: effective,
            watermark,
        }));

        drop(writer);
        Ok(outcome)
    }

    /// Detached copy of the entries passing `filter`, ordered by key.
    pub fn snapshot(&self, filter: Option<&ProgramFilter>) -> Vec<ProgramInfo> {
        self.state().collect(filter, None)
    }

    /// Chunk that brings a consumer at `watermark` up to the live state.
    ///
    /// - `None`: every retained entry passing `filter`.
    /// - same epoch, no removal since: only entries modified after `watermark`.
    /// - otherwise: every retained entry with `purge` set.
    /// - with a filter, entries changed since `watermark` that no longer pass
    ///   are listed in `removed`.
    pub fn diff_since(
        &self,
        watermark: Option<Watermark>,
        filter: Option<&ProgramFilter>,
    ) -> ProgramListChunk {
        self.state().diff_since(watermark, filter)
    }

    /// Current position in the folded stream.
    pub fn watermark(&self) -> Watermark {
        self.state().watermark()
    }

    /// Entry for a primary identifier.
    pub fn get(&self, primary: &Identifier) -> Option<ProgramInfo> {
        self.state()
            .entries
            .get(primary)
            .map(|slot| (*slot.info).clone())
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    /// Whether the current scan generation completed before its deadline.
    pub fn is_complete(&self) -> bool {
        self.state().complete
    }

    /// Scan supervisor state.
    pub fn scan_status(&self) -> ScanStatus {
        self.supervisor.status()
    }

    /// Subscribe to scan state transitions.
    pub fn scan_events(&self) -> broadcast::Receiver<ScanEvent> {
        self.supervisor.subscribe()
    }

    /// Open a filtered subscription.
    ///
    /// The first item delivered is the late-join chunk; after that, every
    /// folded chunk translated through `filter`. Nothing is lost or repeated
    /// between the two.
    pub fn subscribe(&self, filter: Option<ProgramFilter>) -> DirectorySubscription {
        let _writer = self.writer.lock();
        let state = self.state();
        let initial = state.diff_since(None, filter.as_ref());
        let receiver = self.feed.subscribe();
        DirectorySubscription::new(filter, initial, state.watermark(), receiver)
    }

    /// Tear the session down: clear the directory and cancel the deadline.
    ///
    /// Subscribers receive a final purge. Later chunks are rejected.
    pub fn close(&self) {
        let mut writer = self.writer.lock();
        if writer.closed {
            return;
        }
        writer.closed = true;

        let current = self.state();
        let next = DirectoryState {
            epoch: current.epoch + 1,
            sequence: current.sequence + 1,
            ..Default::default()
        };
        let watermark = next.watermark();
        *self.published.write() = Arc::new(next);
        self.supervisor.stop();

        let _ = self.feed.send(Arc::new(FoldedChunk {
            chunk: ProgramListChunk::purge(),
            watermark,
        }));
        info!("[ProgramDirectory] Session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().closed
    }

    fn state(&self) -> Arc<DirectoryState> {
        self.published.read().clone()
    }
}

impl std::fmt::Debug for ProgramDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ProgramDirectory")
            .field("entries", &state.entries.len())
            .field("watermark", &state.watermark())
            .field("complete", &state.complete)
            .finish()
    }
}
