//! Active announcement tracking.
//!
//! The router keeps the set of announcements currently on air, keyed by the
//! announcing station's primary identifier, and tells subscribers only what
//! changed.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use radio_directory_protocol::{Announcement, AnnouncementType, Identifier};

use crate::error::FeedError;

const DELTA_CAPACITY: usize = 64;

/// Change to the active announcement set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementDelta {
    /// A station started an announcement.
    Added(Announcement),
    /// An active announcement changed (type or vendor data).
    Updated(Announcement),
    /// An announcement ended. Carries its last known state.
    Removed(Announcement),
}

impl AnnouncementDelta {
    pub fn announcement(&self) -> &Announcement {
        match self {
            AnnouncementDelta::Added(a)
            | AnnouncementDelta::Updated(a)
            | AnnouncementDelta::Removed(a) => a,
        }
    }
}

/// Tracks active announcements and fans out deltas.
pub struct AnnouncementRouter {
    active: Mutex<HashMap<Identifier, Announcement>>,
    deltas: broadcast::Sender<AnnouncementDelta>,
}

impl AnnouncementRouter {
    pub fn new() -> Self {
        let (deltas, _) = broadcast::channel(DELTA_CAPACITY);
        Self {
            active: Mutex::new(HashMap::new()),
            deltas,
        }
    }

    /// Start or update an announcement.
    ///
    /// Returns the delta sent to subscribers, or `None` when the
    /// announcement was already active unchanged.
    pub fn raise(&self, announcement: Announcement) -> Option<AnnouncementDelta> {
        let mut active = self.active.lock();
        let key = *announcement.key();

        let delta = match active.insert(key, announcement.clone()) {
            None => {
                info!(
                    "[AnnouncementRouter] {} announcement from {}",
                    announcement.kind.name(),
                    key
                );
                AnnouncementDelta::Added(announcement)
            }
            Some(previous) if previous == announcement => return None,
            Some(_) => {
                debug!("[AnnouncementRouter] Announcement from {} updated", key);
                AnnouncementDelta::Updated(announcement)
            }
        };

        let _ = self.deltas.send(delta.clone());
        Some(delta)
    }

    /// End the announcement from `primary`, if any.
    pub fn clear(&self, primary: &Identifier) -> Option<AnnouncementDelta> {
        let mut active = self.active.lock();
        let removed = active.remove(primary)?;
        info!("[AnnouncementRouter] Announcement from {} ended", primary);

        let delta = AnnouncementDelta::Removed(removed);
        let _ = self.deltas.send(delta.clone());
        Some(delta)
    }

    /// Currently active announcements, ordered by station.
    pub fn active(&self) -> Vec<Announcement> {
        let mut list: Vec<Announcement> = self.active.lock().values().cloned().collect();
        list.sort_by(|a, b| a.key().cmp(b.key()));
        list
    }

    /// Subscribe to deltas, optionally restricted to some announcement types.
    ///
    /// The returned subscription starts with the currently active set.
    pub fn subscribe(&self, types: Option<BTreeSet<AnnouncementType>>) -> AnnouncementSubscription {
        let active = self.active.lock();
        let receiver = self.deltas.subscribe();

        let mut initial: Vec<Announcement> = active
            .values()
            .filter(|a| types.as_ref().map_or(true, |t| t.contains(&a.kind)))
            .cloned()
            .collect();
        initial.sort_by(|a, b| a.key().cmp(b.key()));

        AnnouncementSubscription {
            shown: initial.iter().map(|a| *a.key()).collect(),
            initial,
            types,
            receiver,
        }
    }
}

impl Default for AnnouncementRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnnouncementRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnouncementRouter")
            .field("active", &self.active.lock().len())
            .finish()
    }
}

/// One consumer's view of the announcement stream.
#[derive(Debug)]
pub struct AnnouncementSubscription {
    initial: Vec<Announcement>,
    shown: HashSet<Identifier>,
    types: Option<BTreeSet<AnnouncementType>>,
    receiver: broadcast::Receiver<AnnouncementDelta>,
}

impl AnnouncementSubscription {
    /// Announcements that were active when the subscription was opened.
    pub fn initial(&self) -> &[Announcement] {
        &self.initial
    }

    /// Wait for the next delta passing the type filter.
    pub async fn recv(&mut self) -> Result<AnnouncementDelta, FeedError> {
        loop {
            match self.receiver.recv().await {
                Ok(delta) => {
                    if let Some(delta) = self.translate(delta) {
                        return Ok(delta);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("[AnnouncementSubscription] Lagged behind by {} delta(s)", missed);
                    return Err(FeedError::Lagged(missed));
                }
                Err(RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Next delta if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Option<AnnouncementDelta>, FeedError> {
        loop {
            match self.receiver.try_recv() {
                Ok(delta) => {
                    if let Some(delta) = self.translate(delta) {
                        return Ok(Some(delta));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(missed)) => return Err(FeedError::Lagged(missed)),
                Err(TryRecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Re-express a router delta relative to what this consumer has seen.
    fn translate(&mut self, delta: AnnouncementDelta) -> Option<AnnouncementDelta> {
        let key = *delta.announcement().key();
        let known = self.shown.contains(&key);

        match delta {
            AnnouncementDelta::Removed(a) => self
                .shown
                .remove(&key)
                .then_some(AnnouncementDelta::Removed(a)),
            AnnouncementDelta::Added(a) | AnnouncementDelta::Updated(a) => {
                let wanted = self.types.as_ref().map_or(true, |t| t.contains(&a.kind));
                match (wanted, known) {
                    (true, true) => Some(AnnouncementDelta::Updated(a)),
                    (true, false) => {
                        self.shown.insert(key);
                        Some(AnnouncementDelta::Added(a))
                    }
                    (false, true) => {
                        self.shown.remove(&key);
                        Some(AnnouncementDelta::Removed(a))
                    }
                    (false, false) => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_directory_protocol::{ProgramSelector, VendorKeyValue};

    fn traffic(khz: u32) -> Announcement {
        Announcement::new(ProgramSelector::amfm(khz), AnnouncementType::Traffic)
    }

    #[test]
    fn test_raise_and_clear() {
        let router = AnnouncementRouter::new();
        let mut sub = router.subscribe(None);

        assert!(matches!(router.raise(traffic(98_100)), Some(AnnouncementDelta::Added(_))));
        assert_eq!(router.active().len(), 1);
        assert!(matches!(sub.try_recv().unwrap(), Some(AnnouncementDelta::Added(_))));

        let removed = router.clear(&Identifier::amfm_frequency(98_100)).unwrap();
        assert_eq!(removed, AnnouncementDelta::Removed(traffic(98_100)));
        assert!(router.active().is_empty());
        assert!(matches!(sub.try_recv().unwrap(), Some(AnnouncementDelta::Removed(_))));
    }

    #[test]
    fn test_identical_raise_is_silent() {
        let router = AnnouncementRouter::new();
        router.raise(traffic(98_100));
        let mut sub = router.subscribe(None);

        assert_eq!(router.raise(traffic(98_100)), None);
        assert_eq!(sub.try_recv().unwrap(), None);
        assert_eq!(sub.initial().len(), 1);
    }

    #[test]
    fn test_changed_raise_is_update() {
        let router = AnnouncementRouter::new();
        router.raise(traffic(98_100));

        let mut changed = traffic(98_100);
        changed.vendor_info.push(VendorKeyValue {
            key: "com.example.severity".to_string(),
            value: "high".to_string(),
        });
        assert!(matches!(router.raise(changed), Some(AnnouncementDelta::Updated(_))));
    }

    #[test]
    fn test_clear_unknown_station_is_noop() {
        let router = AnnouncementRouter::new();
        assert_eq!(router.clear(&Identifier::amfm_frequency(88_000)), None);
    }

    #[test]
    fn test_type_filter_translates_deltas() {
        let router = AnnouncementRouter::new();
        let mut sub = router.subscribe(Some([AnnouncementType::Emergency].into_iter().collect()));

        router.raise(traffic(98_100));
        assert_eq!(sub.try_recv().unwrap(), None);

        // Type change into the filter looks like a new announcement
        let emergency = Announcement::new(ProgramSelector::amfm(98_100), AnnouncementType::Emergency);
        router.raise(emergency.clone());
        assert_eq!(sub.try_recv().unwrap(), Some(AnnouncementDelta::Added(emergency)));

        // ...and out of it like an ended one
        router.raise(traffic(98_100));
        assert_eq!(
            sub.try_recv().unwrap(),
            Some(AnnouncementDelta::Removed(traffic(98_100)))
        );

        router.clear(&Identifier::amfm_frequency(98_100));
        assert_eq!(sub.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscription_receives_async() {
        let router = std::sync::Arc::new(AnnouncementRouter::new());
        let mut sub = router.subscribe(None);

        let producer = {
            let router = std::sync::Arc::clone(&router);
            tokio::spawn(async move {
                router.raise(traffic(104_500));
            })
        };

        let delta = sub.recv().await.unwrap();
        assert_eq!(delta, AnnouncementDelta::Added(traffic(104_500)));
        producer.await.unwrap();
    }
}
