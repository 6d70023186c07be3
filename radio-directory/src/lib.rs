//! Live program directory for a broadcast radio tuner.
//!
//! A tuning provider scans the band and reports stations as a stream of
//! [`ProgramListChunk`](radio_directory_protocol::ProgramListChunk)s. This
//! crate folds that stream into a consistent directory keyed by each
//! station's primary identifier, serves filtered snapshots and incremental
//! feeds to any number of consumers, and supervises scan completion.
//!
//! # Components
//!
//! - [`directory::ProgramDirectory`]: chunk folding, snapshots, diffs, subscriptions
//! - [`supervisor::ScanSupervisor`]: scan completion deadline
//! - [`announcement::AnnouncementRouter`]: active announcements and deltas
//!
//! # Example
//!
//! ```rust
//! use radio_directory::directory::{DirectoryConfig, ProgramDirectory};
//! use radio_directory::supervisor::ScanState;
//! use radio_directory_protocol::{Identifier, ProgramInfo, ProgramListChunk, ProgramSelector};
//!
//! let directory = ProgramDirectory::start(DirectoryConfig::default());
//! directory
//!     .apply_chunk(
//!         ProgramListChunk::modified(vec![
//!             ProgramInfo::new(ProgramSelector::amfm(100_000)),
//!             ProgramInfo::new(ProgramSelector::amfm(200_000)),
//!         ])
//!         .completing(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(directory.snapshot(None).len(), 2);
//! assert_eq!(directory.scan_status().state, ScanState::Complete);
//! ```

pub mod announcement;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod supervisor;

pub use announcement::{AnnouncementDelta, AnnouncementRouter, AnnouncementSubscription};
pub use directory::{
    ChunkOutcome, DirectoryConfig, DirectorySubscription, ProgramDirectory, Watermark,
};
pub use error::{DirectoryError, FeedError, Result};
pub use supervisor::{ScanEvent, ScanState, ScanStatus, ScanSupervisor};
