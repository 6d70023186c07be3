//! Program directory and its subscription feed.

mod subscription;
mod synchronizer;

pub use subscription::DirectorySubscription;
pub use synchronizer::{
    ChunkOutcome, DirectoryConfig, FoldedChunk, ProgramDirectory, Watermark,
    DEFAULT_FEED_CAPACITY, DEFAULT_SCAN_TIMEOUT,
};
