//! Station identity and program list definitions for the radio program directory.
//!
//! This crate defines the values exchanged between a tuning provider and its
//! consumers: typed identifiers, program selectors, program list chunks,
//! filters and announcements. It carries no state; the directory engine
//! lives in the `radio-directory` crate.
//!
//! # Station identity
//!
//! ```rust
//! use radio_directory_protocol::{Identifier, ProgramSelector};
//!
//! let a = ProgramSelector::with_secondary(
//!     Identifier::amfm_frequency(98_100),
//!     vec![Identifier::rds_pi(0xC101)],
//! );
//! let b = ProgramSelector::amfm(98_100);
//!
//! // Only the primary identifier defines identity
//! assert!(a.same_station(&b));
//! ```
//!
//! # Program list chunks
//!
//! ```rust
//! use radio_directory_protocol::{Identifier, ProgramInfo, ProgramListChunk, ProgramSelector};
//!
//! let chunk = ProgramListChunk::modified(vec![
//!     ProgramInfo::new(ProgramSelector::amfm(100_000)),
//! ])
//! .completing();
//! assert!(chunk.validate().is_ok());
//!
//! let mut bad = ProgramListChunk::purge();
//! bad.removed.push(Identifier::amfm_frequency(100_000));
//! assert!(bad.validate().is_err());
//! ```

pub mod error;
pub mod filter;
pub mod identifier;
pub mod region;
pub mod selector;
pub mod types;

pub use error::{ProtocolViolation, TuneRequestError};
pub use filter::ProgramFilter;
pub use identifier::{
    is_primary_candidate, is_vendor_scoped, technology_of, Identifier, IdentifierType,
    RadioTechnology, VENDOR_END, VENDOR_START,
};
pub use region::{validate_tune_request, AmFmBandRange, AmFmRegionConfig, RegionPreset};
pub use selector::ProgramSelector;
pub use types::{
    Announcement, AnnouncementType, Metadata, ProgramFlags, ProgramInfo, ProgramListChunk,
    VendorKeyValue,
};
