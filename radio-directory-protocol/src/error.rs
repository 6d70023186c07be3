//! Error types for the program directory protocol.

use thiserror::Error;

use crate::identifier::{Identifier, IdentifierType};

/// A chunk that breaks the update contract.
///
/// A chunk carrying a violation is dropped in its entirety; it is never
/// partially applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A purge chunk must not carry removals.
    #[error("Purge chunk carries {count} removal(s)")]
    PurgeWithRemovals { count: usize },

    /// A modified entry has an invalid or absent primary identifier.
    #[error("Invalid primary identifier: {0}")]
    InvalidPrimary(Identifier),

    /// A modified entry uses a known kind that can never be a primary.
    #[error("Identifier type {0:?} cannot be a primary identifier")]
    NonPrimaryKind(IdentifierType),
}

/// Tuning request rejected against the region capability tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TuneRequestError {
    /// Primary identifier kind is not a legal primary kind.
    #[error("Unsupported primary identifier: {0}")]
    UnsupportedPrimary(Identifier),

    /// Frequency is outside every configured band.
    #[error("Frequency {0} kHz is outside the configured bands")]
    OutOfBand(u32),

    /// Frequency is inside a band but not on its channel grid.
    #[error("Frequency {frequency_khz} kHz is not on the {spacing_khz} kHz grid")]
    OffGrid { frequency_khz: u32, spacing_khz: u32 },
}
