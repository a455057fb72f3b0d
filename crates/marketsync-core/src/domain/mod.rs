//! # Domain Models
//!
//! Validated types shared by every pipeline stage.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Normalized ticker (`[A-Z0-9._-]`, 1-20 chars) |
//! | [`UtcDateTime`] | UTC timestamp stamped at transform time |
//! | [`PeerRecord`] | Similar-symbol record keyed by `(symbol, peer_of, provider)` |
//! | [`WatchlistEnrichment`] | Price enrichment keyed by `item_id` |
//! | [`CanonicalRecord`] | Either of the above, as handed to the record store |
//! | [`WatchlistItem`] | Watchlist entry read from the symbol source |

mod records;
mod symbol;
mod timestamp;

pub(crate) use records::validate_finite;
pub use records::{CanonicalRecord, PeerRecord, WatchlistEnrichment, WatchlistItem};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
