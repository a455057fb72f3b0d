use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::OutcomeStatus;
use crate::{Dataset, ValidationError};

/// The two enrichment jobs the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Similar symbols for every ticker traded in the journal.
    Peers,
    /// Price and company name for every ticker on a watchlist.
    Watchlist,
}

impl JobKind {
    pub const ALL: [Self; 2] = [Self::Peers, Self::Watchlist];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Peers => "peers",
            Self::Watchlist => "watchlist",
        }
    }

    pub const fn dataset(self) -> Dataset {
        match self {
            Self::Peers => Dataset::Peers,
            Self::Watchlist => Dataset::Quote,
        }
    }

    /// Status recorded when no provider had data for a symbol.
    pub const fn empty_status(self) -> OutcomeStatus {
        match self {
            Self::Peers => OutcomeStatus::NoPeersFound,
            Self::Watchlist => OutcomeStatus::NoDataFound,
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "peers" => Ok(Self::Peers),
            "watchlist" => Ok(Self::Watchlist),
            other => Err(ValidationError::InvalidJob {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_map_to_datasets_and_empty_labels() {
        assert_eq!(JobKind::Peers.dataset(), Dataset::Peers);
        assert_eq!(JobKind::Watchlist.dataset(), Dataset::Quote);
        assert_eq!(JobKind::Peers.empty_status(), OutcomeStatus::NoPeersFound);
        assert_eq!(JobKind::Watchlist.empty_status(), OutcomeStatus::NoDataFound);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Watchlist".parse::<JobKind>(), Ok(JobKind::Watchlist));
        assert!("quotes".parse::<JobKind>().is_err());
    }
}
