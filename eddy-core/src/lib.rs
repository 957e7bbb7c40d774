//! Eddy Core - Chunk request scheduling for BitTorrent-style downloads
//!
//! This crate decides, on a fixed cadence, which chunks to request from which
//! peers across every active download: global piece ordering, peer ranking,
//! storage admission, duplicate-request cancellation and interest signaling.
//! Peer wire I/O and piece storage stay outside; they are reached through the
//! traits in [`swarm`].

pub mod config;
pub mod scheduler;
pub mod swarm;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{EddyConfig, SchedulerConfig, SimulationConfig};
pub use scheduler::{
    PassReport, Scheduler, SchedulerError, SchedulerHandle, SchedulerState, SchedulerSummary,
    SharedSwarm, Swarm,
};
pub use swarm::{
    ChunkRequest, ChunkSpec, Download, InfoHash, PeerConnection, Piece, PieceIndex,
    PiecePriority, RequestError, StorageBudget,
};

/// Errors that can bubble up from any Eddy subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EddyError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Peer request error: {0}")]
    Request(#[from] RequestError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EddyError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            EddyError::Scheduler(e) => match e {
                SchedulerError::DownloadNotFound { info_hash } => {
                    format!("Download {info_hash} not found")
                }
                SchedulerError::DuplicateDownload { info_hash } => {
                    format!("Download {info_hash} is already scheduled")
                }
                _ => "Scheduler error occurred".to_string(),
            },
            EddyError::Request(_) => "Peer rejected a request".to_string(),
            EddyError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            EddyError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            EddyError::Configuration { .. }
                | EddyError::Scheduler(SchedulerError::DuplicateDownload { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_download_not_found_names_hash() {
        let info_hash = InfoHash::new([0xab; 20]);
        let error = EddyError::from(SchedulerError::DownloadNotFound { info_hash });

        assert_eq!(
            error.user_message(),
            format!("Download {} not found", "ab".repeat(20))
        );
        assert!(!error.is_user_error());
    }

    #[test]
    fn test_is_user_error_configuration_true() {
        let error = EddyError::Configuration {
            reason: "pass interval must be positive".to_string(),
        };
        assert!(error.is_user_error());
        assert_eq!(
            error.user_message(),
            "Invalid configuration: pass interval must be positive"
        );
    }
}
