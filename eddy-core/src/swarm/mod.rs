//! Download, piece and peer contracts consumed by the scheduler
//!
//! The scheduler never touches wire I/O or storage directly. Everything it
//! needs is read and mutated through the [`Download`], [`Piece`] and
//! [`PeerConnection`] traits; [`memory`] provides an in-process implementation.

pub mod budget;
pub mod memory;
pub mod traits;

use std::fmt;

pub use budget::{BudgetId, StorageBudget, StorageCapacity};
pub use memory::{MemoryDownload, MemoryPeer, MemoryPieceView};
pub use traits::{Download, PeerConnection, Piece};

/// SHA-1 hash identifying a unique download.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Zero-based index of a piece within a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceIndex(pub u32);

impl PieceIndex {
    /// Creates PieceIndex from zero-based index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying piece index as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the index as a slice position.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request urgency of a piece. Higher values are more urgent.
///
/// The named levels form the usual ladder; any ordinal is accepted so callers
/// can express finer gradations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PiecePriority(pub u8);

impl PiecePriority {
    /// Piece is not wanted
    pub const NONE: Self = Self(0);
    /// Ordinary background download
    pub const NORMAL: Self = Self(1);
    /// Raised by the user
    pub const HIGH: Self = Self(2);
    /// Ahead of a reader
    pub const READAHEAD: Self = Self(3);
    /// Immediately after the reader position
    pub const NEXT: Self = Self(4);
    /// Blocking a reader right now
    pub const NOW: Self = Self(5);

    /// Whether the piece should be requested at all.
    pub fn is_wanted(self) -> bool {
        self > Self::NONE
    }
}

impl fmt::Display for PiecePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => write!(f, "none"),
            Self::NORMAL => write!(f, "normal"),
            Self::HIGH => write!(f, "high"),
            Self::READAHEAD => write!(f, "readahead"),
            Self::NEXT => write!(f, "next"),
            Self::NOW => write!(f, "now"),
            Self(other) => write!(f, "{other}"),
        }
    }
}

/// Byte range of a chunk inside its piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkSpec {
    pub offset: u32,
    pub length: u32,
}

impl ChunkSpec {
    /// Creates a chunk covering `length` bytes from `offset`.
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }
}

/// A single chunk request addressed to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkRequest {
    pub piece: PieceIndex,
    pub chunk: ChunkSpec,
}

impl ChunkRequest {
    /// Creates a request for `chunk` of piece `piece`.
    pub fn new(piece: PieceIndex, chunk: ChunkSpec) -> Self {
        Self { piece, chunk }
    }
}

impl fmt::Display for ChunkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "piece {} [{}+{}]",
            self.piece, self.chunk.offset, self.chunk.length
        )
    }
}

/// Reasons a peer connection refuses a chunk request.
///
/// Always local to one peer: the scheduler moves on to the next ranked peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Peer is choking us")]
    Choked,

    #[error("Request queue full ({limit} outstanding)")]
    QueueFull { limit: usize },

    #[error("Peer does not have piece {piece}")]
    PieceUnavailable { piece: PieceIndex },

    #[error("Connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_piece_priority_ladder_ordering() {
        assert!(PiecePriority::NOW > PiecePriority::NEXT);
        assert!(PiecePriority::NEXT > PiecePriority::READAHEAD);
        assert!(PiecePriority::HIGH > PiecePriority::NORMAL);
        assert!(!PiecePriority::NONE.is_wanted());
        assert!(PiecePriority(20).is_wanted());
        assert_eq!(PiecePriority::READAHEAD.to_string(), "readahead");
        assert_eq!(PiecePriority(20).to_string(), "20");
    }

    #[test]
    fn test_chunk_request_display() {
        let request = ChunkRequest::new(PieceIndex::new(3), ChunkSpec::new(16384, 16384));
        assert_eq!(request.to_string(), "piece 3 [16384+16384]");
    }
}
