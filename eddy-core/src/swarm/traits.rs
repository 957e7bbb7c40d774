//! Accessor and mutator contracts the scheduler drives
//!
//! Implementations are owned by the surrounding client. The scheduler only
//! calls these while holding the client lock, so none of them need internal
//! synchronization.

use super::{
    ChunkRequest, ChunkSpec, InfoHash, PieceIndex, PiecePriority, RequestError, StorageBudget,
};

/// Live scheduling attributes of one piece.
///
/// Every accessor reads current state; the scheduler never caches the
/// results beyond a single pass.
pub trait Piece {
    /// Current priority, computed without any caching.
    fn priority(&self) -> PiecePriority;

    /// Whether at least one chunk is already stored.
    fn is_partially_downloaded(&self) -> bool;

    /// Number of connected peers known to have the piece.
    fn availability(&self) -> u32;

    /// Length of the piece in bytes.
    fn length(&self) -> u64;

    /// Chunks not yet stored and not excluded, in request order.
    fn undirtied_chunks(&self) -> impl Iterator<Item = ChunkSpec> + '_;
}

/// One peer connection attached to a download.
pub trait PeerConnection {
    /// Whether the connection has been closed.
    fn is_closed(&self) -> bool;

    /// Observed download rate from this peer in bytes per second.
    fn download_rate(&self) -> f64;

    /// Whether the remote is choking us.
    fn is_choking(&self) -> bool;

    /// Number of requests we have outstanding on this peer.
    fn outstanding_request_count(&self) -> usize;

    /// Whether `request` is currently outstanding on this peer.
    fn has_outstanding_request(&self, request: &ChunkRequest) -> bool;

    /// Whether the outgoing write buffer is full.
    fn is_write_buffer_full(&self) -> bool;

    /// Tries to issue `request` to the peer.
    ///
    /// A request that is already outstanding counts as accepted.
    ///
    /// # Errors
    /// - `RequestError::Choked` - Remote is choking us
    /// - `RequestError::QueueFull` - Too many outstanding requests
    /// - `RequestError::PieceUnavailable` - Peer does not have the piece
    /// - `RequestError::Closed` - Connection is closed
    fn try_request(&mut self, request: ChunkRequest) -> Result<(), RequestError>;

    /// Cancels `request` if it is outstanding; a no-op otherwise.
    fn cancel(&mut self, request: &ChunkRequest);

    /// Updates the interest we signal to the peer.
    fn set_interested(&mut self, interested: bool);
}

/// An in-progress download as seen by the scheduler.
///
/// Peers are exposed as a slice so the scheduler can address them by their
/// stable insertion index while mutating them.
pub trait Download {
    /// Connection type attached to this download.
    type Peer: PeerConnection;

    /// Borrowed view of one piece.
    type Piece<'a>: Piece
    where
        Self: 'a;

    /// Identity of the download.
    fn info_hash(&self) -> InfoHash;

    /// Whether metadata is loaded; pieces are only scheduled once it is.
    fn has_metadata(&self) -> bool;

    /// Number of pieces in the download.
    fn piece_count(&self) -> u32;

    /// Storage admission budget, shared by handle identity. `None` is unbounded.
    fn storage_budget(&self) -> Option<&StorageBudget>;

    /// Returns the piece at `index`.
    fn piece(&self, index: PieceIndex) -> Self::Piece<'_>;

    /// Whether the piece must not be requested (complete, unwanted, ...).
    fn should_ignore_piece(&self, index: PieceIndex) -> bool;

    /// Attached peer connections, closed ones included.
    fn peers(&self) -> &[Self::Peer];

    /// Mutable access to the attached peer connections.
    fn peers_mut(&mut self) -> &mut [Self::Peer];
}
