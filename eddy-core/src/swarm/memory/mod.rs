//! In-memory downloads and peers
//!
//! Implements the scheduler contracts over plain vectors: per-chunk storage
//! flags, per-piece priorities and peers with bitfields and bounded request
//! queues. Used by the simulator, the CLI and the scheduler tests.

mod peer;

pub use peer::{DEFAULT_QUEUE_DEPTH, MemoryPeer};

use super::{
    ChunkRequest, ChunkSpec, Download, InfoHash, PeerConnection, Piece, PieceIndex,
    PiecePriority, StorageBudget,
};
use crate::config::DEFAULT_CHUNK_LENGTH;

/// Storage state of one piece.
#[derive(Debug, Clone)]
struct MemoryPiece {
    length: u32,
    priority: PiecePriority,
    stored: Vec<bool>,
}

impl MemoryPiece {
    fn new(length: u32, chunk_length: u32) -> Self {
        Self {
            length,
            priority: PiecePriority::NORMAL,
            stored: vec![false; length.div_ceil(chunk_length) as usize],
        }
    }

    fn is_complete(&self) -> bool {
        self.stored.iter().all(|&stored| stored)
    }

    fn is_partial(&self) -> bool {
        self.stored.iter().any(|&stored| stored) && !self.is_complete()
    }
}

/// Download held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDownload {
    info_hash: InfoHash,
    has_metadata: bool,
    chunk_length: u32,
    pieces: Vec<MemoryPiece>,
    peers: Vec<MemoryPeer>,
    storage_budget: Option<StorageBudget>,
}

impl MemoryDownload {
    /// Creates a download with metadata loaded and every piece at normal priority.
    ///
    /// The last piece is truncated to `total_length`.
    pub fn new(info_hash: InfoHash, total_length: u64, piece_length: u32) -> Self {
        let mut download = Self::awaiting_metadata(info_hash);
        download.load_metadata(total_length, piece_length);
        download
    }

    /// Creates a download whose metadata has not arrived yet.
    pub fn awaiting_metadata(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            has_metadata: false,
            chunk_length: DEFAULT_CHUNK_LENGTH,
            pieces: Vec::new(),
            peers: Vec::new(),
            storage_budget: None,
        }
    }

    /// Lays out pieces once metadata is known. Existing storage state is discarded.
    pub fn load_metadata(&mut self, total_length: u64, piece_length: u32) {
        let piece_length = piece_length.max(1);
        let piece_count = total_length.div_ceil(u64::from(piece_length));

        self.pieces = (0..piece_count)
            .map(|index| {
                let start = index * u64::from(piece_length);
                let length = (total_length - start).min(u64::from(piece_length)) as u32;
                MemoryPiece::new(length, self.chunk_length)
            })
            .collect();
        self.has_metadata = true;
    }

    /// Re-splits every piece into chunks of `chunk_length` bytes.
    pub fn with_chunk_length(mut self, chunk_length: u32) -> Self {
        self.chunk_length = chunk_length.max(1);
        for piece in &mut self.pieces {
            *piece = MemoryPiece {
                priority: piece.priority,
                ..MemoryPiece::new(piece.length, self.chunk_length)
            };
        }
        self
    }

    /// Attaches a storage admission budget.
    pub fn with_storage_budget(mut self, budget: StorageBudget) -> Self {
        self.storage_budget = Some(budget);
        self
    }

    /// Chunk length pieces are split into.
    pub fn chunk_length(&self) -> u32 {
        self.chunk_length
    }

    /// Sets the priority of one piece. Returns false for an unknown index.
    pub fn set_piece_priority(&mut self, index: PieceIndex, priority: PiecePriority) -> bool {
        match self.pieces.get_mut(index.as_usize()) {
            Some(piece) => {
                piece.priority = priority;
                true
            }
            None => false,
        }
    }

    /// Sets the priority of every piece.
    pub fn set_all_priorities(&mut self, priority: PiecePriority) {
        for piece in &mut self.pieces {
            piece.priority = priority;
        }
    }

    /// Marks the chunk addressed by `request` as stored.
    ///
    /// Returns true if the chunk was not stored before.
    pub fn mark_chunk_stored(&mut self, request: &ChunkRequest) -> bool {
        let chunk_length = self.chunk_length;
        let Some(piece) = self.pieces.get_mut(request.piece.as_usize()) else {
            return false;
        };
        if request.chunk.offset % chunk_length != 0 {
            return false;
        }
        match piece.stored.get_mut((request.chunk.offset / chunk_length) as usize) {
            Some(stored) if !*stored => {
                *stored = true;
                true
            }
            _ => false,
        }
    }

    /// Stores a received chunk and retires the request on every peer.
    ///
    /// Returns true if the chunk was newly stored.
    pub fn deliver(&mut self, request: &ChunkRequest) -> bool {
        for peer in &mut self.peers {
            peer.retire_request(request);
        }
        self.mark_chunk_stored(request)
    }

    /// Marks every chunk of a piece as stored.
    pub fn mark_piece_complete(&mut self, index: PieceIndex) {
        if let Some(piece) = self.pieces.get_mut(index.as_usize()) {
            piece.stored.fill(true);
        }
    }

    /// Number of fully stored pieces.
    pub fn completed_piece_count(&self) -> u32 {
        self.pieces.iter().filter(|piece| piece.is_complete()).count() as u32
    }

    /// Whether metadata is loaded and every wanted piece is stored.
    pub fn is_complete(&self) -> bool {
        self.has_metadata
            && self
                .pieces
                .iter()
                .all(|piece| piece.is_complete() || !piece.priority.is_wanted())
    }

    /// Attaches a peer and returns its insertion index.
    pub fn add_peer(&mut self, peer: MemoryPeer) -> usize {
        self.peers.push(peer);
        self.peers.len() - 1
    }

    /// Returns the peer with the given insertion index.
    pub fn peer(&self, index: usize) -> Option<&MemoryPeer> {
        self.peers.get(index)
    }

    /// Returns the peer with the given insertion index mutably.
    pub fn peer_mut(&mut self, index: usize) -> Option<&mut MemoryPeer> {
        self.peers.get_mut(index)
    }
}

/// Borrowed scheduling view of one piece of a [`MemoryDownload`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryPieceView<'a> {
    download: &'a MemoryDownload,
    index: PieceIndex,
}

impl MemoryPieceView<'_> {
    fn state(&self) -> &MemoryPiece {
        &self.download.pieces[self.index.as_usize()]
    }
}

impl Piece for MemoryPieceView<'_> {
    fn priority(&self) -> PiecePriority {
        let piece = self.state();
        if piece.is_complete() {
            PiecePriority::NONE
        } else {
            piece.priority
        }
    }

    fn is_partially_downloaded(&self) -> bool {
        self.state().is_partial()
    }

    fn availability(&self) -> u32 {
        self.download
            .peers
            .iter()
            .filter(|peer| !peer.is_closed() && peer.has_piece(self.index))
            .count() as u32
    }

    fn length(&self) -> u64 {
        u64::from(self.state().length)
    }

    fn undirtied_chunks(&self) -> impl Iterator<Item = ChunkSpec> + '_ {
        let piece = self.state();
        let chunk_length = self.download.chunk_length;
        piece
            .stored
            .iter()
            .enumerate()
            .filter(|(_, stored)| !**stored)
            .map(move |(chunk_index, _)| {
                let offset = chunk_index as u32 * chunk_length;
                ChunkSpec::new(offset, chunk_length.min(piece.length - offset))
            })
    }
}

impl Download for MemoryDownload {
    type Peer = MemoryPeer;
    type Piece<'a> = MemoryPieceView<'a>;

    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn has_metadata(&self) -> bool {
        self.has_metadata
    }

    fn piece_count(&self) -> u32 {
        self.pieces.len() as u32
    }

    fn storage_budget(&self) -> Option<&StorageBudget> {
        self.storage_budget.as_ref()
    }

    /// # Panics
    ///
    /// Accessors of the returned view panic if `index` is out of range.
    fn piece(&self, index: PieceIndex) -> MemoryPieceView<'_> {
        MemoryPieceView {
            download: self,
            index,
        }
    }

    fn should_ignore_piece(&self, index: PieceIndex) -> bool {
        self.pieces
            .get(index.as_usize())
            .is_none_or(|piece| piece.is_complete() || !piece.priority.is_wanted())
    }

    fn peers(&self) -> &[MemoryPeer] {
        &self.peers
    }

    fn peers_mut(&mut self) -> &mut [MemoryPeer] {
        &mut self.peers
    }
}
