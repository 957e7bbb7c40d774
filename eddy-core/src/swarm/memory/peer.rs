//! In-memory peer connection with bitfield and bounded request queue

use std::collections::VecDeque;

use crate::swarm::{ChunkRequest, PeerConnection, PieceIndex, RequestError};

/// Maximum number of outstanding requests per peer unless overridden
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Peer connection state kept in memory.
///
/// Mirrors the protocol rules that matter to request scheduling: a choking
/// peer drops all outstanding requests, requests are refused for pieces the
/// peer does not have, and the queue depth is bounded.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    download_rate: f64,
    closed: bool,
    /// Whether the peer is choking us
    choking: bool,
    /// Whether we signal interest to the peer
    interested: bool,
    write_buffer_full: bool,
    /// One flag per piece the peer has
    pieces: Vec<bool>,
    outstanding: VecDeque<ChunkRequest>,
    queue_depth: usize,
    /// Every cancel the scheduler sent, in order
    cancel_log: Vec<ChunkRequest>,
}

impl MemoryPeer {
    /// Creates a peer that has no pieces and is choking us.
    pub fn new(piece_count: u32) -> Self {
        Self {
            download_rate: 0.0,
            closed: false,
            choking: true,
            interested: false,
            write_buffer_full: false,
            pieces: vec![false; piece_count as usize],
            outstanding: VecDeque::new(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            cancel_log: Vec::new(),
        }
    }

    /// Creates an unchoked peer that has every piece.
    pub fn seeder(piece_count: u32) -> Self {
        let mut peer = Self::new(piece_count).unchoked();
        peer.pieces.fill(true);
        peer
    }

    /// Sets the observed download rate in bytes per second.
    pub fn with_download_rate(mut self, download_rate: f64) -> Self {
        self.download_rate = download_rate;
        self
    }

    /// Sets the maximum number of outstanding requests.
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Marks the given pieces as present on the peer.
    pub fn with_pieces(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        for index in indices {
            self.set_has_piece(PieceIndex::new(index));
        }
        self
    }

    /// Starts the peer unchoked.
    pub fn unchoked(mut self) -> Self {
        self.choking = false;
        self
    }

    /// Records a have message, growing the bitfield if needed.
    pub fn set_has_piece(&mut self, index: PieceIndex) {
        if index.as_usize() >= self.pieces.len() {
            self.pieces.resize(index.as_usize() + 1, false);
        }
        self.pieces[index.as_usize()] = true;
    }

    /// Whether the peer has the piece.
    pub fn has_piece(&self, index: PieceIndex) -> bool {
        self.pieces.get(index.as_usize()).copied().unwrap_or(false)
    }

    /// Handles choke/unchoke from the peer. Choking drops outstanding requests.
    pub fn set_choking(&mut self, choking: bool) {
        self.choking = choking;
        if choking {
            self.outstanding.clear();
        }
    }

    /// Sets whether the outgoing write buffer is full.
    pub fn set_write_buffer_full(&mut self, full: bool) {
        self.write_buffer_full = full;
    }

    /// Closes the connection, dropping outstanding requests.
    pub fn close(&mut self) {
        self.closed = true;
        self.outstanding.clear();
    }

    /// Whether we currently signal interest.
    pub fn is_interested(&self) -> bool {
        self.interested
    }

    /// Outstanding requests in the order they were issued.
    pub fn outstanding_requests(&self) -> impl Iterator<Item = &ChunkRequest> {
        self.outstanding.iter()
    }

    /// Cancels sent to this peer, in order.
    pub fn cancel_log(&self) -> &[ChunkRequest] {
        &self.cancel_log
    }

    /// Serves up to `max` of the oldest outstanding requests.
    pub fn take_served_requests(&mut self, max: usize) -> Vec<ChunkRequest> {
        let count = max.min(self.outstanding.len());
        self.outstanding.drain(..count).collect()
    }

    /// Drops `request` from the queue without recording a cancel.
    pub(crate) fn retire_request(&mut self, request: &ChunkRequest) {
        self.outstanding.retain(|outstanding| outstanding != request);
    }
}

impl PeerConnection for MemoryPeer {
    fn is_closed(&self) -> bool {
        self.closed
    }

    fn download_rate(&self) -> f64 {
        self.download_rate
    }

    fn is_choking(&self) -> bool {
        self.choking
    }

    fn outstanding_request_count(&self) -> usize {
        self.outstanding.len()
    }

    fn has_outstanding_request(&self, request: &ChunkRequest) -> bool {
        self.outstanding.contains(request)
    }

    fn is_write_buffer_full(&self) -> bool {
        self.write_buffer_full
    }

    fn try_request(&mut self, request: ChunkRequest) -> Result<(), RequestError> {
        if self.closed {
            return Err(RequestError::Closed);
        }
        if self.has_outstanding_request(&request) {
            return Ok(());
        }
        if !self.has_piece(request.piece) {
            return Err(RequestError::PieceUnavailable {
                piece: request.piece,
            });
        }

        // Interest is signalled even when the request cannot go out yet
        self.interested = true;

        if self.choking {
            return Err(RequestError::Choked);
        }
        if self.outstanding.len() >= self.queue_depth {
            return Err(RequestError::QueueFull {
                limit: self.queue_depth,
            });
        }

        self.outstanding.push_back(request);
        Ok(())
    }

    fn cancel(&mut self, request: &ChunkRequest) {
        self.cancel_log.push(*request);
        self.retire_request(request);
    }

    fn set_interested(&mut self, interested: bool) {
        self.interested = interested;
    }
}
