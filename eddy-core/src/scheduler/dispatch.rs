//! One dispatch pass over every download.
//!
//! Walks the global request order, reserves storage per piece, hands each
//! undirtied chunk to the best ranked peer that accepts it, cancels the same
//! chunk on every slower peer, rotates contributing peers to the back and
//! finally drops interest in idle peers.

use serde::Serialize;
use tracing::trace;

use super::admission::AdmissionTracker;
use super::peer_ranking::PeerRanking;
use super::piece_order::{DownloadSlot, PieceRecord, RequestOrder};
use crate::config::SchedulerConfig;
use crate::swarm::{ChunkRequest, ChunkSpec, Download, PeerConnection, Piece};

/// Counters describing what a dispatch pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Piece records walked
    pub pieces_considered: usize,
    /// Records skipped because the download ignores the piece
    pub pieces_ignored: usize,
    /// Records skipped because the piece did not fit the storage budget
    pub pieces_over_budget: usize,
    /// Requests a peer accepted, including ones it already held
    pub requests_accepted: usize,
    /// Requests a peer refused
    pub requests_rejected: usize,
    /// Cancels sent to peers ranked after the accepting one
    pub cancels_sent: usize,
    /// Chunks no peer accepted this pass
    pub chunks_unassigned: usize,
    /// Chunks left alone because a peer already held them
    pub chunks_already_requested: usize,
    /// Idle peers whose interest was switched off
    pub interest_cleared: usize,
}

impl PassReport {
    /// Adds every counter of `other` to this report.
    pub fn accumulate(&mut self, other: &PassReport) {
        self.pieces_considered += other.pieces_considered;
        self.pieces_ignored += other.pieces_ignored;
        self.pieces_over_budget += other.pieces_over_budget;
        self.requests_accepted += other.requests_accepted;
        self.requests_rejected += other.requests_rejected;
        self.cancels_sent += other.cancels_sent;
        self.chunks_unassigned += other.chunks_unassigned;
        self.chunks_already_requested += other.chunks_already_requested;
        self.interest_cleared += other.interest_cleared;
    }
}

/// Runs one complete dispatch pass.
///
/// Never fails: peer rejections fall through to the next ranked peer and
/// budget exhaustion skips the piece. Every download present at the start of
/// the pass is processed.
pub fn run_pass<D: Download>(downloads: &mut [D], config: &SchedulerConfig) -> PassReport {
    let mut report = PassReport::default();
    let mut admission = AdmissionTracker::new();
    let mut request_order = RequestOrder::new();
    let mut rankings = Vec::with_capacity(downloads.len());

    for (slot, download) in downloads.iter().enumerate() {
        if download.has_metadata() {
            if let Some(budget) = download.storage_budget() {
                admission.prime(budget);
            }
            request_order.add_pieces(DownloadSlot(slot), download.piece_count());
        }
        rankings.push(PeerRanking::rank(download.peers()));
    }
    request_order.refresh(downloads);
    request_order.sort();

    let mut contributed = Vec::new();
    for record in request_order.pieces() {
        report.pieces_considered += 1;
        let download = &mut downloads[record.download.0];

        if download.should_ignore_piece(record.index) {
            report.pieces_ignored += 1;
            continue;
        }

        let piece_length = download.piece(record.index).length();
        if !admission.admit(download.storage_budget(), piece_length) {
            trace!(
                "Piece {} of {} ({} bytes) exceeds storage budget",
                record.index,
                download.info_hash(),
                piece_length
            );
            report.pieces_over_budget += 1;
            continue;
        }

        let chunks: Vec<ChunkSpec> = download.piece(record.index).undirtied_chunks().collect();
        let ranking = &mut rankings[record.download.0];
        contributed.clear();
        contributed.resize(ranking.len(), false);

        dispatch_piece(
            download.peers_mut(),
            ranking,
            record,
            &chunks,
            &mut contributed,
            config,
            &mut report,
        );

        ranking.rotate_contributors(&contributed);
    }

    for download in downloads.iter_mut() {
        report.interest_cleared += clear_idle_interest(download.peers_mut());
    }

    report
}

/// Offers every chunk of one piece down the peer ranking.
fn dispatch_piece<P: PeerConnection>(
    peers: &mut [P],
    ranking: &PeerRanking,
    record: &PieceRecord,
    chunks: &[ChunkSpec],
    contributed: &mut [bool],
    config: &SchedulerConfig,
    report: &mut PassReport,
) {
    for &chunk in chunks {
        let request = ChunkRequest::new(record.index, chunk);

        if config.skip_already_requested
            && peers
                .iter()
                .any(|peer| peer.has_outstanding_request(&request))
        {
            report.chunks_already_requested += 1;
            continue;
        }

        let mut assigned = false;
        for (position, &peer_index) in ranking.as_slice().iter().enumerate() {
            let Some(peer) = peers.get_mut(peer_index) else {
                continue;
            };

            if assigned {
                peer.cancel(&request);
                report.cancels_sent += 1;
                continue;
            }

            match peer.try_request(request) {
                Ok(()) => {
                    contributed[position] = true;
                    assigned = true;
                    report.requests_accepted += 1;
                }
                Err(error) => {
                    trace!("Peer {} refused {}: {}", peer_index, request, error);
                    report.requests_rejected += 1;
                }
            }
        }

        if !assigned {
            report.chunks_unassigned += 1;
        }
    }
}

/// Drops interest in live peers that are unchoked, idle and writable.
///
/// Returns how many peers were updated.
fn clear_idle_interest<P: PeerConnection>(peers: &mut [P]) -> usize {
    let mut cleared = 0;
    for peer in peers.iter_mut().filter(|peer| !peer.is_closed()) {
        if !peer.is_choking()
            && peer.outstanding_request_count() == 0
            && !peer.is_write_buffer_full()
        {
            peer.set_interested(false);
            cleared += 1;
        }
    }
    cleared
}
