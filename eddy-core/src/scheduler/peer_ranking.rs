//! Per-download peer ranking with fairness rotation.
//!
//! Peers are addressed by their insertion index in the download's peer slice.
//! The ranking is an index array; rotation is a stable partition with an
//! explicit partition point.

use crate::swarm::PeerConnection;

/// Live peers of one download, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRanking {
    order: Vec<usize>,
}

impl PeerRanking {
    /// Ranks the live peers of a download by download rate, fastest first.
    ///
    /// Equal rates fall back to insertion index so the result is deterministic.
    pub fn rank<P: PeerConnection>(peers: &[P]) -> Self {
        let mut order: Vec<usize> = peers
            .iter()
            .enumerate()
            .filter(|(_, peer)| !peer.is_closed())
            .map(|(index, _)| index)
            .collect();

        order.sort_by(|&a, &b| {
            peers[b]
                .download_rate()
                .total_cmp(&peers[a].download_rate())
                .then_with(|| a.cmp(&b))
        });

        Self { order }
    }

    /// Peer insertion indices in rank order.
    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Number of ranked peers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no peer is ranked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Moves every contributing position to the back, preserving relative order
    /// on both sides.
    ///
    /// `contributed[i]` refers to rank position `i`; missing entries count as
    /// not contributed. Returns the partition point: the rank position of the
    /// first contributor after rotation.
    pub fn rotate_contributors(&mut self, contributed: &[bool]) -> usize {
        let did_contribute = |position: usize| contributed.get(position).copied().unwrap_or(false);

        let (kept, rotated): (Vec<(usize, usize)>, Vec<(usize, usize)>) = self
            .order
            .iter()
            .copied()
            .enumerate()
            .partition(|&(position, _)| !did_contribute(position));

        let partition_point = kept.len();
        self.order = kept
            .into_iter()
            .chain(rotated)
            .map(|(_, peer)| peer)
            .collect();
        partition_point
    }
}
