//! Global piece request order across all downloads.
//!
//! One flat list of piece records spanning every download with metadata,
//! refreshed from live state and stably sorted once per dispatch pass.

use std::cmp::Ordering;

use crate::swarm::{Download, Piece, PieceIndex, PiecePriority};

/// Position of a download in the slice a pass was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadSlot(pub usize);

/// Scheduling attributes of one piece, valid for a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceRecord {
    pub download: DownloadSlot,
    pub index: PieceIndex,
    pub priority: PiecePriority,
    pub partial: bool,
    pub availability: u32,
}

impl PieceRecord {
    /// Creates a record with attributes not yet refreshed.
    pub fn new(download: DownloadSlot, index: PieceIndex) -> Self {
        Self {
            download,
            index,
            priority: PiecePriority::NONE,
            partial: false,
            availability: 0,
        }
    }

    /// Request order comparator.
    ///
    /// Higher priority first, then partially downloaded pieces, then rarest.
    pub fn compare_request_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.partial.cmp(&self.partial))
            .then_with(|| self.availability.cmp(&other.availability))
    }
}

/// Piece records of every eligible download.
#[derive(Debug, Default)]
pub struct RequestOrder {
    pieces: Vec<PieceRecord>,
}

impl RequestOrder {
    /// Creates an empty request order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record per piece of the download in `slot`.
    pub fn add_pieces(&mut self, slot: DownloadSlot, piece_count: u32) {
        self.pieces.reserve(piece_count as usize);
        self.pieces
            .extend((0..piece_count).map(|index| PieceRecord::new(slot, PieceIndex::new(index))));
    }

    /// Drops every record owned by the download in `slot`.
    pub fn remove_pieces(&mut self, slot: DownloadSlot) {
        self.pieces.retain(|record| record.download != slot);
    }

    /// Recomputes priority, partial flag and availability from live state.
    ///
    /// Records whose slot is outside `downloads` are left untouched.
    pub fn refresh<D: Download>(&mut self, downloads: &[D]) {
        for record in &mut self.pieces {
            let Some(download) = downloads.get(record.download.0) else {
                continue;
            };
            let piece = download.piece(record.index);
            record.priority = piece.priority();
            record.partial = piece.is_partially_downloaded();
            record.availability = piece.availability();
        }
    }

    /// Stable sort by [`PieceRecord::compare_request_order`].
    pub fn sort(&mut self) {
        self.pieces.sort_by(PieceRecord::compare_request_order);
    }

    /// Records in current order.
    pub fn pieces(&self) -> &[PieceRecord] {
        &self.pieces
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::swarm::{ChunkRequest, ChunkSpec, InfoHash, MemoryDownload, MemoryPeer};

    fn record(slot: usize, index: u32, priority: u8, partial: bool, availability: u32) -> PieceRecord {
        PieceRecord {
            download: DownloadSlot(slot),
            index: PieceIndex::new(index),
            priority: PiecePriority(priority),
            partial,
            availability,
        }
    }

    fn order_of(records: Vec<PieceRecord>) -> Vec<(usize, u32)> {
        let mut order = RequestOrder { pieces: records };
        order.sort();
        order
            .pieces()
            .iter()
            .map(|record| (record.download.0, record.index.as_u32()))
            .collect()
    }

    #[test]
    fn test_sort_higher_priority_first() {
        let sorted = order_of(vec![record(0, 0, 1, true, 0), record(0, 1, 5, false, 9)]);
        assert_eq!(sorted, vec![(0, 1), (0, 0)]);
    }

    #[test]
    fn test_sort_partial_beats_availability() {
        let sorted = order_of(vec![
            record(0, 0, 10, false, 1),
            record(0, 1, 10, true, 8),
        ]);
        assert_eq!(sorted, vec![(0, 1), (0, 0)]);
    }

    #[test]
    fn test_sort_rarest_first_within_equal_keys() {
        let sorted = order_of(vec![
            record(0, 0, 1, false, 4),
            record(0, 1, 1, false, 2),
            record(0, 2, 1, false, 3),
        ]);
        assert_eq!(sorted, vec![(0, 1), (0, 2), (0, 0)]);
    }

    #[test]
    fn test_sort_equal_keys_keep_insertion_order() {
        let sorted = order_of(vec![
            record(1, 3, 2, false, 1),
            record(0, 0, 2, false, 1),
            record(1, 1, 2, false, 1),
        ]);
        assert_eq!(sorted, vec![(1, 3), (0, 0), (1, 1)]);
    }

    #[test]
    fn test_remove_pieces_filters_by_download() {
        let mut order = RequestOrder::new();
        order.add_pieces(DownloadSlot(0), 3);
        order.add_pieces(DownloadSlot(1), 2);
        assert_eq!(order.len(), 5);

        order.remove_pieces(DownloadSlot(0));

        assert_eq!(order.len(), 2);
        assert!(order.pieces().iter().all(|r| r.download == DownloadSlot(1)));

        order.remove_pieces(DownloadSlot(1));
        assert!(order.is_empty());
    }

    #[test]
    fn test_refresh_reads_live_piece_state() {
        let mut download = MemoryDownload::new(InfoHash::new([1u8; 20]), 64 * 1024, 32 * 1024);
        download.set_piece_priority(PieceIndex::new(1), PiecePriority::HIGH);
        download.mark_chunk_stored(&ChunkRequest::new(
            PieceIndex::new(1),
            ChunkSpec::new(0, 16384),
        ));
        download.add_peer(MemoryPeer::seeder(2));
        download.add_peer(MemoryPeer::new(2).with_pieces([1]));
        let downloads = vec![download];

        let mut order = RequestOrder::new();
        order.add_pieces(DownloadSlot(0), 2);
        order.refresh(&downloads);

        assert_eq!(order.pieces()[0], record(0, 0, 1, false, 1));
        assert_eq!(order.pieces()[1], record(0, 1, 2, true, 2));
    }

    fn arbitrary_record() -> impl Strategy<Value = (u8, bool, u32)> {
        (0u8..4, any::<bool>(), 0u32..4)
    }

    proptest! {
        #[test]
        fn test_sort_any_records_adjacent_pairs_ordered(
            attributes in prop::collection::vec(arbitrary_record(), 0..40)
        ) {
            let records: Vec<PieceRecord> = attributes
                .iter()
                .enumerate()
                .map(|(i, &(priority, partial, availability))| {
                    record(0, i as u32, priority, partial, availability)
                })
                .collect();
            let mut order = RequestOrder { pieces: records };
            order.sort();

            for pair in order.pieces().windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.priority >= b.priority);
                if a.priority == b.priority {
                    prop_assert!(a.partial || !b.partial);
                    if a.partial == b.partial {
                        prop_assert!(a.availability <= b.availability);
                        if a.availability == b.availability {
                            prop_assert!(a.index < b.index);
                        }
                    }
                }
            }
        }

        #[test]
        fn test_sort_already_sorted_is_idempotent(
            attributes in prop::collection::vec(arbitrary_record(), 0..40)
        ) {
            let records: Vec<PieceRecord> = attributes
                .iter()
                .enumerate()
                .map(|(i, &(priority, partial, availability))| {
                    record(0, i as u32, priority, partial, availability)
                })
                .collect();
            let mut order = RequestOrder { pieces: records };
            order.sort();
            let once = order.pieces().to_vec();
            order.sort();
            prop_assert_eq!(once, order.pieces().to_vec());
        }
    }
}
