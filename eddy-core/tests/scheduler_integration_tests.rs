//! End-to-end dispatch scenarios over in-memory downloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eddy_core::scheduler::{DownloadSlot, RequestOrder};
use eddy_core::swarm::{MemoryDownload, MemoryPeer};
use eddy_core::{
    ChunkRequest, ChunkSpec, Download, InfoHash, PeerConnection, PieceIndex, PiecePriority,
    Scheduler, SchedulerConfig, StorageBudget, Swarm,
};

const CHUNK: u32 = 16 * 1024;
const PIECE: u32 = 2 * CHUNK;

fn hash(seed: u8) -> InfoHash {
    InfoHash::new([seed; 20])
}

/// D1: piece 0 at priority 10 held by three peers, piece 1 at priority 10
/// held by one peer and partially stored. D2: one piece at priority 20.
fn priority_scenario(budget: Option<StorageBudget>) -> Vec<MemoryDownload> {
    let mut first = MemoryDownload::new(hash(1), 2 * u64::from(PIECE), PIECE);
    first.set_all_priorities(PiecePriority(10));
    first.mark_chunk_stored(&ChunkRequest::new(
        PieceIndex::new(1),
        ChunkSpec::new(0, CHUNK),
    ));
    first.add_peer(MemoryPeer::new(2).unchoked().with_pieces([0, 1]));
    first.add_peer(MemoryPeer::new(2).unchoked().with_pieces([0]));
    first.add_peer(MemoryPeer::new(2).unchoked().with_pieces([0]));

    let mut second = MemoryDownload::new(hash(2), u64::from(PIECE), PIECE);
    second.set_all_priorities(PiecePriority(20));
    second.add_peer(MemoryPeer::seeder(1));

    if let Some(budget) = budget {
        first = first.with_storage_budget(budget.clone());
        second = second.with_storage_budget(budget);
    }
    vec![first, second]
}

fn requested_pieces(download: &MemoryDownload) -> Vec<u32> {
    let mut pieces: Vec<u32> = download
        .peers()
        .iter()
        .flat_map(|peer| peer.outstanding_requests())
        .map(|request| request.piece.as_u32())
        .collect();
    pieces.sort_unstable();
    pieces.dedup();
    pieces
}

#[test]
fn test_request_order_priority_then_partial_then_availability() {
    let downloads = priority_scenario(None);
    let mut order = RequestOrder::new();
    for (slot, download) in downloads.iter().enumerate() {
        order.add_pieces(DownloadSlot(slot), download.piece_count());
    }

    order.refresh(&downloads);
    order.sort();

    let walked: Vec<(usize, u32)> = order
        .pieces()
        .iter()
        .map(|record| (record.download.0, record.index.as_u32()))
        .collect();
    assert_eq!(walked, vec![(1, 0), (0, 1), (0, 0)]);
}

#[test]
fn test_shared_budget_admits_pieces_in_request_order() {
    // Room for exactly two pieces across both downloads
    let budget = StorageBudget::fixed(2 * u64::from(PIECE));
    let mut swarm = Swarm::new();
    for download in priority_scenario(Some(budget)) {
        swarm.add_download(download).unwrap();
    }

    let report = swarm.run_pass(&SchedulerConfig::default());

    assert_eq!(report.pieces_over_budget, 1);
    assert_eq!(requested_pieces(swarm.download(hash(2)).unwrap()), vec![0]);
    assert_eq!(requested_pieces(swarm.download(hash(1)).unwrap()), vec![1]);

    // Only the missing second chunk of the partial piece goes out
    let first = swarm.download(hash(1)).unwrap();
    let outstanding: Vec<ChunkRequest> = first
        .peer(0)
        .unwrap()
        .outstanding_requests()
        .copied()
        .collect();
    assert_eq!(
        outstanding,
        vec![ChunkRequest::new(
            PieceIndex::new(1),
            ChunkSpec::new(CHUNK, CHUNK)
        )]
    );
}

#[test]
fn test_budget_one_byte_short_skips_top_piece_only() {
    // Piece 0 is 32 KiB at high priority, piece 1 is a 16 KiB tail
    let budget = StorageBudget::fixed(u64::from(PIECE) - 1);
    let mut download = MemoryDownload::new(hash(3), u64::from(PIECE + CHUNK), PIECE)
        .with_storage_budget(budget);
    download.set_piece_priority(PieceIndex::new(0), PiecePriority::HIGH);
    download.add_peer(MemoryPeer::seeder(2));
    let mut swarm = Swarm::new();
    swarm.add_download(download).unwrap();

    let report = swarm.run_pass(&SchedulerConfig::default());

    assert_eq!(report.pieces_over_budget, 1);
    assert_eq!(report.requests_accepted, 1);
    assert_eq!(requested_pieces(swarm.download(hash(3)).unwrap()), vec![1]);
}

#[test]
fn test_budget_capacity_queried_once_per_pass() {
    let queries = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&queries);
    let budget = StorageBudget::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        None::<u64>
    });
    let mut swarm = Swarm::new();
    for download in priority_scenario(Some(budget)) {
        swarm.add_download(download).unwrap();
    }

    swarm.run_pass(&SchedulerConfig::default());
    swarm.run_pass(&SchedulerConfig::default());

    assert_eq!(queries.load(Ordering::SeqCst), 2);
}

#[test]
fn test_closed_peer_never_receives_requests() {
    let mut download = MemoryDownload::new(hash(4), u64::from(PIECE), PIECE);
    let closed = download.add_peer(MemoryPeer::seeder(1).with_download_rate(1e9));
    download.peer_mut(closed).unwrap().close();
    let live = download.add_peer(MemoryPeer::seeder(1));
    let mut swarm = Swarm::new();
    swarm.add_download(download).unwrap();

    swarm.run_pass(&SchedulerConfig::default());

    let download = swarm.download(hash(4)).unwrap();
    assert_eq!(download.peer(closed).unwrap().outstanding_request_count(), 0);
    assert!(download.peer(closed).unwrap().cancel_log().is_empty());
    assert_eq!(download.peer(live).unwrap().outstanding_request_count(), 2);
}

#[test]
fn test_metadata_arrival_makes_download_schedulable() {
    let mut pending = MemoryDownload::awaiting_metadata(hash(5));
    pending.add_peer(MemoryPeer::seeder(1));
    let mut swarm = Swarm::new();
    swarm.add_download(pending).unwrap();

    assert_eq!(
        swarm.run_pass(&SchedulerConfig::default()).requests_accepted,
        0
    );

    swarm
        .download_mut(hash(5))
        .unwrap()
        .load_metadata(u64::from(PIECE), PIECE);

    assert_eq!(
        swarm.run_pass(&SchedulerConfig::default()).requests_accepted,
        2
    );
}

#[test]
fn test_delivered_chunks_not_requested_again() {
    let mut download = MemoryDownload::new(hash(6), u64::from(PIECE), PIECE);
    download.add_peer(MemoryPeer::seeder(1));
    let mut swarm = Swarm::new();
    swarm.add_download(download).unwrap();
    let config = SchedulerConfig::default();

    swarm.run_pass(&config);
    let download = swarm.download_mut(hash(6)).unwrap();
    let served = download.peer_mut(0).unwrap().take_served_requests(1);
    for request in &served {
        assert!(download.deliver(request));
    }
    let report = swarm.run_pass(&config);

    assert_eq!(report.requests_accepted, 1);
    let download = swarm.download(hash(6)).unwrap();
    assert!(download.peer(0).unwrap().is_interested());
    assert_eq!(download.peer(0).unwrap().outstanding_request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_task_drives_swarm_to_completion() {
    let mut download = MemoryDownload::new(hash(7), 4 * u64::from(PIECE), PIECE);
    download.add_peer(MemoryPeer::seeder(4).with_queue_depth(4));
    let mut swarm = Swarm::new();
    swarm.add_download(download).unwrap();
    let swarm = swarm.into_shared();

    let config = SchedulerConfig {
        pass_interval: Duration::from_millis(5),
        ..Default::default()
    };
    let handle = Scheduler::new(Arc::clone(&swarm), config).spawn();

    // Serve two chunks between passes until everything is stored
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut guard = swarm.lock();
        let Some(download) = guard.download_mut(hash(7)) else {
            break;
        };
        let served = download.peer_mut(0).unwrap().take_served_requests(2);
        for request in &served {
            download.deliver(request);
        }
        if download.is_complete() {
            break;
        }
    }

    let summary = handle.shutdown().await.unwrap();
    let guard = swarm.lock();
    let download = guard.download(hash(7)).unwrap();
    assert!(download.is_complete());
    assert_eq!(download.completed_piece_count(), 4);
    assert!(summary.passes > 1);
}
