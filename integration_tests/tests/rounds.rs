mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use conquest_core::{
    ConquestServer, ConquestState, ControlPointOutcome, EntityId, FactionId, InventoryHandle,
    MemoryTransport, Scheduler, ThreadScheduler,
};
use conquest_proto::{DestinationKind, Font, MessageBody};
use glam::DVec3;

use common::{decode_all, fixture_world, test_settings, FaultyWorld};

const BETA: DVec3 = DVec3::new(10000.0, 0.0, 0.0);

#[test]
fn full_round_rewards_each_uncontested_point() {
    let mut server = ConquestServer::new(
        test_settings(),
        ConquestState::default(),
        fixture_world(),
        MemoryTransport::new(),
    );

    let report = server.on_round_timer().expect("no pass in flight");
    assert!(report.completed);
    assert!(report.faults.is_empty());

    let outcomes: Vec<_> = report.results.iter().map(|r| r.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            ControlPointOutcome::Rewarded {
                faction: FactionId(1),
                grid: EntityId(100),
                inventory: InventoryHandle {
                    grid: EntityId(100),
                    block: 2,
                },
                amount: 5,
            },
            ControlPointOutcome::Tie { grid_count: 1 },
            ControlPointOutcome::Rewarded {
                faction: FactionId(2),
                grid: EntityId(202),
                inventory: InventoryHandle {
                    grid: EntityId(202),
                    block: 2,
                },
                amount: 2,
            },
        ]
    );

    let deposits = server.host().deposits();
    assert_eq!(deposits.len(), 2, "tied point must not deposit");
    assert!(deposits.iter().all(|d| d.item.subtype == "ShipLicense"));

    let ledger = server.tokens_last_round();
    assert_eq!(ledger.tokens_for(FactionId(1)), 5);
    assert_eq!(ledger.tokens_for(FactionId(2)), 2);
    assert_eq!(ledger.tokens_for(FactionId(3)), 0, "ineligible grids scored");

    let messages = decode_all(server.transport().broadcasts());
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].destination_kind, DestinationKind::Everyone);
    assert_eq!(
        messages[0].body,
        MessageBody::Notification {
            text: "Conquest Round Ended".to_string(),
            time_ms: 6000,
            font: Font::White,
        }
    );
    let notified: Vec<_> = messages[1..]
        .iter()
        .map(|m| (m.destination_kind, m.destinations.clone()))
        .collect();
    assert_eq!(
        notified,
        vec![
            (DestinationKind::Faction, vec![1]),
            (DestinationKind::Faction, vec![2]),
        ]
    );
}

#[test]
fn fault_at_second_point_skips_the_third_until_next_round() {
    let mut server = ConquestServer::new(
        test_settings(),
        ConquestState::default(),
        FaultyWorld::new(fixture_world(), BETA),
        MemoryTransport::new(),
    );

    let report = server.on_round_timer().expect("no pass in flight");
    assert!(!report.completed);
    assert_eq!(report.results.len(), 1, "only Alpha resolved");
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].control_point, "Beta");
    assert_eq!(server.host().inner.deposits().len(), 1);
    assert_eq!(server.tokens_last_round().tokens_for(FactionId(1)), 5);
    assert_eq!(server.tokens_last_round().tokens_for(FactionId(2)), 0);
    assert!(
        server.transport().broadcasts().is_empty(),
        "aborted pass must not announce round end"
    );
    assert!(!server.round_guard().is_running(), "guard released after fault");

    server.host_mut().fail_at = None;
    let report = server.on_round_timer().expect("next round runs");
    assert!(report.completed);
    assert_eq!(report.results.len(), 3);
    assert_eq!(server.host().inner.deposits().len(), 3);
    assert_eq!(server.tokens_last_round().tokens_for(FactionId(1)), 5);
    assert_eq!(server.tokens_last_round().tokens_for(FactionId(2)), 2);
    assert_eq!(server.rounds_completed(), 1);
}

#[test]
fn scheduler_keeps_firing_after_faulty_rounds() {
    let server = Arc::new(Mutex::new(ConquestServer::new(
        test_settings(),
        ConquestState::default(),
        FaultyWorld::new(fixture_world(), BETA),
        MemoryTransport::new(),
    )));

    let mut scheduler = ThreadScheduler::new();
    let timer_server = Arc::clone(&server);
    scheduler
        .schedule_periodic(
            "round",
            Duration::from_millis(10),
            Box::new(move || {
                timer_server.lock().unwrap().on_round_timer();
            }),
        )
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut attempted = 0;
    while attempted < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
        attempted = server.lock().unwrap().host().inner.deposits().len();
    }
    scheduler.shutdown();

    // Every aborted pass still rewards Alpha before hitting Beta.
    assert!(attempted >= 3, "only {} rounds ran", attempted);
    let server = server.lock().unwrap();
    assert_eq!(server.rounds_completed(), 0);
    assert!(server.transport().broadcasts().is_empty());
}
