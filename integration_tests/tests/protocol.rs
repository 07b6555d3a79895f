mod common;

use std::net::SocketAddr;
use std::time::Duration;

use conquest_core::{
    ConquestClient, ConquestServer, ConquestState, Dispatch, EntityId, FactionId, FleetOwner,
    FrameClient, FrameServer, GridSummary, InMemoryWorld, MemoryTransport, PlayerId,
};
use conquest_proto::{Font, MessageType, OwnerType, ShipClass};
use glam::DVec3;

use common::{fixture_world, test_settings, RecordingSurface};

type LocalServer = ConquestServer<InMemoryWorld, MemoryTransport>;

fn summary(id: i64, class: ShipClass, name: &str) -> GridSummary {
    GridSummary {
        entity: EntityId(id),
        owner_type: OwnerType::Faction,
        ship_class: class,
        block_count: 60,
        display_name: name.to_string(),
    }
}

/// Moves client frames to the server and the server's replies to every client.
fn pump(
    server: &mut LocalServer,
    uplink: &mut MemoryTransport,
    clients: &mut [&mut ConquestClient<RecordingSurface>],
) {
    for frame in uplink.take_to_server() {
        server.on_message(&frame);
    }
    for frame in server.transport_mut().take_broadcasts() {
        for client in clients.iter_mut() {
            client.on_message(&frame);
        }
    }
}

fn local_server() -> LocalServer {
    ConquestServer::new(
        test_settings(),
        ConquestState::default(),
        fixture_world(),
        MemoryTransport::new(),
    )
}

#[test]
fn settings_exchange_places_markers_for_the_requester_only() {
    let mut server = local_server();
    let mut uplink = MemoryTransport::new();
    let mut asker = ConquestClient::new(PlayerId(10), Some(FactionId(1)), RecordingSurface::default());
    let mut bystander =
        ConquestClient::new(PlayerId(20), Some(FactionId(2)), RecordingSurface::default());

    asker.request_settings(&mut uplink).unwrap();
    pump(&mut server, &mut uplink, &mut [&mut asker, &mut bystander]);

    let names: Vec<_> = asker.surface().markers.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
    assert_eq!(asker.surface().markers[1].1, DVec3::new(10000.0, 0.0, 0.0));
    assert_eq!(asker.server_settings().unwrap().hull_rules.len(), 3);
    assert!(bystander.surface().markers.is_empty());
    assert!(bystander.server_settings().is_none());
}

#[test]
fn fleet_request_reports_faction_fleet_with_quotas() {
    let mut server = local_server();
    let mut uplink = MemoryTransport::new();
    let mut client = ConquestClient::new(PlayerId(10), Some(FactionId(1)), RecordingSurface::default());
    let owner = FleetOwner::Faction(FactionId(1));
    server.record_grid(owner, summary(1, ShipClass::Fighter, "Wasp"));
    server.record_grid(owner, summary(2, ShipClass::Fighter, "Hornet"));
    server.record_grid(owner, summary(3, ShipClass::Fighter, "Gnat"));
    server.record_grid(owner, summary(4, ShipClass::Frigate, "Bulwark"));

    client.request_settings(&mut uplink).unwrap();
    client.request_fleet(&mut uplink).unwrap();
    pump(&mut server, &mut uplink, &mut [&mut client]);

    let (title, body) = client.surface().dialogs.last().unwrap();
    assert_eq!(title, "Your Faction's Fleet:");
    assert!(body.contains("Fighter: 2 / 2\n"), "{}", body);
    assert!(body.contains("Frigate: 1 / 1\n"), "{}", body);
    assert!(body.contains("Unsupported:\n     0. Gnat - 60 blocks"), "{}", body);
}

#[test]
fn solo_player_sees_own_fleet_and_violations() {
    let mut server = local_server();
    let mut uplink = MemoryTransport::new();
    let mut client = ConquestClient::new(PlayerId(30), None, RecordingSurface::default());
    let owner = FleetOwner::Player(PlayerId(30));
    server.record_grid(owner, summary(7, ShipClass::Frigate, "Lone Wolf"));

    client.request_fleet(&mut uplink).unwrap();
    client.request_violations(&mut uplink).unwrap();
    pump(&mut server, &mut uplink, &mut [&mut client]);

    let dialogs = &client.surface().dialogs;
    assert_eq!(dialogs.len(), 2);
    assert_eq!(dialogs[0].0, "Your Fleet:");
    assert_eq!(dialogs[1].0, "Fleet Violations");
    assert!(dialogs[1].1.contains("Lone Wolf - 60 blocks"), "{}", dialogs[1].1);
}

#[test]
fn disown_round_trip_frees_a_quota_slot() {
    let mut server = local_server();
    let mut uplink = MemoryTransport::new();
    let mut client = ConquestClient::new(PlayerId(10), Some(FactionId(1)), RecordingSurface::default());
    let owner = FleetOwner::Faction(FactionId(1));
    for (id, name) in [(1, "Wasp"), (2, "Hornet"), (3, "Gnat")] {
        server.record_grid(owner, summary(id, ShipClass::Fighter, name));
    }

    client.request_disown(EntityId(1), &mut uplink).unwrap();
    pump(&mut server, &mut uplink, &mut [&mut client]);

    assert_eq!(
        client.surface().notifications,
        vec![("Wasp has been disowned".to_string(), 5000, Font::White)]
    );
    let data = server
        .state()
        .fleets
        .clone()
        .fleet_data(owner);
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|grid| grid.supported), "Gnat was promoted");
}

#[test]
fn round_notices_reach_the_right_clients() {
    let mut server = local_server();
    let mut uplink = MemoryTransport::new();
    let mut first = ConquestClient::new(PlayerId(10), Some(FactionId(1)), RecordingSurface::default());
    let mut second = ConquestClient::new(PlayerId(20), Some(FactionId(2)), RecordingSurface::default());
    let mut solo = ConquestClient::new(PlayerId(30), None, RecordingSurface::default());

    server.on_round_timer().unwrap();
    pump(&mut server, &mut uplink, &mut [&mut first, &mut second, &mut solo]);

    let texts = |client: &ConquestClient<RecordingSurface>| -> Vec<String> {
        client
            .surface()
            .notifications
            .iter()
            .map(|(text, _, _)| text.clone())
            .collect()
    };
    assert_eq!(
        texts(&first),
        vec![
            "Conquest Round Ended".to_string(),
            "Your faction earned 5 tokens this round".to_string(),
        ]
    );
    assert_eq!(
        texts(&second),
        vec![
            "Conquest Round Ended".to_string(),
            "Your faction earned 2 tokens this round".to_string(),
        ]
    );
    assert_eq!(texts(&solo), vec!["Conquest Round Ended".to_string()]);
}

#[test]
fn derelict_warning_uses_configured_countdown() {
    let mut server = local_server();
    let mut uplink = MemoryTransport::new();
    let mut client = ConquestClient::new(PlayerId(20), Some(FactionId(2)), RecordingSurface::default());

    server.notify_derelict_start(FactionId(2), "Raider").unwrap();
    pump(&mut server, &mut uplink, &mut [&mut client]);

    assert_eq!(
        client.surface().notifications,
        vec![(
            "Your faction's grid Raider will become a derelict in 30 minutes".to_string(),
            10_000,
            Font::Red,
        )]
    );
}

#[test]
fn tcp_transport_carries_requests_and_replies() {
    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let frames = FrameServer::start(bind).unwrap();
    let addr = frames.local_addr();
    let inbound = frames.inbound().clone();
    let mut server = ConquestServer::new(
        test_settings(),
        ConquestState::default(),
        fixture_world(),
        frames,
    );

    let mut link = FrameClient::connect(addr).unwrap();
    let mut client = ConquestClient::new(PlayerId(10), Some(FactionId(1)), RecordingSurface::default());
    client.request_settings(&mut link).unwrap();

    let request = inbound.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        server.on_message(&request),
        Dispatch::Handled(MessageType::SettingsRequest)
    );

    let reply = link.inbound().recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        client.on_message(&reply),
        Dispatch::Handled(MessageType::SettingsResponse)
    );
    assert_eq!(client.surface().markers.len(), 3);
}
