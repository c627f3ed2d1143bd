use std::sync::Arc;

use chrono::Utc;
use convoy::clock::ManualClock;
use convoy::config::AppConfig;
use convoy::coordinator::LocationCoordinator;
use convoy::directory::InMemoryDirectory;
use convoy::domain::{EventType, Group, GroupEvent, HubMessage, MemberId};
use convoy::error::ConvoyError;
use convoy::geo::haversine_km;
use convoy::simulator::MovementSimulator;
use tokio::sync::mpsc;

struct World {
    directory: Arc<InMemoryDirectory>,
    coordinator: LocationCoordinator,
}

impl World {
    fn new() -> Self {
        Self::with_config(AppConfig::default_config())
    }

    fn with_config(config: AppConfig) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let coordinator = LocationCoordinator::with_clock(
            config,
            directory.clone(),
            Arc::new(ManualClock::new(Utc::now())),
        );
        Self {
            directory,
            coordinator,
        }
    }

    fn group_of(&self, names: &[&str]) -> (Group, Vec<MemberId>) {
        let members: Vec<MemberId> = names
            .iter()
            .map(|name| self.directory.register_member(name).0.id)
            .collect();
        let group = self.directory.create_group("trip", &members[0]);
        for member in &members[1..] {
            self.directory.join_group(&group.code, member).unwrap();
        }
        (group, members)
    }

    async fn listen(&self, group: &Group) -> mpsc::Receiver<HubMessage> {
        let (conn, rx) = self.coordinator.hub().connect();
        self.coordinator.subscribe(conn, &group.id).await.unwrap();
        rx
    }
}

fn drain(rx: &mut mpsc::Receiver<HubMessage>) -> Vec<HubMessage> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn count(messages: &[HubMessage], kind: EventType) -> usize {
    messages
        .iter()
        .filter(|m| m.event.event_type() == kind)
        .count()
}

#[test]
fn one_degree_of_latitude_is_about_111_km() {
    let d = haversine_km(0.0, 0.0, 1.0, 0.0);
    assert!((d - 111.19).abs() < 0.01, "got {d}");
}

#[tokio::test]
async fn pair_alerts_once_on_entry_and_once_on_exit() {
    let world = World::new();
    let (group, members) = world.group_of(&["A", "B"]);
    let mut rx = world.listen(&group).await;
    let (a, b) = (&members[0], &members[1]);

    world
        .coordinator
        .update_location(a, &group.id, 0.0, 0.0, None)
        .await
        .unwrap();
    // ~0.56 km, then closer, then ~2.2 km away
    for lng in [0.005, 0.004, 0.003] {
        world
            .coordinator
            .update_location(b, &group.id, 0.0, lng, None)
            .await
            .unwrap();
    }
    world
        .coordinator
        .update_location(b, &group.id, 0.0, 0.02, None)
        .await
        .unwrap();
    world
        .coordinator
        .update_location(a, &group.id, 0.0, 0.001, None)
        .await
        .unwrap();

    let messages = drain(&mut rx);
    assert_eq!(count(&messages, EventType::GeofenceAlert), 1);
    assert_eq!(count(&messages, EventType::GeofenceCleared), 1);
    assert_eq!(count(&messages, EventType::LocationUpdate), 6);

    let seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]), "seqs {seqs:?}");
}

#[tokio::test]
async fn destination_protocol_edges() {
    let world = World::new();
    let (group, _) = world.group_of(&["Lead"]);

    let err = world
        .coordinator
        .confirm_destination(&group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::InvalidState(_)));

    world
        .coordinator
        .propose_destination(&group.id, 9.93, 78.12)
        .await
        .unwrap();
    let first = world.coordinator.confirm_destination(&group.id).await.unwrap();
    let again = world.coordinator.confirm_destination(&group.id).await.unwrap();
    assert!(first.confirmed);
    assert_eq!(first, again);

    let replaced = world
        .coordinator
        .propose_destination(&group.id, 10.0, 78.0)
        .await
        .unwrap();
    assert!(!replaced.confirmed);
}

#[tokio::test]
async fn simulated_walk_reaches_destination_with_one_arrival() {
    let world = World::new();
    let (group, members) = world.group_of(&["Walker"]);
    world
        .coordinator
        .update_location(&members[0], &group.id, 9.92, 78.12, Some(36.0))
        .await
        .unwrap();
    world
        .coordinator
        .propose_destination(&group.id, 9.93, 78.12)
        .await
        .unwrap();
    world
        .coordinator
        .confirm_destination(&group.id)
        .await
        .unwrap();

    let mut rx = world.listen(&group).await;
    let simulator = MovementSimulator::new(world.coordinator.state());

    simulator.tick().await;
    let first = &world
        .coordinator
        .list_group_locations(&group.id)
        .await
        .unwrap()[0];
    let d = haversine_km(9.92, 78.12, 9.93, 78.12);
    let expected = 9.92 + 0.01 * (0.01 / d);
    assert!((first.lat - expected).abs() < 1e-9);

    let mut arrivals = Vec::new();
    for _ in 0..150 {
        simulator.tick().await;
        for message in drain(&mut rx) {
            if let GroupEvent::UserArrived(payload) = message.event {
                arrivals.push(payload);
            }
        }
    }

    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].display_name.as_deref(), Some("Walker"));
    assert_eq!(arrivals[0].message, "Walker has reached the destination!");

    let last = &world
        .coordinator
        .list_group_locations(&group.id)
        .await
        .unwrap()[0];
    assert_eq!((last.lat, last.lng, last.speed_kmh), (9.93, 78.12, 0.0));
}

#[tokio::test]
async fn nearest_outside_range_is_not_found() {
    let world = World::new();
    let (group, members) = world.group_of(&["Far"]);
    world
        .coordinator
        .update_location(&members[0], &group.id, 0.0, 0.0, None)
        .await
        .unwrap();

    // 10 km away with a 5 km cap
    let err = world
        .coordinator
        .query_nearest(&group.id, 0.0, 0.09)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::NotFound(_)));
}

#[tokio::test]
async fn groups_do_not_see_each_other() {
    let world = World::new();
    let (first, first_members) = world.group_of(&["A1"]);
    let (second, second_members) = world.group_of(&["B1"]);
    let mut first_rx = world.listen(&first).await;
    let mut second_rx = world.listen(&second).await;

    world
        .coordinator
        .update_location(&first_members[0], &first.id, 1.0, 1.0, None)
        .await
        .unwrap();
    // Same spot, other group: no cross-group geofence
    world
        .coordinator
        .update_location(&second_members[0], &second.id, 1.0, 1.0, None)
        .await
        .unwrap();

    let first_messages = drain(&mut first_rx);
    let second_messages = drain(&mut second_rx);
    assert_eq!(first_messages.len(), 1);
    assert_eq!(second_messages.len(), 1);
    assert_eq!(count(&first_messages, EventType::GeofenceAlert), 0);
    assert_eq!(second_messages[0].seq, 1);

    // Global nearby spans both groups
    let nearby = world
        .coordinator
        .query_nearby(1.0, 1.0, Some(0.5))
        .await
        .unwrap();
    assert_eq!(nearby.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_in_one_group_keep_one_entry_per_member() {
    let world = World::new();
    let names: Vec<String> = (0..8).map(|i| format!("m{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (group, members) = world.group_of(&name_refs);
    let mut rx = world.listen(&group).await;

    let mut tasks = Vec::new();
    for (i, member) in members.iter().cloned().enumerate() {
        let coordinator = world.coordinator.clone();
        let group_id = group.id.clone();
        tasks.push(tokio::spawn(async move {
            for step in 0..10 {
                let lng = 0.0001 * (i * 10 + step) as f64;
                coordinator
                    .update_location(&member, &group_id, 0.0, lng, None)
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let positions = world
        .coordinator
        .list_group_locations(&group.id)
        .await
        .unwrap();
    assert_eq!(positions.len(), 8);

    let messages = drain(&mut rx);
    let mut seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
    let total = seqs.len();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs.len(), total, "sequence numbers must be unique");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simulator_ticks_and_updates_share_one_gap_free_sequence() {
    let mut config = AppConfig::default_config();
    config.hub.subscriber_buffer = 10_000;
    config.simulation.seed = Some(7);
    let world = World::with_config(config);
    let (group, members) = world.group_of(&["w0", "w1", "w2", "w3"]);
    let mut rx = world.listen(&group).await;

    for (i, member) in members.iter().enumerate() {
        world
            .coordinator
            .update_location(member, &group.id, 0.0, 0.001 * i as f64, Some(5.0))
            .await
            .unwrap();
    }
    world
        .coordinator
        .propose_destination(&group.id, 0.5, 0.5)
        .await
        .unwrap();
    world
        .coordinator
        .confirm_destination(&group.id)
        .await
        .unwrap();

    let simulator = MovementSimulator::new(world.coordinator.state());
    let ticker = tokio::spawn(async move {
        let mut moved = 0;
        for _ in 0..20 {
            let report = simulator.tick().await;
            assert_eq!(report.member_failures + report.group_failures, 0);
            moved += report.members_moved;
            tokio::task::yield_now().await;
        }
        moved
    });

    let mut updaters = Vec::new();
    for (i, member) in members.iter().cloned().enumerate() {
        let coordinator = world.coordinator.clone();
        let group_id = group.id.clone();
        updaters.push(tokio::spawn(async move {
            for step in 0..15 {
                let lng = 0.001 * i as f64 + 0.0001 * step as f64;
                coordinator
                    .update_location(&member, &group_id, 0.0, lng, Some(5.0))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for updater in updaters {
        updater.await.unwrap();
    }
    let moved = ticker.await.unwrap();
    assert_eq!(moved, 20 * members.len());

    let positions = world
        .coordinator
        .list_group_locations(&group.id)
        .await
        .unwrap();
    assert_eq!(positions.len(), members.len());

    // Every stamped message reached the single subscriber
    let mut seqs: Vec<u64> = drain(&mut rx).iter().map(|m| m.seq).collect();
    seqs.sort_unstable();
    let expected: Vec<u64> = (1..=seqs.len() as u64).collect();
    assert_eq!(seqs, expected);
}
