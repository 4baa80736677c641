//! # Fleet Scenarios
//!
//! Hub behaviour with its production adapters: the in-memory event bus as
//! integration sink and the JSON file store for recovery.

#[cfg(test)]
mod tests {
    use shared_bus::{EventFilter, EventTopic, FleetEvent, InMemoryEventBus, Subscription};
    use shared_types::{ContingencyState, ControllableTimeSource, IntegrationEvent, TimeSource};
    use sn_04_hub_aggregator::test_utils::FleetFixture;
    use sn_04_hub_aggregator::{
        AcceptError, EventBusSink, HubAggregator, HubApi, HubConfig, JsonFileHubStore,
    };
    use std::path::Path;
    use std::sync::Arc;

    type Hub = HubAggregator<sn_04_hub_aggregator::StaticKeyDirectory, EventBusSink, JsonFileHubStore>;

    fn open_hub(
        fleet: &FleetFixture,
        state_file: &Path,
        bus: &Arc<InMemoryEventBus>,
        clock: &Arc<ControllableTimeSource>,
    ) -> Hub {
        HubAggregator::new(
            HubConfig::for_testing(),
            fleet.directory(),
            EventBusSink::new(bus.clone()),
            JsonFileHubStore::open(state_file).unwrap(),
            clock.clone(),
        )
        .unwrap()
    }

    fn drain(subscription: &mut Subscription) -> Vec<FleetEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = subscription.try_recv() {
            events.push(event);
        }
        events
    }

    fn integration(events: &[FleetEvent]) -> Vec<IntegrationEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                FleetEvent::Integration(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_four_silent_nodes_of_ten_drop_phi_to_sixty_percent() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = FleetFixture::new(10);
        let bus = Arc::new(InMemoryEventBus::new());
        let mut all = bus.subscribe(EventFilter::all());
        let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));
        let hub = open_hub(&fleet, &dir.path().join("state.json"), &bus, &clock);

        for index in 0..10 {
            hub.on_heartbeat(fleet.heartbeat(index, 1, clock.now())).unwrap();
        }
        clock.advance(HubConfig::for_testing().liveness_timeout.as_millis() as u64 + 1_000);
        for index in 0..6 {
            hub.on_heartbeat(fleet.heartbeat(index, 2, clock.now())).unwrap();
        }
        let swept = hub.sweep_liveness();
        assert!((swept.new_phi_score - 0.60).abs() < 1e-9);
        assert_eq!(swept.contingency, ContingencyState::Warning);
        assert!(!swept.contingency_activated);

        let events = drain(&mut all);
        let below: Vec<_> = integration(&events)
            .into_iter()
            .filter(|e| e.new_phi_score < 0.70)
            .collect();
        assert_eq!(below.len(), 1);

        let stale: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, FleetEvent::NodeMarkedStale { .. }))
            .collect();
        assert_eq!(stale.len(), 4);

        // Contingency changes are flushed at once.
        let saved = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert!(saved.contains("WARNING"));
    }

    #[test]
    fn test_anomaly_quorum_seals_and_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");
        let fleet = FleetFixture::new(4);
        let bus = Arc::new(InMemoryEventBus::new());
        let mut contingency = bus.subscribe(EventFilter::topics(vec![EventTopic::Contingency]));
        let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));

        {
            let hub = open_hub(&fleet, &state_file, &bus, &clock);
            for index in 0..4 {
                hub.on_heartbeat(fleet.heartbeat(index, 1, clock.now())).unwrap();
            }
            let first = hub.report_anomaly(&fleet.node_id(0), 0.95).unwrap();
            assert!(!first.contingency_activated);
            let second = hub.report_anomaly(&fleet.node_id(1), 0.97).unwrap();
            assert!(second.contingency_activated);
            hub.persist().unwrap();
        }

        let changes = drain(&mut contingency);
        assert!(changes.iter().any(|e| matches!(
            e,
            FleetEvent::ContingencyChanged {
                to: ContingencyState::Sealed,
                ..
            }
        )));

        clock.advance(5_000);
        let hub = open_hub(&fleet, &state_file, &bus, &clock);
        assert_eq!(hub.contingency(), ContingencyState::Sealed);
        assert_eq!(hub.snapshot().known_nodes, 4);

        // Sequence history came back with the ledger.
        assert!(matches!(
            hub.on_heartbeat(fleet.heartbeat(2, 1, clock.now())),
            Err(AcceptError::Replay { .. })
        ));
        let ack = hub.on_heartbeat(fleet.heartbeat(2, 2, clock.now())).unwrap();
        assert_eq!(ack.contingency, ContingencyState::Sealed);

        // Sweeps never lift the seal; governance does.
        clock.advance(60_000);
        assert_eq!(hub.sweep_liveness().contingency, ContingencyState::Sealed);
        let reset = hub.governance_reset("incident closed").unwrap();
        assert_eq!(reset.contingency, ContingencyState::Normal);
        assert!(!reset.contingency_activated);
    }

    #[test]
    fn test_parallel_nodes_keep_a_consistent_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = FleetFixture::new(8);
        let bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));
        let hub = open_hub(&fleet, &dir.path().join("state.json"), &bus, &clock);

        std::thread::scope(|scope| {
            for index in 0..fleet.len() {
                let hub = &hub;
                let fleet = &fleet;
                let now = clock.now();
                scope.spawn(move || {
                    for sequence in 1..=20 {
                        hub.on_heartbeat(fleet.heartbeat(index, sequence, now)).unwrap();
                    }
                });
            }
        });

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.known_nodes, 8);
        assert!(snapshot.nodes.iter().all(|n| n.last_sequence == 20));
        assert_eq!(hub.get_stats().heartbeats_accepted, 160);
        assert_eq!(snapshot.phi_score, 1.0);
    }

    #[test]
    fn test_lagging_subscriber_never_blocks_scoring() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = FleetFixture::new(1);
        let bus = Arc::new(InMemoryEventBus::with_capacity(4));
        let mut slow = bus.subscribe(EventFilter::all());
        let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));
        let hub = open_hub(&fleet, &dir.path().join("state.json"), &bus, &clock);

        for sequence in 1..=50 {
            hub.on_heartbeat(fleet.heartbeat(0, sequence, clock.now())).unwrap();
        }
        let kept = drain(&mut slow);
        assert!(kept.len() <= 4);
        assert!(slow.dropped() > 0);
        assert_eq!(hub.snapshot().nodes[0].last_sequence, 50);
    }
}
