//! # Node → Hub, In Process
//!
//! The real proof pipeline and retrying transport talking to a real
//! aggregator through [`HubLoopbackChannel`](crate::support::HubLoopbackChannel).
//!
//! ```text
//! ScriptedEntropySource ─► ProofPipeline(SHA-256, Ed25519) ─► HeartbeatTransport
//!                                                                   │
//!                                                        HubLoopbackChannel
//!                                                                   ▼
//!                                                          HubAggregator
//! ```

#[cfg(test)]
mod tests {
    use crate::support::HubLoopbackChannel;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{ContingencyState, ControllableTimeSource, NodeId, RecomputeCause};
    use sn_01_proof_pipeline::{Ed25519Signer, ProofPipeline, Sha256Digester};
    use sn_02_heartbeat_transport::{HeartbeatTransport, RejectReason, RetryPolicy, TransportError};
    use sn_03_node_agent::test_utils::{InMemorySequenceStore, ScriptedEntropySource};
    use sn_03_node_agent::{AgentConfig, AgentError, NodeAgent};
    use sn_04_hub_aggregator::test_utils::{InMemoryHubStore, RecordingSink};
    use sn_04_hub_aggregator::{HubAggregator, HubApi, HubConfig, StaticKeyDirectory};
    use std::sync::Arc;

    const NODE: &str = "sentinel-07";

    type Hub = HubAggregator<StaticKeyDirectory, Arc<RecordingSink>, Arc<InMemoryHubStore>>;
    type Agent = NodeAgent<
        ProofPipeline<Sha256Digester, Ed25519Signer>,
        Arc<HeartbeatTransport<HubLoopbackChannel>>,
        ScriptedEntropySource,
        Arc<InMemorySequenceStore>,
    >;

    struct Harness {
        hub: Arc<Hub>,
        sink: Arc<RecordingSink>,
        transport: Arc<HeartbeatTransport<HubLoopbackChannel>>,
    }

    fn node_key() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed([7; 32])
    }

    fn harness() -> Harness {
        let mut directory = StaticKeyDirectory::new();
        directory.insert(NodeId::new(NODE), node_key().public_key());
        let sink = Arc::new(RecordingSink::default());
        // Scripted samples are stamped from t=1000ms.
        let clock = Arc::new(ControllableTimeSource::new(2_000));
        let hub = Arc::new(
            HubAggregator::new(
                HubConfig::for_testing(),
                directory,
                sink.clone(),
                Arc::new(InMemoryHubStore::default()),
                clock,
            )
            .unwrap(),
        );
        let channel = HubLoopbackChannel::new(hub.clone() as Arc<dyn HubApi>);
        let transport = Arc::new(HeartbeatTransport::new(channel, RetryPolicy::for_testing()));
        Harness {
            hub,
            sink,
            transport,
        }
    }

    fn agent(harness: &Harness, key: Ed25519KeyPair, sequences: Arc<InMemorySequenceStore>) -> Agent {
        NodeAgent::new(
            AgentConfig::for_testing(NODE),
            ProofPipeline::new(Sha256Digester, Ed25519Signer::new(key)),
            harness.transport.clone(),
            ScriptedEntropySource::endless(),
            sequences,
        )
    }

    #[tokio::test]
    async fn test_heartbeats_are_accepted_in_sequence_order() {
        let harness = harness();
        let agent = agent(&harness, node_key(), Arc::new(InMemorySequenceStore::default()));

        for _ in 0..3 {
            let receipt = agent.run_once().await.unwrap();
            assert_eq!(receipt.attempts, 1);
            assert_eq!(receipt.ack.phi_score, 1.0);
            assert_eq!(receipt.ack.contingency, ContingencyState::Normal);
        }

        let snapshot = harness.hub.snapshot();
        assert_eq!(snapshot.known_nodes, 1);
        assert_eq!(snapshot.nodes[0].last_sequence, 3);
        let events = harness.sink.integration_events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.cause == RecomputeCause::Heartbeat));
        assert_eq!(agent.status().borrow().heartbeats_delivered, 3);
    }

    #[tokio::test]
    async fn test_transient_failures_then_delivery_on_fourth_attempt() {
        let harness = harness();
        let agent = agent(&harness, node_key(), Arc::new(InMemorySequenceStore::default()));
        harness.transport.channel().fail_next(3);

        let receipt = agent.run_once().await.unwrap();
        assert_eq!(receipt.attempts, 4);
        assert_eq!(receipt.backoff_delays.len(), 3);
        assert!(receipt.backoff_delays.windows(2).all(|w| w[0] <= w[1]));
        let cap = RetryPolicy::for_testing().max_delay;
        assert!(receipt.backoff_delays.iter().all(|d| *d <= cap));
        assert_eq!(harness.transport.channel().posts(), 4);
        assert_eq!(harness.hub.snapshot().nodes[0].last_sequence, 1);
    }

    #[tokio::test]
    async fn test_lost_sequence_state_is_refused_as_replay() {
        let harness = harness();
        let first_life = agent(&harness, node_key(), Arc::new(InMemorySequenceStore::default()));
        first_life.run_once().await.unwrap();
        first_life.run_once().await.unwrap();
        let phi_before = harness.hub.phi_score();

        // Same identity, counter wiped: sequence 1 again.
        let second_life = agent(&harness, node_key(), Arc::new(InMemorySequenceStore::default()));
        let err = second_life.run_once().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Transport(TransportError::Rejected {
                reason: RejectReason::Conflict,
                ..
            })
        ));

        assert_eq!(harness.hub.snapshot().nodes[0].last_sequence, 2);
        assert_eq!(harness.hub.phi_score(), phi_before);
        let rejections = harness.sink.rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].2, "replay");
    }

    #[tokio::test]
    async fn test_unknown_key_degrades_the_node() {
        let harness = harness();
        let impostor = agent(
            &harness,
            Ed25519KeyPair::from_seed([0xEE; 32]),
            Arc::new(InMemorySequenceStore::default()),
        );

        let err = impostor.run_once().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Transport(TransportError::Rejected {
                reason: RejectReason::Unauthorized,
                ..
            })
        ));
        assert!(err.degrades());
        assert_eq!(harness.hub.snapshot().known_nodes, 0);
        assert_eq!(harness.hub.get_stats().rejected_auth, 1);
    }

    #[tokio::test]
    async fn test_acks_report_sealed_fleet() {
        let harness = harness();
        let agent = agent(&harness, node_key(), Arc::new(InMemorySequenceStore::default()));
        agent.run_once().await.unwrap();

        harness.hub.governance_seal("tamper drill").unwrap();
        let receipt = agent.run_once().await.unwrap();
        assert_eq!(receipt.ack.contingency, ContingencyState::Sealed);
        assert_eq!(
            agent.status().borrow().last_ack.map(|ack| ack.contingency),
            Some(ContingencyState::Sealed)
        );
    }
}
