//! # End to End over Loopback
//!
//! `HubRuntime` and `NodeRuntime` as the binaries assemble them, talking
//! plain HTTP on 127.0.0.1 (no SOCKS proxy configured). The node reads noise
//! from a file standing in for the camera device.

#[cfg(test)]
mod tests {
    use crate::support::{eventually, write_noise_file};
    use sentinel_admin::HubAdminClient;
    use sentinel_runtime::{HubRuntime, NodeRuntime, SentinelConfig};
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{ContingencyState, NodeId};
    use sn_04_hub_aggregator::HubApi;
    use std::path::Path;
    use std::time::Duration;

    const TOKEN: &str = "e2e-governance";
    const NODE: &str = "sentinel-e2e";

    fn node_key() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed([0x42; 32])
    }

    fn config(dir: &Path) -> SentinelConfig {
        let key_file = dir.join("keys.json");
        std::fs::write(
            &key_file,
            format!(
                r#"{{ "{}": "{}" }}"#,
                NODE,
                node_key().public_key().to_hex()
            ),
        )
        .unwrap();
        let noise = dir.join("noise.raw");
        write_noise_file(&noise, 64 * 1024).unwrap();

        let mut config = SentinelConfig::default();
        config.hub.listen_addr = "127.0.0.1:0".into();
        config.hub.key_directory_file = key_file;
        config.hub.state_file = dir.join("hub/state.json");
        config.hub.governance_token = TOKEN.into();
        config.hub.liveness_sweep_interval_ms = 50;
        config.hub.persist_interval_ms = 50;

        config.node.node_id = NODE.into();
        config.node.socks_proxy = String::new();
        config.node.entropy_device = noise;
        config.node.sample_size = 512;
        config.node.sequence_file = dir.join("node/sequence");
        config.node.heartbeat_interval_ms = 30;
        config.node.readiness_poll_ms = 10;
        config.retry.retry_base_delay_ms = 10;
        config.retry.retry_max_delay_ms = 100;
        config.retry.attempt_timeout_ms = 2_000;
        config
    }

    fn last_sequence(hub: &HubRuntime) -> u64 {
        let node = NodeId::new(NODE);
        hub.hub()
            .snapshot()
            .nodes
            .iter()
            .find(|n| n.node_id == node)
            .map_or(0, |n| n.last_sequence)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_node_attests_to_hub_and_sees_governance_seal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());

        let hub = HubRuntime::start(&config).await.unwrap();
        config.node.hub_onion_address = hub.local_addr().to_string();

        let mut node = NodeRuntime::with_key(&config, node_key()).unwrap();
        node.start();

        assert!(eventually(Duration::from_secs(10), || last_sequence(&hub) >= 3).await);
        assert_eq!(hub.hub().phi_score(), 1.0);

        let admin = HubAdminClient::new(format!("http://{}", hub.local_addr()), None)
            .unwrap()
            .with_token(TOKEN);
        let sealed = admin.seal("loopback drill").await.unwrap();
        assert!(sealed.contingency_activated);

        let status = node.status();
        assert!(
            eventually(Duration::from_secs(10), || {
                status.borrow().last_ack.map(|ack| ack.contingency) == Some(ContingencyState::Sealed)
            })
            .await
        );

        let fleet = admin.fleet().await.unwrap();
        assert_eq!(fleet.contingency, ContingencyState::Sealed);
        assert_eq!(fleet.contingency_reason.as_deref(), Some("loopback drill"));

        node.shutdown().await;
        let delivered = last_sequence(&hub);
        hub.shutdown().await.unwrap();

        let persisted: u64 = std::fs::read_to_string(dir.path().join("node/sequence"))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(persisted >= delivered);
        let state = std::fs::read_to_string(dir.path().join("hub/state.json")).unwrap();
        assert!(state.contains("SEALED"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_restarted_node_continues_its_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let hub = HubRuntime::start(&config).await.unwrap();
        config.node.hub_onion_address = hub.local_addr().to_string();

        let mut first = NodeRuntime::with_key(&config, node_key()).unwrap();
        first.start();
        assert!(eventually(Duration::from_secs(10), || last_sequence(&hub) >= 2).await);
        first.shutdown().await;
        let before = last_sequence(&hub);

        let mut second = NodeRuntime::with_key(&config, node_key()).unwrap();
        second.start();
        assert!(eventually(Duration::from_secs(10), || last_sequence(&hub) > before).await);
        second.shutdown().await;

        assert_eq!(hub.hub().get_stats().rejected_replay, 0);
        hub.shutdown().await.unwrap();
    }
}
