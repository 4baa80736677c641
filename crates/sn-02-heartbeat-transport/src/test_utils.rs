//! Scripted channel and fixtures for transport tests.

use crate::domain::errors::ChannelError;
use crate::ports::outbound::{AnonymousChannel, ChannelResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    EntropyDigest, Heartbeat, HeartbeatWire, NodeId, Proof, ProofSignature, Sequence, UnixMillis,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// One scripted reaction to a `post`.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(ChannelResponse),
    Status(u16),
    Fail(ChannelError),
    /// Never completes; the attempt timeout has to fire.
    Hang,
}

/// `200` with a well-formed ack.
pub fn ack_response(phi: f64) -> Scripted {
    Scripted::Respond(ack(phi))
}

fn ack(phi: f64) -> ChannelResponse {
    ChannelResponse {
        status: 200,
        body: format!(r#"{{"phi_score":{},"contingency":"NORMAL"}}"#, phi).into_bytes(),
    }
}

/// A heartbeat with placeholder digest and signature.
pub fn heartbeat(node_id: &str, sequence: Sequence) -> Heartbeat {
    let proof = Proof::new(
        NodeId::new(node_id),
        sequence,
        EntropyDigest([0x11; 32]),
        ProofSignature([0x22; 64]),
        UnixMillis::new(1_000 + sequence),
    );
    Heartbeat::new(proof, "CAMERA_NOISE")
}

/// Channel that replays a script, then acks everything.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    script: Mutex<VecDeque<Scripted>>,
    posted: Mutex<Vec<Sequence>>,
    posts: AtomicUsize,
    not_ready: AtomicBool,
    notify: Notify,
}

impl ScriptedChannel {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Append more reactions.
    pub fn push(&self, step: Scripted) {
        self.script.lock().push_back(step);
    }

    pub fn set_ready(&self, ready: bool) {
        self.not_ready.store(!ready, Ordering::SeqCst);
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    /// Sequence numbers of every posted heartbeat, in order.
    pub fn posted_sequences(&self) -> Vec<Sequence> {
        self.posted.lock().clone()
    }

    /// Resolve once at least `n` posts have been made.
    pub async fn wait_for_posts(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.posts() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl AnonymousChannel for ScriptedChannel {
    async fn post(
        &self,
        _onion_address: &str,
        _path: &str,
        body: Vec<u8>,
    ) -> Result<ChannelResponse, ChannelError> {
        if let Ok(wire) = HeartbeatWire::from_json(&body) {
            self.posted.lock().push(wire.sequence);
        }
        let step = self.script.lock().pop_front();
        self.posts.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();

        match step {
            None => Ok(ack(1.0)),
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Status(status)) => Ok(ChannelResponse {
                status,
                body: Vec::new(),
            }),
            Some(Scripted::Fail(e)) => Err(e),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Err(ChannelError::Timeout)
            }
        }
    }

    async fn is_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }
}
