use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

/// A request for human approval of an escalated step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlRequest {
    pub id: Uuid,
    pub task_id: Uuid,
    pub step_id: Uuid,
    pub tool: String,
    pub arguments: serde_json::Value,
    /// Why policy escalated this step.
    pub reason: String,
    /// Context snapshot for the responder: the task objective and how far
    /// the run has progressed.
    pub objective: String,
    pub iteration: u32,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlDecision {
    Approve,
    Deny,
}

/// The responder's answer, or the gate's synthesized deny on timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlResponse {
    pub request_id: Uuid,
    pub decision: HitlDecision,
    /// Who answered; `None` when the gate timed out or nobody was listening.
    pub responder: Option<String>,
    pub responded_at: DateTime<Utc>,
    pub timed_out: bool,
}

impl HitlResponse {
    pub fn approved(&self) -> bool {
        self.decision == HitlDecision::Approve
    }

    fn denied_unattended(request_id: Uuid, timed_out: bool) -> Self {
        Self {
            request_id,
            decision: HitlDecision::Deny,
            responder: None,
            responded_at: Utc::now(),
            timed_out,
        }
    }
}

/// An answer sent back through the gate by whoever is listening.
#[derive(Debug, Clone)]
pub struct HitlAnswer {
    pub decision: HitlDecision,
    pub responder: Option<String>,
}

/// One in-flight approval: the request alongside the channel that answers it.
pub type PendingRequest = (HitlRequest, oneshot::Sender<HitlAnswer>);

/// The approval gate suspends the loop while a human decides.
///
/// Requests travel over an mpsc channel to whichever listener took the
/// receiver (CLI prompt, chat bridge, test harness); each carries a oneshot
/// responder. No listener or a timeout resolves to deny — the gate never
/// lets an unanswered escalation through.
pub struct ApprovalGate {
    request_tx: mpsc::Sender<PendingRequest>,
    request_rx: parking_lot::Mutex<Option<mpsc::Receiver<PendingRequest>>>,
    /// Steps with an outstanding request; the contract allows at most one.
    pending_steps: Arc<DashSet<Uuid>>,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            request_tx: tx,
            request_rx: parking_lot::Mutex::new(Some(rx)),
            pending_steps: Arc::new(DashSet::new()),
        }
    }

    /// Take the receiver (used by the responder side to listen for
    /// requests). Can only be taken once.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<PendingRequest>> {
        self.request_rx.lock().take()
    }

    /// Request approval for a step. Resolves when the responder answers,
    /// the timeout elapses, or no listener exists — the latter two deny.
    pub async fn request_approval(&self, request: HitlRequest, timeout: Duration) -> HitlResponse {
        let request_id = request.id;
        let step_id = request.step_id;

        if !self.pending_steps.insert(step_id) {
            warn!(%step_id, "approval already pending for step; denying duplicate request");
            return HitlResponse::denied_unattended(request_id, false);
        }

        info!(
            %request_id,
            %step_id,
            tool = %request.tool,
            reason = %request.reason,
            "requesting human approval"
        );

        let response = self.dispatch(request, timeout).await;
        self.pending_steps.remove(&step_id);
        response
    }

    async fn dispatch(&self, request: HitlRequest, timeout: Duration) -> HitlResponse {
        let request_id = request.id;
        let (response_tx, response_rx) = oneshot::channel();

        if self.request_tx.send((request, response_tx)).await.is_err() {
            // No one listening — auto-deny.
            return HitlResponse::denied_unattended(request_id, false);
        }

        match tokio::time::timeout(timeout, response_rx).await {
            Ok(Ok(answer)) => HitlResponse {
                request_id,
                decision: answer.decision,
                responder: answer.responder,
                responded_at: Utc::now(),
                timed_out: false,
            },
            // Listener dropped the responder without answering.
            Ok(Err(_)) => HitlResponse::denied_unattended(request_id, false),
            Err(_) => {
                info!(%request_id, "approval request timed out");
                HitlResponse::denied_unattended(request_id, true)
            }
        }
    }
}
