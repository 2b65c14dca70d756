//! Learned-mode decision transport
//!
//! The learned policy runs behind a request/response boundary: a task owns
//! the policy and answers decision requests over a channel, and the runner
//! awaits each answer under a hard per-tick deadline. A timeout or channel
//! failure yields no direction, which the decision loop treats exactly as
//! "no safe action". There are no retries.
//!
//! Learning requests are awaited too, so a tick never overlaps the next
//! one's state read.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::game::{Board, Direction, Position};
use crate::policy::{LearnedPolicy, Observation, Policy, Transition};

use super::persistence::SnapshotData;
use super::state::State;

/// Everything the decision side needs to reproduce the board state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub total_weeks: usize,
    pub first_day_offset: usize,
    /// Cell reward counts in calendar order.
    pub rewards: Vec<u32>,
    /// Body positions, head first.
    pub body: Vec<Position>,
    /// A precomputed safe direction, honored directly outside training.
    pub candidate: Option<Direction>,
    pub training: bool,
}

/// The chosen direction; `None` means no viable action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub direction: Option<Direction>,
}

/// Build a request from live board state.
pub fn build_request(
    board: &Board,
    body: &[Position],
    candidate: Option<Direction>,
    training: bool,
) -> DecisionRequest {
    DecisionRequest {
        total_weeks: board.total_weeks(),
        first_day_offset: board.first_day_offset(),
        rewards: board.cells().to_vec(),
        body: body.to_vec(),
        candidate,
        training,
    }
}

/// Answer one decision request against the given policy.
pub fn handle_request(policy: &mut LearnedPolicy, request: &DecisionRequest) -> DecisionResponse {
    let none = DecisionResponse { direction: None };

    let board = match Board::new(
        request.total_weeks,
        request.first_day_offset,
        request.rewards.clone(),
    ) {
        Ok(board) => board,
        Err(err) => {
            eprintln!("decision request carried an invalid board: {err:#}");
            return none;
        }
    };

    let Some(&head) = request.body.first() else {
        eprintln!("decision request carried an empty body");
        return none;
    };

    let safe_actions: Vec<Direction> = Direction::ALL
        .iter()
        .copied()
        .filter(|direction| {
            let next = head.step(*direction);
            board.in_bounds(next) && !request.body.contains(&next)
        })
        .collect();

    if safe_actions.is_empty() {
        return none;
    }

    if !request.training {
        let direction = request
            .candidate
            .filter(|candidate| safe_actions.contains(candidate))
            .or_else(|| safe_actions.first().copied());
        return DecisionResponse { direction };
    }

    let state = State::encode(&board, &request.body, head);
    let obs = Observation {
        head,
        state,
        safe_actions,
    };
    DecisionResponse {
        direction: policy.decide(&board, &request.body, &obs),
    }
}

enum Command {
    Decide {
        request: DecisionRequest,
        reply: oneshot::Sender<DecisionResponse>,
    },
    Learn {
        transition: Transition,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SnapshotData>,
    },
    Shutdown {
        reply: oneshot::Sender<SnapshotData>,
    },
}

/// Handle to the task owning the learned policy.
pub struct DecisionService {
    tx: mpsc::Sender<Command>,
}

impl DecisionService {
    /// Spawn the service task around a policy.
    pub fn spawn(policy: LearnedPolicy) -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(service_loop(policy, rx));
        Self { tx }
    }

    /// Request a decision, bounded by `deadline`. Timeouts and transport
    /// failures are logged and come back as `None`, never retried.
    pub async fn decide(&self, request: DecisionRequest, deadline: Duration) -> Option<Direction> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = Command::Decide {
            request,
            reply: reply_tx,
        };
        if self.tx.send(command).await.is_err() {
            eprintln!("decision service is gone, treating tick as failed");
            return None;
        }

        match tokio::time::timeout(deadline, reply_rx).await {
            Ok(Ok(response)) => response.direction,
            Ok(Err(_)) => {
                eprintln!("decision service dropped the reply, treating tick as failed");
                None
            }
            Err(_) => {
                eprintln!(
                    "decision exceeded the {}ms deadline, treating tick as failed",
                    deadline.as_millis()
                );
                None
            }
        }
    }

    /// Feed a committed transition to the policy and wait until the update
    /// has been applied.
    pub async fn learn(&self, transition: Transition) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = Command::Learn {
            transition,
            reply: reply_tx,
        };
        if self.tx.send(command).await.is_err() {
            eprintln!("decision service is gone, dropping transition");
            return;
        }
        let _ = reply_rx.await;
    }

    /// Extract a snapshot of the learned state.
    pub async fn snapshot(&self) -> Option<SnapshotData> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Snapshot { reply: reply_tx })
            .await
            .is_err()
        {
            return None;
        }
        reply_rx.await.ok()
    }

    /// Stop the service, returning a final snapshot for a synchronous save.
    pub async fn shutdown(&self) -> Option<SnapshotData> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Shutdown { reply: reply_tx })
            .await
            .is_err()
        {
            return None;
        }
        reply_rx.await.ok()
    }
}

async fn service_loop(mut policy: LearnedPolicy, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Decide { request, reply } => {
                let _ = reply.send(handle_request(&mut policy, &request));
            }
            Command::Learn { transition, reply } => {
                policy.learn(&transition);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(policy.agent().snapshot());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(policy.agent().snapshot());
                break;
            }
        }
    }
}
