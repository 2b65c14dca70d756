//! Decision policies
//!
//! The decision loop is policy-agnostic: heuristic path-following and the
//! learned Q-policy both answer the same contract, a decision over the
//! current observation plus an optional learning step over the committed
//! transition.

use crate::game::{Board, Direction, Position};
use crate::rl::{QLearningAgent, State};
use crate::search::{best_safe_step, find_path};

/// What a policy sees at the start of a tick.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Current head position.
    pub head: Position,
    /// Encoded feature snapshot.
    pub state: State,
    /// Directions that stay in bounds and off the body, in canonical
    /// right/left/down/up order.
    pub safe_actions: Vec<Direction>,
}

/// A committed move together with the states around it and its reward.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: State,
    pub action: Direction,
    pub next_state: State,
    pub reward: f64,
}

/// A movement policy.
///
/// `decide` returns `None` only when no viable action exists, which the
/// decision loop treats as episode failure.
pub trait Policy {
    fn decide(&mut self, board: &Board, body: &[Position], obs: &Observation) -> Option<Direction>;

    /// Observe a committed transition. Policies that do not learn ignore it.
    fn learn(&mut self, _transition: &Transition) {}
}

/// Path-following policy: route to the nearest reward cell through the
/// safety-aware search, or take the best-ranked safe neighbor when no route
/// is found or no reward remains.
pub struct HeuristicPolicy;

impl Policy for HeuristicPolicy {
    fn decide(&mut self, board: &Board, body: &[Position], obs: &Observation) -> Option<Direction> {
        if obs.safe_actions.is_empty() {
            return None;
        }

        let target = board.nearest_reward(obs.head);

        if let Some(target) = target {
            if let Some(path) = find_path(obs.head, target, board, body) {
                if let Some(direction) = path
                    .first()
                    .and_then(|&next| direction_between(obs.head, next))
                {
                    if obs.safe_actions.contains(&direction) {
                        return Some(direction);
                    }
                }
            }
        }

        best_safe_step(obs.head, target, board, body)
            .and_then(|next| direction_between(obs.head, next))
    }
}

/// Q-learning policy backed by a tabular agent.
pub struct LearnedPolicy {
    agent: QLearningAgent,
}

impl LearnedPolicy {
    pub fn new(agent: QLearningAgent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &QLearningAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut QLearningAgent {
        &mut self.agent
    }

    pub fn into_agent(self) -> QLearningAgent {
        self.agent
    }
}

impl Policy for LearnedPolicy {
    fn decide(
        &mut self,
        _board: &Board,
        _body: &[Position],
        obs: &Observation,
    ) -> Option<Direction> {
        if obs.safe_actions.is_empty() {
            return None;
        }
        Some(self.agent.select_action(&obs.state, &obs.safe_actions))
    }

    fn learn(&mut self, transition: &Transition) {
        self.agent
            .update(&transition.state, transition.action, &transition.next_state, transition.reward);
    }
}

fn direction_between(from: Position, to: Position) -> Option<Direction> {
    Direction::from_delta(to.week - from.week, to.day - from.day)
}
