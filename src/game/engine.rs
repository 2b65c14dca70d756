//! Per-tick decision loop
//!
//! One tick observes the board, asks the policy for a direction, commits
//! the move, computes the transition reward and feeds it back to the
//! policy. Running out of safe actions is the only terminal condition, and
//! it is handled in place: the episode outcome is recorded and the snake
//! returns to the board's starting cell.

use crate::policy::{Observation, Policy, Transition};
use crate::rl::{reward, State};

use super::action::Direction;
use super::board::Board;
use super::config::EngineConfig;
use super::snake::{Position, Snake};

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEnd {
    /// Every reward cell on the board was consumed.
    Success,
    /// No safe action remained (or the decision step produced none).
    Failure,
}

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// The committed direction, if the snake moved.
    pub decision: Option<Direction>,
    /// Reward count of the cell eaten this tick.
    pub consumed: u32,
    /// The committed transition, for learning policies.
    pub transition: Option<Transition>,
    /// Set when this tick ended the episode.
    pub episode_end: Option<EpisodeEnd>,
    /// Accumulated episode reward, reported when the episode ended.
    pub episode_reward: Option<f64>,
}

/// The per-tick orchestrator.
///
/// Idle until activated; deactivation resets the current episode without
/// recording an outcome. The board is supplied by the caller each tick and
/// never retained.
pub struct DecisionLoop {
    config: EngineConfig,
    snake: Snake,
    active: bool,
    episodes: u64,
    successes: u64,
    episode_reward: f64,
}

impl DecisionLoop {
    pub fn new(config: EngineConfig, board: &Board) -> Self {
        Self {
            snake: Snake::new(board.first_free_cell()),
            config,
            active: false,
            episodes: 0,
            successes: 0,
            episode_reward: 0.0,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Leave the active state and reset the episode in progress.
    pub fn deactivate(&mut self, board: &Board) {
        self.active = false;
        self.reset(board);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current head position.
    pub fn head(&self) -> Position {
        self.snake.head()
    }

    /// Full body, head first.
    pub fn body(&self) -> &[Position] {
        self.snake.body()
    }

    /// Whether `pos` is currently part of the snake.
    pub fn is_snake_cell(&self, pos: Position) -> bool {
        self.snake.contains(pos)
    }

    /// Episodes completed so far.
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Episodes that ended with the board cleared.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Reward accumulated in the episode in progress.
    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    /// Encode the current state and enumerate the safe actions: directions
    /// whose destination exists on the board and is not a body cell.
    pub fn observe(&self, board: &Board) -> Observation {
        let head = self.snake.head();
        let state = State::encode(board, self.snake.body(), head);
        let safe_actions = Direction::ALL
            .iter()
            .copied()
            .filter(|direction| {
                let next = head.step(*direction);
                board.in_bounds(next) && !self.snake.contains(next)
            })
            .collect();

        Observation {
            head,
            state,
            safe_actions,
        }
    }

    /// Run one full tick through the given policy, including its learning
    /// step.
    pub fn tick<P: Policy>(&mut self, board: &mut Board, policy: &mut P) -> TickOutcome {
        if !self.active {
            return TickOutcome::default();
        }

        let obs = self.observe(board);
        if obs.safe_actions.is_empty() {
            return self.fail_episode(board);
        }

        let decision = policy.decide(board, self.snake.body(), &obs);
        let outcome = self.apply(board, obs, decision);
        if let Some(transition) = &outcome.transition {
            policy.learn(transition);
        }
        outcome
    }

    /// Commit an externally computed decision. `None` means no viable
    /// action and ends the episode as a failure; so does a direction that
    /// is not currently safe, since self-collision is terminal.
    ///
    /// The caller is responsible for feeding the returned transition to its
    /// policy; [`DecisionLoop::tick`] does both in one step.
    pub fn commit(&mut self, board: &mut Board, decision: Option<Direction>) -> TickOutcome {
        if !self.active {
            return TickOutcome::default();
        }

        let obs = self.observe(board);
        self.apply(board, obs, decision)
    }

    fn apply(
        &mut self,
        board: &mut Board,
        obs: Observation,
        decision: Option<Direction>,
    ) -> TickOutcome {
        let Some(direction) = decision else {
            return self.fail_episode(board);
        };
        if !obs.safe_actions.contains(&direction) {
            return self.fail_episode(board);
        }

        let next_head = obs.head.step(direction);
        let consumed = board.consume(next_head);
        if consumed > 0 {
            let growth =
                (consumed as usize * self.config.growth_per_count).min(self.config.growth_cap);
            self.snake.grow(growth, self.config.max_body_length);
            self.episode_reward += consumed as f64 * 10.0;
        }
        self.snake.advance(next_head);

        let next_state = State::encode(board, self.snake.body(), next_head);
        let step_reward = reward(&obs.state, &next_state);

        let mut outcome = TickOutcome {
            decision: Some(direction),
            consumed,
            transition: Some(Transition {
                state: obs.state,
                action: direction,
                next_state,
                reward: step_reward,
            }),
            episode_end: None,
            episode_reward: None,
        };

        if consumed > 0 && board.is_exhausted() {
            self.episodes += 1;
            self.successes += 1;
            outcome.episode_end = Some(EpisodeEnd::Success);
            outcome.episode_reward = Some(self.episode_reward);
            self.reset(board);
        }

        outcome
    }

    fn fail_episode(&mut self, board: &Board) -> TickOutcome {
        self.episodes += 1;
        let episode_reward = self.episode_reward;
        self.reset(board);

        TickOutcome {
            episode_end: Some(EpisodeEnd::Failure),
            episode_reward: Some(episode_reward),
            ..Default::default()
        }
    }

    fn reset(&mut self, board: &Board) {
        self.snake = Snake::new(board.first_free_cell());
        self.episode_reward = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::DAYS_PER_WEEK;
    use crate::policy::{HeuristicPolicy, LearnedPolicy};
    use crate::rl::{QLearningAgent, QLearningConfig};

    fn board_with(rewards: &[(usize, u32)], weeks: usize) -> Board {
        let mut cells = vec![0; weeks * DAYS_PER_WEEK];
        for &(index, count) in rewards {
            cells[index] = count;
        }
        Board::new(weeks, 0, cells).unwrap()
    }

    fn active_loop(board: &Board) -> DecisionLoop {
        let mut engine = DecisionLoop::new(EngineConfig::default(), board);
        engine.activate();
        engine
    }

    /// Body covering (0,0) with (1,0) and (0,1) blocked: no safe action.
    fn enclose(engine: &mut DecisionLoop) {
        let mut snake = Snake::new(Position::new(0, 1));
        snake.grow(2, 30);
        snake.advance(Position::new(1, 0));
        snake.advance(Position::new(0, 0));
        engine.snake = snake;
    }

    #[test]
    fn test_idle_loop_does_nothing() {
        let mut board = board_with(&[], 3);
        let mut engine = DecisionLoop::new(EngineConfig::default(), &board);

        let outcome = engine.tick(&mut board, &mut HeuristicPolicy);
        assert!(outcome.decision.is_none());
        assert!(outcome.episode_end.is_none());
        assert_eq!(engine.episodes(), 0);
    }

    #[test]
    fn test_tick_moves_and_reports_transition() {
        let mut board = board_with(&[(3 * 7, 1)], 5);
        let mut engine = active_loop(&board);

        let outcome = engine.tick(&mut board, &mut HeuristicPolicy);

        assert_eq!(outcome.decision, Some(Direction::Right));
        assert_eq!(engine.head(), Position::new(1, 0));
        let transition = outcome.transition.unwrap();
        assert_eq!(transition.action, Direction::Right);
        assert!(transition.reward.is_finite());
    }

    #[test]
    fn test_eating_grows_and_scores() {
        // Reward of 2 right next to the start cell.
        let mut board = board_with(&[(DAYS_PER_WEEK, 2), (2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        let outcome = engine.tick(&mut board, &mut HeuristicPolicy);

        assert_eq!(outcome.consumed, 2);
        assert_eq!(engine.episode_reward(), 20.0);
        // Growth of min(2 * 2, 8) = 4 is deferred; target length is 5.
        assert_eq!(engine.snake.target_len(), 5);
        assert!(outcome.episode_end.is_none());
    }

    #[test]
    fn test_growth_capped_per_cell() {
        let mut board = board_with(&[(DAYS_PER_WEEK, 5), (2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        engine.tick(&mut board, &mut HeuristicPolicy);

        // min(5 * 2, 8) = 8 extra segments.
        assert_eq!(engine.snake.target_len(), 9);
    }

    #[test]
    fn test_clearing_the_board_is_success() {
        let mut board = board_with(&[(DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        let outcome = engine.tick(&mut board, &mut HeuristicPolicy);

        assert_eq!(outcome.episode_end, Some(EpisodeEnd::Success));
        assert_eq!(outcome.episode_reward, Some(10.0));
        assert_eq!(engine.episodes(), 1);
        assert_eq!(engine.successes(), 1);
        // Reset back to the starting cell, length 1.
        assert_eq!(engine.head(), board.first_free_cell());
        assert_eq!(engine.body().len(), 1);
        assert_eq!(engine.episode_reward(), 0.0);
    }

    #[test]
    fn test_no_safe_action_is_failure_and_reset() {
        let mut board = board_with(&[(2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);
        enclose(&mut engine);

        let obs = engine.observe(&board);
        assert!(obs.safe_actions.is_empty());

        let outcome = engine.tick(&mut board, &mut HeuristicPolicy);

        assert_eq!(outcome.episode_end, Some(EpisodeEnd::Failure));
        assert!(outcome.decision.is_none());
        assert_eq!(engine.episodes(), 1);
        assert_eq!(engine.successes(), 0);
        assert_eq!(engine.body().len(), 1);
        assert_eq!(engine.head(), board.first_free_cell());
    }

    #[test]
    fn test_commit_none_is_failure() {
        let mut board = board_with(&[(2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        let outcome = engine.commit(&mut board, None);
        assert_eq!(outcome.episode_end, Some(EpisodeEnd::Failure));
        assert_eq!(engine.episodes(), 1);
    }

    #[test]
    fn test_commit_rejects_unsafe_direction() {
        let mut board = board_with(&[(2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        // Left from the start cell leaves the board.
        let outcome = engine.commit(&mut board, Some(Direction::Left));
        assert_eq!(outcome.episode_end, Some(EpisodeEnd::Failure));
    }

    #[test]
    fn test_commit_safe_direction_moves() {
        let mut board = board_with(&[(2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        let outcome = engine.commit(&mut board, Some(Direction::Down));
        assert!(outcome.episode_end.is_none());
        assert_eq!(engine.head(), Position::new(0, 1));
        assert!(outcome.transition.is_some());
    }

    #[test]
    fn test_learned_policy_is_updated_through_tick() {
        let mut board = board_with(&[(2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);
        let mut policy = LearnedPolicy::new(QLearningAgent::new(QLearningConfig::default()));

        engine.tick(&mut board, &mut policy);

        assert_eq!(policy.agent().stats().episode_count(), 1);
        assert_eq!(policy.agent().total_actions(), 1);
    }

    #[test]
    fn test_deactivate_resets_without_recording() {
        let mut board = board_with(&[(DAYS_PER_WEEK, 2), (2 * DAYS_PER_WEEK, 1)], 3);
        let mut engine = active_loop(&board);

        engine.tick(&mut board, &mut HeuristicPolicy);
        assert!(engine.episode_reward() > 0.0);

        engine.deactivate(&board);
        assert!(!engine.is_active());
        assert_eq!(engine.episodes(), 0);
        assert_eq!(engine.episode_reward(), 0.0);
        assert_eq!(engine.body().len(), 1);
    }

    #[test]
    fn test_collaborator_surface() {
        let board = board_with(&[], 3);
        let engine = active_loop(&board);

        assert_eq!(engine.head(), Position::new(0, 0));
        assert_eq!(engine.body(), &[Position::new(0, 0)]);
        assert!(engine.is_snake_cell(Position::new(0, 0)));
        assert!(!engine.is_snake_cell(Position::new(1, 0)));
    }
}
