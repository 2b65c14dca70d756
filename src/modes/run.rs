//! Autonomous run mode
//!
//! Drives the decision loop at the configured cadence, switching to the
//! accelerated cadence while the board has no reward cells left. In learned
//! mode the per-tick decision goes through the decision service under a
//! hard deadline, snapshots are fired off in the background on a wall-clock
//! interval and every Nth episode, and shutdown performs one final
//! synchronous save.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::game::{Board, DecisionLoop, EngineConfig, EpisodeEnd, TickOutcome};
use crate::policy::{HeuristicPolicy, LearnedPolicy};
use crate::rl::{
    build_request, DecisionService, FileSnapshotStore, QLearningAgent, QLearningConfig,
    SnapshotStore,
};

/// Which policy drives the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// Path-following heuristic; synchronous, no persistence.
    Heuristic,
    /// Q-learning policy behind the decision service.
    Learned,
}

/// Configuration for the run mode.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: PolicyMode,

    /// Tick interval in heuristic mode.
    pub heuristic_tick: Duration,

    /// Tick interval in learned mode.
    pub learned_tick: Duration,

    /// Accelerated tick interval once the board is exhausted.
    pub rage_tick: Duration,

    /// Hard per-tick deadline for a learned decision.
    pub decision_deadline: Duration,

    /// Wall-clock interval between background snapshots.
    pub autosave_interval: Duration,

    /// Also snapshot every Nth completed episode.
    pub autosave_episode_stride: u64,

    /// Stop after this many episodes; run until interrupted when `None`.
    pub episode_budget: Option<u64>,

    /// Print a progress line every N episodes.
    pub log_frequency: u64,

    /// Snapshot directory for learned mode.
    pub data_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Heuristic,
            heuristic_tick: Duration::from_millis(300),
            learned_tick: Duration::from_millis(50),
            rage_tick: Duration::from_millis(200),
            decision_deadline: Duration::from_millis(200),
            autosave_interval: Duration::from_secs(300),
            autosave_episode_stride: 50,
            episode_budget: None,
            log_frequency: 100,
            data_dir: PathBuf::from("data/snake-training"),
        }
    }
}

impl RunConfig {
    /// Check that all parameters are in valid ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.heuristic_tick.is_zero() || self.learned_tick.is_zero() || self.rage_tick.is_zero()
        {
            return Err("tick intervals must be non-zero".to_string());
        }
        if self.decision_deadline.is_zero() {
            return Err("decision_deadline must be non-zero".to_string());
        }
        if self.autosave_interval.is_zero() {
            return Err("autosave_interval must be non-zero".to_string());
        }
        if self.autosave_episode_stride == 0 {
            return Err("autosave_episode_stride must be at least 1".to_string());
        }
        if self.log_frequency == 0 {
            return Err("log_frequency must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Autonomous run mode driving one decision loop over one board.
pub struct RunMode {
    config: RunConfig,
    rl_config: QLearningConfig,
    engine: DecisionLoop,
    board: Board,
}

impl RunMode {
    pub fn new(
        config: RunConfig,
        engine_config: EngineConfig,
        rl_config: QLearningConfig,
        board: Board,
    ) -> Self {
        let engine = DecisionLoop::new(engine_config, &board);
        Self {
            config,
            rl_config,
            engine,
            board,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.print_header();
        self.engine.activate();

        match self.config.mode {
            PolicyMode::Heuristic => self.run_heuristic().await?,
            PolicyMode::Learned => self.run_learned().await?,
        }

        self.print_final();
        Ok(())
    }

    /// The tick interval that currently applies.
    fn cadence(&self) -> Duration {
        if self.board.is_exhausted() {
            self.config.rage_tick
        } else {
            match self.config.mode {
                PolicyMode::Heuristic => self.config.heuristic_tick,
                PolicyMode::Learned => self.config.learned_tick,
            }
        }
    }

    fn budget_reached(&self) -> bool {
        self.config
            .episode_budget
            .is_some_and(|budget| self.engine.episodes() >= budget)
    }

    async fn run_heuristic(&mut self) -> Result<()> {
        let mut policy = HeuristicPolicy;
        let mut cadence = self.cadence();
        let mut ticker = time::interval(cadence);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.engine.tick(&mut self.board, &mut policy);
                    self.handle_outcome(&outcome);
                    if self.budget_reached() {
                        break;
                    }

                    let wanted = self.cadence();
                    if wanted != cadence {
                        cadence = wanted;
                        ticker = time::interval(cadence);
                    }
                }
                _ = shutdown_signal() => {
                    println!("\nshutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn run_learned(&mut self) -> Result<()> {
        let store = Arc::new(
            FileSnapshotStore::new(&self.config.data_dir)
                .context("failed to open the snapshot store")?,
        );
        let agent = QLearningAgent::restore(self.rl_config.clone(), store.as_ref());
        let service = DecisionService::spawn(LearnedPolicy::new(agent));

        let mut cadence = self.cadence();
        let mut ticker = time::interval(cadence);
        let mut autosave = time::interval_at(
            Instant::now() + self.config.autosave_interval,
            self.config.autosave_interval,
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.learned_tick(&service).await;
                    self.handle_outcome(&outcome);

                    if outcome.episode_end.is_some()
                        && self.engine.episodes() % self.config.autosave_episode_stride == 0
                    {
                        fire_save(&service, &store).await;
                    }
                    if self.budget_reached() {
                        break;
                    }

                    let wanted = self.cadence();
                    if wanted != cadence {
                        cadence = wanted;
                        ticker = time::interval(cadence);
                    }
                }
                _ = autosave.tick() => {
                    fire_save(&service, &store).await;
                }
                _ = shutdown_signal() => {
                    println!("\nshutting down");
                    break;
                }
            }
        }

        // Final synchronous best-effort save.
        match service.shutdown().await {
            Some(snapshot) => match store.save(&snapshot) {
                Ok(()) => println!("final snapshot saved to {:?}", store.dir()),
                Err(err) => eprintln!("final save failed: {err:#}"),
            },
            None => eprintln!("decision service was gone before the final save"),
        }

        Ok(())
    }

    /// One learned tick: observe, ask the service under the deadline,
    /// commit, and feed the transition back before the tick ends.
    async fn learned_tick(&mut self, service: &DecisionService) -> TickOutcome {
        let obs = self.engine.observe(&self.board);
        if obs.safe_actions.is_empty() {
            return self.engine.commit(&mut self.board, None);
        }

        let request = build_request(
            &self.board,
            self.engine.body(),
            obs.safe_actions.first().copied(),
            true,
        );
        let decision = service
            .decide(request, self.config.decision_deadline)
            .await;

        let outcome = self.engine.commit(&mut self.board, decision);
        if let Some(transition) = outcome.transition.clone() {
            service.learn(transition).await;
        }
        outcome
    }

    fn handle_outcome(&mut self, outcome: &TickOutcome) {
        let Some(end) = outcome.episode_end else {
            return;
        };

        let episodes = self.engine.episodes();
        if end == EpisodeEnd::Success || episodes % self.config.log_frequency == 0 {
            let label = match end {
                EpisodeEnd::Success => "success",
                EpisodeEnd::Failure => "failure",
            };
            println!(
                "[episode {}] {} | reward {:.1} | cleared {}/{}",
                episodes,
                label,
                outcome.episode_reward.unwrap_or(0.0),
                self.engine.successes(),
                episodes,
            );
        }

        // A cleared board starts the next round fresh.
        if end == EpisodeEnd::Success {
            self.board.restore_all();
        }
    }

    fn print_header(&self) {
        println!("{}", "=".repeat(60));
        println!("contribution snake");
        println!("{}", "=".repeat(60));
        println!(
            "Board: {} weeks, offset {}, {} reward cells",
            self.board.total_weeks(),
            self.board.first_day_offset(),
            self.board.remaining_rewards(),
        );
        println!("Mode: {:?}", self.config.mode);
        if self.config.mode == PolicyMode::Learned {
            println!("Data dir: {:?}", self.config.data_dir);
            println!(
                "Autosave: every {:?} and every {} episodes",
                self.config.autosave_interval, self.config.autosave_episode_stride,
            );
        }
        match self.config.episode_budget {
            Some(budget) => println!("Episodes: {}", budget),
            None => println!("Episodes: until interrupted"),
        }
        println!("{}", "=".repeat(60));
    }

    fn print_final(&self) {
        println!(
            "\nDone: {} episodes, {} cleared boards",
            self.engine.episodes(),
            self.engine.successes(),
        );
    }
}

/// Fire a snapshot save in the background; failures are logged, never
/// retried, and never block the tick loop.
async fn fire_save(service: &DecisionService, store: &Arc<FileSnapshotStore>) {
    let Some(snapshot) = service.snapshot().await else {
        eprintln!("could not snapshot the agent for saving");
        return;
    };

    let store = Arc::clone(store);
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => eprintln!("background save failed: {err:#}"),
            Err(err) => eprintln!("background save task failed: {err}"),
        }
    });
}

/// Resolves when the process is asked to stop (Ctrl-C, and SIGTERM on
/// Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                eprintln!("failed to install SIGTERM handler: {}", err);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
