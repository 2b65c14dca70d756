use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use contrib_snake::game::{Board, EngineConfig, DAYS_PER_WEEK};
use contrib_snake::modes::{PolicyMode, RunConfig, RunMode};
use contrib_snake::rl::QLearningConfig;

#[derive(Parser)]
#[command(name = "contrib_snake")]
#[command(version, about = "Snake agent roaming a contribution calendar")]
struct Cli {
    /// Decision policy
    #[arg(long, default_value = "heuristic")]
    mode: Mode,

    /// Number of calendar weeks on the board
    #[arg(long, default_value = "52")]
    weeks: usize,

    /// Weekday offset of the first calendar cell (0-6)
    #[arg(long, default_value = "0")]
    offset: usize,

    /// Fraction of cells carrying a reward
    #[arg(long, default_value = "0.15")]
    density: f64,

    /// Seed for board generation (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many episodes (run until interrupted when omitted)
    #[arg(long)]
    episodes: Option<u64>,

    /// Snapshot directory for learned mode
    #[arg(long, default_value = "data/snake-training")]
    data_dir: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Follow the safety-aware path search
    Heuristic,
    /// Follow the learned Q-policy
    Learned,
}

impl From<Mode> for PolicyMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Heuristic => PolicyMode::Heuristic,
            Mode::Learned => PolicyMode::Learned,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !(0.0..=1.0).contains(&cli.density) {
        return Err(anyhow!("density must be in [0, 1], got {}", cli.density));
    }

    let board = generate_board(cli.weeks, cli.offset, cli.density, cli.seed)
        .context("failed to build the board")?;

    let engine_config = EngineConfig::default();
    engine_config.validate().map_err(|e| anyhow!(e))?;

    let rl_config = QLearningConfig::default();
    rl_config.validate().map_err(|e| anyhow!(e))?;

    let run_config = RunConfig {
        mode: cli.mode.into(),
        episode_budget: cli.episodes,
        data_dir: cli.data_dir,
        ..Default::default()
    };
    run_config.validate().map_err(|e| anyhow!(e))?;

    RunMode::new(run_config, engine_config, rl_config, board)
        .run()
        .await
}

/// Generate a random board: each cell carries a count in 1..=4 with the
/// given density, mimicking a contribution calendar.
fn generate_board(weeks: usize, offset: usize, density: f64, seed: Option<u64>) -> Result<Board> {
    let mut rng: StdRng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let cell_count = weeks
        .checked_mul(DAYS_PER_WEEK)
        .and_then(|total| total.checked_sub(offset))
        .ok_or_else(|| anyhow!("board has no cells"))?;

    let cells = (0..cell_count)
        .map(|_| {
            if rng.gen::<f64>() < density {
                rng.gen_range(1..=4)
            } else {
                0
            }
        })
        .collect();

    Board::new(weeks, offset, cells)
}
