use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use coop_kitchen_core::{
    NUM_AGENTS,
    config::{EnvConfig, RewardMode},
    environment::Kitchen,
    level::{Level, PRESET_NAMES},
    policy::{PlanningChef, Policy, RandomPolicy},
    stats::{EndReason, EpisodeStats},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    /// Uniformly random actions
    Random,
    /// Scripted planning cooks
    Chef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Rewards {
    Shaped,
    Sparse,
}

#[derive(Parser, Debug)]
#[command(version, about = "Runs seeded evaluation episodes in the cooperative kitchen", long_about = None)]
struct Args {
    /// Level preset to load
    #[arg(short, long, default_value = "level_1")]
    level: String,

    /// Level layout file, overrides --level
    #[arg(long, value_name = "LAYOUT_FILE")]
    layout: Option<PathBuf>,

    /// JSON environment config
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Episodes to run per environment
    #[arg(short, long, default_value_t = 10)]
    episodes: u32,

    /// Base seed; each environment is seeded with base_seed + global env index
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Environments run by this worker
    #[arg(long, default_value_t = 1)]
    envs_per_worker: u64,

    /// Slot of this worker among parallel workers
    #[arg(long, default_value_t = 0)]
    worker_slot: u64,

    /// Override the config's episode length cap
    #[arg(long)]
    max_steps: Option<u32>,

    /// Override the config's reward mode
    #[arg(long, value_enum)]
    rewards: Option<Rewards>,

    #[arg(short, long, value_enum, default_value_t = PolicyKind::Chef)]
    policy: PolicyKind,

    /// Print one JSON line per episode
    #[arg(long)]
    json: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coop_kitchen=info,coop_kitchen_core=info,warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging was already initialised");
    }
}

fn load_config(args: &Args) -> Result<EnvConfig> {
    let mut config = match &args.config {
        Some(path) => EnvConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EnvConfig::default(),
    };
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    if let Some(rewards) = args.rewards {
        config.reward_mode = match rewards {
            Rewards::Shaped => RewardMode::Shaped,
            Rewards::Sparse => RewardMode::Sparse,
        };
    }
    config.validate()?;
    Ok(config)
}

fn load_level(args: &Args) -> Result<Level> {
    match &args.layout {
        Some(path) => {
            let layout = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read layout {}", path.display()))?;
            Level::parse_str(&layout).with_context(|| format!("Invalid layout {}", path.display()))
        }
        None => Level::preset(&args.level).with_context(|| {
            format!("Unknown level '{}', expected one of {:?}", args.level, PRESET_NAMES)
        }),
    }
}

fn make_policies(kind: PolicyKind, seed: u64) -> [Box<dyn Policy>; NUM_AGENTS] {
    match kind {
        PolicyKind::Random => [
            Box::new(RandomPolicy::new(seed)),
            Box::new(RandomPolicy::new(seed.wrapping_add(1))),
        ],
        PolicyKind::Chef => [
            Box::new(PlanningChef::new(seed)),
            Box::new(PlanningChef::new(seed.wrapping_add(1))),
        ],
    }
}

/// Seeds for an environment's episodes: the environment seed first, then
/// draws from a generator seeded with it. Any episode can be replayed alone
/// from its recorded seed.
fn episode_seeds(env_seed: u64, episodes: u32) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(env_seed);
    (0..episodes)
        .map(|episode| if episode == 0 { env_seed } else { rng.random() })
        .collect()
}

/// Plays one episode to completion.
fn run_episode(
    kitchen: &mut Kitchen,
    policies: &mut [Box<dyn Policy>; NUM_AGENTS],
    seed: u64,
) -> EpisodeStats {
    kitchen.reset(Some(seed));
    let mut stats = EpisodeStats::new(Some(seed));

    while !stats.is_finished() {
        let actions = [policies[0].act(kitchen, 0), policies[1].act(kitchen, 1)];
        let result = kitchen.step(actions[0], actions[1]);
        stats.record(actions, &result);
    }
    stats
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = load_config(&args)?;
    let level = load_level(&args)?;

    let mut all = Vec::new();
    for env_index in 0..args.envs_per_worker {
        let global_index = args.worker_slot * args.envs_per_worker + env_index;
        let env_seed = args.seed.wrapping_add(global_index);
        let mut kitchen = Kitchen::new(level.clone(), config.clone())?;
        let mut policies = make_policies(args.policy, env_seed);

        tracing::info!(
            env = global_index,
            seed = env_seed,
            policy = policies[0].name(),
            "Starting environment"
        );

        for (episode, seed) in episode_seeds(env_seed, args.episodes).into_iter().enumerate() {
            let stats = run_episode(&mut kitchen, &mut policies, seed);

            tracing::info!(
                env = global_index,
                episode,
                seed,
                score = stats.score,
                failed = stats.failed_orders,
                reward = stats.total_reward,
                steps = stats.steps,
                end = ?stats.end_reason,
                "Episode finished"
            );
            if args.json {
                println!("{}", serde_json::to_string(&stats)?);
            }
            all.push(stats);
        }
    }

    if !all.is_empty() {
        let episodes = all.len() as f32;
        let mean_score = all.iter().map(|s| s.score as f32).sum::<f32>() / episodes;
        let mean_reward = all.iter().map(|s| s.total_reward).sum::<f32>() / episodes;
        let perfect = all.iter().filter(|s| s.perfect).count();
        let timed_out = all
            .iter()
            .filter(|s| s.end_reason == Some(EndReason::MaxSteps))
            .count();
        tracing::info!(
            episodes = all.len(),
            mean_score,
            mean_reward,
            perfect,
            timed_out,
            "Evaluation summary"
        );
    }

    Ok(())
}
