//! SimLink CLI binary.
//!
//! Drives a remote simulation from the command line.
//!
//! # Commands
//!
//! - `run` - Wait for a simulation, then step it with random or zero actions
//! - `config` - Print the effective configuration as TOML

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use simlink::{
    side_channel::StatsSideChannel, EngineConfig, EnvConfig, Environment, SharedSideChannel,
    VERSION,
};

#[derive(Parser)]
#[command(name = "simlink")]
#[command(version = VERSION)]
#[command(about = "SimLink - drive a remote reinforcement learning simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConnectionArgs {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker id, offsets the listening port
    #[arg(short, long)]
    worker_id: Option<u16>,

    /// Connect to a simulation running in the editor
    #[arg(long)]
    editor: bool,

    /// Seed sent to the simulation
    #[arg(long)]
    seed: Option<i32>,

    /// Seconds to wait for the simulation to connect
    #[arg(long)]
    timeout: Option<u64>,

    /// Simulation speed multiplier
    #[arg(long)]
    time_scale: Option<f32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a simulation and step it
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Number of steps after the initial reset
        #[arg(short = 'n', long, default_value = "100")]
        steps: usize,

        /// Send zero actions instead of random ones
        #[arg(long)]
        zero: bool,

        /// Seed for the random action generator
        #[arg(long)]
        action_seed: Option<u64>,

        /// Log level when RUST_LOG is unset
        #[arg(long, default_value = "info")]
        log_level: String,
    },

    /// Print the effective configuration
    Config {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            connection,
            steps,
            zero,
            action_seed,
            log_level,
        } => cmd_run(&connection, steps, zero, action_seed, &log_level),

        Commands::Config { connection } => cmd_config(&connection),
    }
}

fn load_config(args: &ConnectionArgs) -> anyhow::Result<EnvConfig> {
    let base = match &args.config {
        Some(path) => EnvConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EnvConfig::default(),
    };
    let mut config = base.merge(EnvConfig::from_env());

    if let Some(worker_id) = args.worker_id {
        config.worker_id = worker_id;
    }
    if args.editor {
        config.editor = true;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_wait_secs = timeout;
    }
    if let Some(time_scale) = args.time_scale {
        config
            .engine
            .get_or_insert_with(EngineConfig::default)
            .time_scale = Some(time_scale);
    }
    Ok(config)
}

fn cmd_config(args: &ConnectionArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", toml::to_string_pretty(&config)?);
    println!("# listening port: {}", config.port()?);
    Ok(())
}

fn cmd_run(
    args: &ConnectionArgs,
    steps: usize,
    zero: bool,
    action_seed: Option<u64>,
    log_level: &str,
) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = load_config(args)?;
    let stats = Arc::new(Mutex::new(StatsSideChannel::new()));
    let channels = vec![stats.clone() as SharedSideChannel];

    println!("Waiting for the simulation on port {}...", config.port()?);
    let mut env = Environment::open(&config, channels).context("connecting to the simulation")?;
    println!(
        "Connected to {} (package {}, API {})",
        env.remote().name,
        env.remote().package_version,
        env.remote().communication_version
    );

    let mut rng = match action_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    env.reset()?;
    report(&env, 0)?;

    for step in 1..=steps {
        let names: Vec<String> = env.behavior_names().into_iter().map(String::from).collect();
        for name in &names {
            let Some(spec) = env.behavior_specs().get(name).cloned() else {
                continue;
            };
            let n_agents = env.get_steps(name)?.map_or(0, |(decision, _)| decision.len());
            if n_agents == 0 {
                continue;
            }
            let actions = if zero {
                spec.create_empty_action(n_agents)
            } else {
                spec.create_random_action(n_agents, &mut rng)
            };
            env.set_actions(name, actions)?;
        }

        env.step()?;
        report(&env, step)?;

        let collected = stats
            .lock()
            .map_err(|_| anyhow::anyhow!("stats channel poisoned"))?
            .get_and_reset_stats();
        for (key, values) in collected {
            if let Some((value, method)) = values.last() {
                println!("    stat {key} = {value:.3} ({method:?})");
            }
        }
    }

    env.close()?;
    Ok(())
}

fn report(env: &Environment, step: usize) -> anyhow::Result<()> {
    for name in env.behavior_names() {
        let Some((decision, terminal)) = env.get_steps(name)? else {
            continue;
        };
        let count = decision.len() + terminal.len();
        let total: f32 = decision.reward.sum() + terminal.reward.sum();
        let mean = if count == 0 { 0.0 } else { total / count as f32 };
        println!(
            "step {step:>5}  {name}: {} deciding, {} done, mean reward {mean:.3}",
            decision.len(),
            terminal.len()
        );
    }
    Ok(())
}
