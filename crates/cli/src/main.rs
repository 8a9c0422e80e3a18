//! Shopfloor CLI - headless runs over JSON instances

mod agents;
mod render;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shopfloor_core::application::{bounds, Environment, SimConfig};
use shopfloor_core::domain::Instance;

use agents::{Agent, AgentKind};
use render::RenderMode;

#[derive(Parser)]
#[command(name = "shopfloor")]
#[command(about = "Shopfloor simulation core CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an instance headlessly with a built-in agent
    Run {
        /// Instance file (JSON)
        instance: PathBuf,

        /// Agent policy
        #[arg(long, value_enum, default_value = "greedy")]
        agent: AgentKind,

        /// RNG seed for stochastic time sources and the random agent
        #[arg(long, env = "SHOPFLOOR_SEED", default_value = "0")]
        seed: u64,

        /// Hard cap on external steps
        #[arg(long, default_value = "100000")]
        max_steps: u64,

        /// Invalid actions tolerated before truncation
        #[arg(long, env = "SHOPFLOOR_JOKER", default_value = "3")]
        joker: u32,

        /// Truncation once now > lower_bound * factor
        #[arg(long, default_value = "3.0")]
        max_time_fct: f64,

        /// Truncation once actions > operations * factor
        #[arg(long, default_value = "20.0")]
        max_action_fct: f64,

        /// Gate transport offers on head-of-queue position
        #[arg(long)]
        no_early_transport: bool,

        /// What to print after the run
        #[arg(long, value_enum, default_value = "default")]
        render: RenderMode,
    },

    /// Validate an instance file and print its shape
    Validate {
        /// Instance file (JSON)
        instance: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    match Cli::parse().command {
        Commands::Run {
            instance,
            agent,
            seed,
            max_steps,
            joker,
            max_time_fct,
            max_action_fct,
            no_early_transport,
            render,
        } => {
            let instance = load_instance(&instance)?;
            let config = SimConfig {
                truncation_joker: joker,
                truncation_active: true,
                max_time_fct,
                max_action_fct,
                allow_early_transport: !no_early_transport,
                seed,
            };
            run(instance, config, agent, seed, max_steps, render)
        }
        Commands::Validate { instance } => validate(&instance),
    }
}

fn init_logging() {
    let log_format = std::env::var("SHOPFLOOR_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("shopfloor=info"))
        .expect("Failed to create env filter");
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

fn load_instance(path: &PathBuf) -> Result<Instance> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let instance: Instance =
        serde_json::from_reader(file).with_context(|| format!("malformed instance: {}", path.display()))?;
    Ok(instance)
}

fn run(
    instance: Instance,
    config: SimConfig,
    agent: AgentKind,
    seed: u64,
    max_steps: u64,
    mode: RenderMode,
) -> Result<()> {
    tracing::info!(
        machines = instance.machines.len(),
        transports = instance.transports.len(),
        jobs = instance.jobs.len(),
        seed,
        "Starting headless run"
    );
    let mut env = Environment::with_defaults(instance, config)?;
    let mut agent = Agent::new(agent, seed);
    let (_, info) = env.reset()?;
    println!("episode {}", info.episode.dimmed());

    let mut total_reward = 0.0;
    let mut last = None;
    for _ in 0..max_steps {
        let out = env.step(&agent.decide())?;
        total_reward += out.reward;
        let finished = out.terminated || out.truncated;
        last = Some(out);
        if finished {
            break;
        }
    }

    let Some(out) = last else {
        anyhow::bail!("no steps executed");
    };
    if out.terminated {
        println!("{}", "terminated".green().bold());
    } else if out.truncated {
        let reason = if out.info.deadlock { "truncated (deadlock)" } else { "truncated" };
        println!("{}", reason.red().bold());
    } else {
        println!("{}", "step limit reached".yellow().bold());
    }
    println!("  time          {}", out.info.time.0);
    if let Some(makespan) = out.info.makespan {
        println!("  makespan      {}", makespan.0);
    }
    println!("  actions       {}", out.info.action_count);
    println!("  jokers left   {}", out.info.jokers_left);
    println!("  total reward  {:.2}", total_reward);

    render::render(mode, env.history());
    Ok(())
}

fn validate(path: &PathBuf) -> Result<()> {
    let instance = load_instance(path)?.normalized();
    instance
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid instance: {}", e))?;
    println!("{}", "instance ok".green().bold());
    println!("  machines     {}", instance.machines.len());
    println!("  transports   {}", instance.transports.len());
    println!("  jobs         {}", instance.jobs.len());
    println!("  operations   {}", instance.total_operations());
    println!("  lower bound  {}", bounds::lower_bound(&instance));
    Ok(())
}
