//! candy CLI: run the scheduler against demo eaters, or preview a reorder.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use candy_service::config::Config;
use candy_service::reorder::interleave;
use candy_service::telemetry::{TelemetryConfig, init_telemetry};
use candy_service::{CandyEater, CandyService, Flavour, ReorderPolicy};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "candy", about = "Flavour-aware candy eating service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit candies to a pool of demo eaters and wait for them to be eaten
    Run {
        /// Flavours to submit, in order (e.g. 0,1,1,2,2,2)
        #[arg(value_delimiter = ',', allow_negative_numbers = true, required = true)]
        flavours: Vec<i64>,
        /// Submit the whole list this many times
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        /// Number of eaters (overrides CANDY_EATERS)
        #[arg(long)]
        eaters: Option<usize>,
        /// How long one candy takes to eat, in milliseconds
        #[arg(long, default_value_t = 200)]
        eat_ms: u64,
        /// Flavour whose eater never finishes
        #[arg(long, allow_negative_numbers = true)]
        stuck: Option<i64>,
        /// Flavour whose eater always fails
        #[arg(long, allow_negative_numbers = true)]
        fail: Option<i64>,
        /// Reorder policy (overrides CANDY_REORDER)
        #[arg(long)]
        reorder: Option<ReorderPolicy>,
        /// Print lifecycle events as JSON lines
        #[arg(long)]
        events: bool,
    },
    /// Print the order the pending buffer would take after interleaving
    Reorder {
        /// Flavours in submission order (e.g. 0,1,1,2,2,2)
        #[arg(value_delimiter = ',', allow_negative_numbers = true, required = true)]
        flavours: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            flavours,
            repeat,
            eaters,
            eat_ms,
            stuck,
            fail,
            reorder,
            events,
        } => {
            let plan = RunPlan {
                flavours,
                repeat,
                eaters,
                eat: Duration::from_millis(eat_ms),
                stuck: stuck.map(Flavour),
                fail: fail.map(Flavour),
                reorder,
                events,
            };
            cmd_run(plan).await
        }
        Command::Reorder { flavours } => cmd_reorder(flavours),
    }
}

struct RunPlan {
    flavours: Vec<i64>,
    repeat: usize,
    eaters: Option<usize>,
    eat: Duration,
    stuck: Option<Flavour>,
    fail: Option<Flavour>,
    reorder: Option<ReorderPolicy>,
    events: bool,
}

/// Sleeps per candy; hangs forever on the stuck flavour, errors on the failing one.
struct DemoEater {
    id: usize,
    eat: Duration,
    stuck: Option<Flavour>,
    fail: Option<Flavour>,
}

#[async_trait]
impl CandyEater<Flavour> for DemoEater {
    async fn eat(&self, candy: Flavour) -> anyhow::Result<()> {
        info!(eater = self.id, %candy, "om nom nom'ing");
        if Some(candy) == self.stuck {
            info!(eater = self.id, %candy, "boom, this one never ends");
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.eat).await;
        if Some(candy) == self.fail {
            anyhow::bail!("{candy} tasted awful");
        }
        info!(eater = self.id, %candy, "om nom nom'd");
        Ok(())
    }
}

async fn cmd_run(plan: RunPlan) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "candy".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let eater_count = plan.eaters.unwrap_or(config.eaters);
    if eater_count == 0 {
        anyhow::bail!("--eaters must be at least 1");
    }
    let total = candy_count(plan.flavours.len(), plan.repeat)?;
    let mut service_config = config.service;
    if let Some(policy) = plan.reorder {
        service_config = service_config.reorder(policy);
    }

    let eaters = (0..eater_count).map(|id| DemoEater {
        id,
        eat: plan.eat,
        stuck: plan.stuck,
        fail: plan.fail,
    });
    let service = CandyService::with_config(eaters, service_config)?;

    if plan.events {
        let mut events = service.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
            }
        });
    }

    let candies: Vec<Flavour> = plan
        .flavours
        .iter()
        .copied()
        .map(Flavour)
        .cycle()
        .take(total)
        .collect();
    // Only the first stuck candy ever starts; the rest of its flavour wait behind it.
    let expected = candies
        .iter()
        .filter(|&&c| Some(c) != plan.stuck)
        .count() as u64;

    info!(candies = candies.len(), eaters = eater_count, "serving candies");
    let started = std::time::Instant::now();
    for candy in candies {
        service.submit(candy);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tick = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = tick.tick() => {
                if service.stats().finished() >= expected {
                    break;
                }
            }
        }
    }

    let stats = service.stats();
    println!(
        "Elapsed time: {} ms (eaten: {}, failed: {}, still pending: {}, in flight: {:?})",
        started.elapsed().as_millis(),
        stats.eaten,
        stats.failed,
        stats.pending,
        stats.in_flight.iter().map(ToString::to_string).collect::<Vec<_>>(),
    );

    service.shutdown().await;
    Ok(())
}

fn candy_count(flavours: usize, repeat: usize) -> anyhow::Result<usize> {
    match flavours.checked_mul(repeat) {
        Some(total) => Ok(total),
        None => anyhow::bail!("{flavours} flavours repeated {repeat} times is too many candies"),
    }
}

fn cmd_reorder(flavours: Vec<i64>) -> anyhow::Result<()> {
    let mut pending: VecDeque<Flavour> = flavours.into_iter().map(Flavour).collect();
    interleave(&mut pending);
    let ordered: Vec<String> = pending.iter().map(|f| f.0.to_string()).collect();
    println!("{}", ordered.join(","));
    Ok(())
}
