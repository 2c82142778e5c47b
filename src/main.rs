use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use taihu::arena::{AutoParticipant, Participant, Room};
use taihu::config::RuleConfig;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Plays hands between four automatic seats and logs every step.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// JSON rule config, missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Wall shuffle seed, random when omitted.
    #[arg(short, long)]
    seed: Option<u64>,
    #[arg(short = 'n', long, default_value_t = 4)]
    hands: u32,
    #[arg(short, long)]
    verbose: bool,
    /// Print each hand's seat results as a JSON line.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(level)
        .init();

    taihu::init()?;
    let config = match &args.config {
        Some(path) => RuleConfig::from_path(path)?,
        None => RuleConfig::default(),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    info!("seed {seed}, {} hands", args.hands);

    let participants = (0..4)
        .map(|_| Box::new(AutoParticipant::new()) as Box<dyn Participant>)
        .collect();
    let mut room = Room::new(config, participants, seed)?;
    for _ in 0..args.hands {
        let result = room.play_hand();
        if args.json {
            println!("{}", serde_json::to_string(&result.results)?);
        }
    }
    info!("totals after {} hands: {:?}", args.hands, room.totals());
    Ok(())
}
