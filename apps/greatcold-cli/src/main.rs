mod scenario;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use greatcold_kernel::{
    FreezeStage, FuelHeatSource, FuelItem, FuelKind, SimConfig, SimEvent, Simulation,
};
use greatcold_persist::{ColdStore, SnapshotStore};
use greatcold_tools::{HeaterInfo, SimInspector};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scenario::{Scenario, Sink};

#[derive(Parser)]
#[command(name = "greatcold-cli", about = "Drive and inspect the cold hazard engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Run the sandbox scenario: a snowy plain with a campfire and a heater
    Simulate {
        /// Seconds of simulated time
        #[arg(short, long, default_value = "600")]
        secs: u64,
        /// Global stage to run at (0-3)
        #[arg(short = 'g', long, default_value = "1")]
        stage: u8,
        /// Players lined up from the heater outward
        #[arg(short, long, default_value = "3")]
        players: usize,
        /// Coal blocks fed to the heater at start
        #[arg(long, default_value = "2")]
        coal_blocks: u32,
        /// YAML file overriding engine settings
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Store directory; resumes from and saves to it
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
    /// Show the newest saved state in a store directory
    Inspect { data_dir: PathBuf },
    /// Check a store directory's hash chain
    Verify { data_dir: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Info => {
            println!("greatcold-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", greatcold_common::crate_info());
            println!("stream: {}", greatcold_stream::crate_info());
            println!("kernel: {}", greatcold_kernel::crate_info());
            println!("persist: {}", greatcold_persist::crate_info());
            println!("tools: {}", greatcold_tools::crate_info());
        }
        Commands::Simulate {
            secs,
            stage,
            players,
            coal_blocks,
            config,
            data_dir,
        } => {
            let config = load_config(config.as_deref())?;
            let sink = match data_dir {
                Some(dir) => Sink::Store(
                    ColdStore::open(&dir)
                        .with_context(|| format!("opening store at {}", dir.display()))?,
                ),
                None => Sink::Memory(SnapshotStore::new()),
            };
            simulate(config, sink, secs, stage, players, coal_blocks)?;
        }
        Commands::Inspect { data_dir } => inspect(&data_dir)?,
        Commands::Verify { data_dir } => {
            let store = ColdStore::open(&data_dir)?;
            store.verify_integrity()?;
            println!(
                "OK: {} snapshot(s) retained, {} written",
                store.snapshot_files().len(),
                store.meta().snapshot_count
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening config {}", path.display()))?;
    let config: SimConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn simulate(
    config: SimConfig,
    mut sink: Sink,
    secs: u64,
    stage: u8,
    players: usize,
    coal_blocks: u32,
) -> anyhow::Result<()> {
    let mut sim = Simulation::new(config);
    let mut world = Scenario::build(players);

    // Area loads arrive through the command queue like any host notification.
    if world.attach(&mut sim, &mut sink)? {
        info!(tick = sim.tick_count(), heaters = sim.heaters().len(), "resumed from store");
    }

    if sim.heaters().get(world.heater).is_none() {
        sim.place_fuel_source(&mut world.host, world.heater, FuelKind::SmallHeater)?;
    }
    if coal_blocks > 0 {
        match sim.feed_item(&mut world.host, world.heater, FuelItem::CoalBlock, coal_blocks) {
            Ok(used) => info!(used, "heater fed"),
            Err(err) => warn!(%err, "heater not fed"),
        }
    }
    sim.set_global_stage(stage)?;
    println!(
        "Simulating {secs}s at global stage {stage}: {} entities, campfire at {}, heater at {}",
        world.entities.len(),
        world.campfire,
        world.heater
    );

    let tracked = world.tracked();
    let mut tally: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut melted = 0;
    let mut damage = 0.0;
    for _ in 0..secs {
        let report = sim.tick(sim.config().tick_ms, &mut world.host, &tracked, &mut sink);
        melted += report.melted;
        damage += report.damage;
        for event in sim.drain_events() {
            *tally.entry(event_label(&event)).or_default() += 1;
            if let SimEvent::FreezeRaised { id, stage } = event {
                let name = world
                    .entities
                    .iter()
                    .find(|(_, e)| e.id == id)
                    .map_or("?", |(n, _)| n.as_str());
                info!(entity = name, %stage, t = sim.now_ms() / 1_000, "freeze raised");
            }
        }
    }
    sim.shutdown(&mut sink)?;
    if let Sink::Memory(store) = &sink {
        info!(snapshots = store.snapshot_count(), "kept in memory only");
    }

    println!("{}", SimInspector::summary(&sim));
    println!("Melted {melted} blocks, dealt {damage:.1} cold damage");
    for (label, count) in &tally {
        println!("  {label}: {count}");
    }
    for heater in SimInspector::heaters(&sim) {
        println!("  {heater}");
    }
    for (name, entity) in &world.entities {
        match SimInspector::inspect_entity(&sim, entity.id) {
            Some(info) => println!("  {name}: {info}"),
            None => println!("  {name}: not tracked"),
        }
    }
    Ok(())
}

fn inspect(data_dir: &Path) -> anyhow::Result<()> {
    let store = ColdStore::open(data_dir)?;
    let Some(state) = store.load_latest()? else {
        println!("Store at {} is empty", data_dir.display());
        return Ok(());
    };

    println!(
        "World '{}': tick={} t={}s global stage={} auto={} infinite={}",
        state.world,
        state.tick,
        state.elapsed_ms / 1_000,
        state.stage.stage,
        state.stage.auto_advance,
        state.stage.infinite
    );
    println!("Heaters: {}", state.heaters.len());
    for h in &state.heaters {
        let source = FuelHeatSource::with_fuel(h.kind, h.pos, h.fuel_ms);
        println!("  {}", HeaterInfo::from(&source));
    }

    let mut stages: BTreeMap<FreezeStage, usize> = BTreeMap::new();
    for freeze in state.freeze.values() {
        *stages.entry(freeze.stage).or_default() += 1;
    }
    println!("Entities: {}", state.freeze.len());
    for (stage, count) in stages {
        println!("  {stage}: {count}");
    }
    Ok(())
}

fn event_label(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::HeaterPlaced { .. } => "heater placed",
        SimEvent::HeaterRemoved { .. } => "heater removed",
        SimEvent::HeaterStateChanged { .. } => "heater state changed",
        SimEvent::HeaterInvalidated { .. } => "heater invalidated",
        SimEvent::Melted { .. } => "melt runs",
        SimEvent::FreezeRaised { .. } => "freeze raised",
        SimEvent::FreezeThawed { .. } => "freeze thawed",
        SimEvent::FreezeDemoted { .. } => "freeze demoted",
        SimEvent::UndergroundChanged { .. } => "underground changed",
        SimEvent::InsulationActivated { .. } => "insulation activated",
        SimEvent::InsulationDeactivated { .. } => "insulation deactivated",
        SimEvent::InsulationBroken { .. } => "insulation broken",
        SimEvent::StageChanged { .. } => "stage changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn simulate_flags_parse() {
        let cli = Cli::try_parse_from([
            "greatcold-cli", "simulate", "-s", "30", "-g", "3", "-p", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate {
                secs,
                stage,
                players,
                ..
            } => assert_eq!((secs, stage, players), (30, 3, 2)),
            _ => panic!("expected simulate"),
        }
    }
}
