#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use edmd::config::{Document, Snapshot};
use edmd::observer::{SharedStats, SharedStatsObserver};
use edmd::system::{Halt, SchedulerMaintainer, System};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Runs an event-driven molecular dynamics simulation from a
/// configuration document.
#[derive(Parser)]
#[command(name = "edmd", version, about)]
struct Opts {
    /// Configuration document to run.
    config: PathBuf,

    /// Stop after this much simulation time.
    #[arg(long, value_name = "T")]
    sim_time: Option<f64>,

    /// Stop after this many events.
    #[arg(long, value_name = "N")]
    events: Option<u64>,

    /// Override the configuration's RNG seed.
    #[arg(long, value_name = "SEED")]
    random_seed: Option<u64>,

    /// Rebuild the event queue every this much simulation time.
    #[arg(long, value_name = "T")]
    rebuild_interval: Option<f64>,

    /// Where to write the final configuration snapshot.
    #[arg(long, value_name = "PATH", default_value = "config.out.json")]
    output: PathBuf,
}

fn data_path(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".data.json");
    PathBuf::from(path)
}

fn run(opts: &Opts) -> Result<()> {
    let text = std::fs::read_to_string(&opts.config)
        .with_context(|| format!("cannot read {}", opts.config.display()))?;

    // A snapshot resumes as-is; anything else loads as a fresh document.
    let mut simulation = match Snapshot::from_json(&text) {
        Ok(snapshot) => snapshot.restore()?,
        Err(_) => {
            let mut document = Document::from_json(&text)
                .with_context(|| format!("cannot parse {}", opts.config.display()))?;
            if let Some(seed) = opts.random_seed {
                document.seed = seed;
            }
            let mut simulation = document.build()?;
            simulation.initialise()?;
            simulation
        }
    };

    if let Some(sim_time) = opts.sim_time {
        simulation
            .systems
            .push(System::from(Halt::new("halt".into(), sim_time)));
    }
    if let Some(interval) = opts.rebuild_interval {
        simulation.systems.push(System::from(SchedulerMaintainer::new(
            "maintainer".into(),
            interval,
        )));
    }
    simulation.max_events = opts.events;

    let stats = SharedStats::default();
    simulation
        .observers
        .register(Box::new(SharedStatsObserver(stats.clone())));

    simulation.run()?;

    log::info!(
        "run finished: {} events, t = {}, {} interaction / {} local rejections",
        simulation.world.event_count,
        simulation.world.time,
        simulation.scheduler.interaction_rejections(),
        simulation.scheduler.local_rejections(),
    );

    let snapshot = Snapshot::capture(&mut simulation).to_json()?;
    std::fs::write(&opts.output, snapshot)
        .with_context(|| format!("cannot write {}", opts.output.display()))?;

    let data = serde_json::json!({
        "events": simulation.world.event_count,
        "sim_time": simulation.world.time,
        "kinetic_energy": simulation.world.kinetic_energy(),
        "internal_energy": simulation.world.internal_energy,
        "kinetic_temperature": simulation.world.kinetic_temperature(),
        "interaction_rejections": simulation.scheduler.interaction_rejections(),
        "local_rejections": simulation.scheduler.local_rejections(),
        "stats": &*stats.borrow(),
    });
    let path = data_path(&opts.output);
    std::fs::write(&path, serde_json::to_string_pretty(&data)?)
        .with_context(|| format!("cannot write {}", path.display()))?;

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let opts = Opts::parse();

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        Opts::command().debug_assert();
    }

    #[test]
    fn data_path_appends_suffix() {
        assert_eq!(
            data_path(Path::new("out.json")),
            PathBuf::from("out.json.data.json")
        );
    }
}
