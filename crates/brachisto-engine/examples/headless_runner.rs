//! Run the economy without a front end and log its progress.
//!
//! ```text
//! cargo run -p brachisto-engine --example headless_runner -- [data_dir] [ticks]
//! RUST_LOG=brachisto_engine=debug cargo run -p brachisto-engine --example headless_runner
//! ```

use std::path::PathBuf;

use brachisto_engine::{Action, GameEngine};
use tracing_subscriber::EnvFilter;

const REPORT_EVERY: u64 = 600;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));
    let ticks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(6_000);

    let mut engine = match GameEngine::from_dir(&data_dir) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    // A simple opening: split earth's probes between mining and replication,
    // research intelligence first.
    engine.perform_action(Action::AllocateProbes {
        zone_id: "earth".into(),
        harvest: Some(0.5),
        construct: Some(0.1),
        replicate: Some(0.4),
        recycle: None,
        recycle_probes: None,
        dyson: None,
    });
    engine.perform_action(Action::ToggleResearchCategory {
        category: brachisto_tech_tree::ResearchCategory::Intelligence,
        enabled: true,
    });

    for _ in 0..ticks {
        let report = engine.tick();
        for event in &report.tech_events {
            tracing::info!(?event, "research");
        }
        if report.tick % REPORT_EVERY == 0 {
            let state = engine.state();
            tracing::info!(
                tick = report.tick,
                days = format!("{:.1}", state.time_days),
                probes = format!("{:.3e}", state.derived.total_probes),
                metal_kg = format!("{:.3e}", state.derived.total_stored_metal),
                structures = state.derived.total_structures,
                throttle = format!("{:.3}", state.energy.throttle),
                dyson = format!("{:.2e}", state.derived.dyson_completion),
                "progress"
            );
        }
    }

    let stats = engine.stats().cumulative();
    tracing::info!(
        days = stats.days_simulated,
        mined_kg = stats.mined_kg,
        probes_built = stats.probes_built,
        structures = stats.structures_completed,
        "run finished"
    );
}
