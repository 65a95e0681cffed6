use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mocap_placement::config::Config;
use mocap_placement::export::LayoutExporter;
use mocap_placement::session::{ConfigurationSlot, PlacementSession};
use mocap_placement::skeleton::{Joint, Performer};

const CONFIG_PATH: &str = "config.toml";
/// observation_seconds = 0 のときに finalize するまでの秒数
const ON_DEMAND_SECONDS: f32 = 10.0;

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("mocap_placement=info".parse()?);
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true).with_target(false))
        .with(env_filter)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);
    config.validate().context("Invalid configuration")?;

    let performer = Performer::from_config(config.center(), &config.performance);
    let static_scene = config.scene();
    let mut session = PlacementSession::from_config(&config)?;
    let settings = session.settings();
    let space = session.space();

    println!("=== Mocap Camera Placement ({}) ===", env!("GIT_VERSION"));
    println!("Config: {}", config_path);
    println!("Surface: {:?}", space.surface);
    println!("Arc: {:.1}° from {:.1}°", space.arc.span_deg(), space.arc.start_deg());
    println!("Cameras: {} (grid {} m)", settings.camera_count, space.grid_spacing);
    println!("FOV: {}° (max {} m, {:?})",
        config.camera.fov_deg, config.camera.max_view_distance, config.camera.fov_model);
    println!("Selection: {:?} / second best: {:?}", settings.strategy, settings.second_best);
    println!();

    session.start().context("Failed to start placement session")?;
    println!("Candidates: {}", session.candidates().len());

    let dt = 1.0 / config.performance.frame_rate;
    let on_demand = config.sampling.observation_seconds <= 0.0;
    let mut frame_index: u32 = 0;

    let outcome = loop {
        let t = frame_index as f32 * dt;
        let frame = performer.frame_at(t);
        let scene = static_scene.with_dynamic(performer.colliders_at(t));

        if let Some(outcome) = session.advance(dt, &frame, &scene)? {
            break outcome;
        }
        if on_demand && session.elapsed() >= ON_DEMAND_SECONDS {
            info!("Forcing selection after {:.1} s", session.elapsed());
            break session.finalize(&frame, &scene)?;
        }
        frame_index += 1;
    };

    println!("Ticks: {}", session.statistics().ticks());
    println!();

    for (slot, label) in [(ConfigurationSlot::Best, "Best"), (ConfigurationSlot::SecondBest, "Second best")] {
        session.set_active(slot)?;
        if let Some(active) = session.active() {
            println!("--- {} configuration ---", label);
            print!("{}", active);
            println!();
        }
    }
    session.set_active(ConfigurationSlot::Best)?;

    println!("Minimum cameras seen per joint:");
    for (i, seen) in outcome.min_cameras_seen.iter().enumerate() {
        let name = Joint::from_index(i).map_or("?", |j| j.name());
        match seen {
            Some(n) => println!("  {:>2} {:<15} {}", i, name, n),
            None => println!("  {:>2} {:<15} -", i, name),
        }
    }

    if config.export.enabled {
        let exporter = LayoutExporter::from_config(&config.export);
        let center = config.center();
        exporter.export(&config.export.best_path, &outcome.best.positions(), &center);
        exporter.export(&config.export.second_path, &outcome.second_best.positions(), &center);
    }

    Ok(())
}
