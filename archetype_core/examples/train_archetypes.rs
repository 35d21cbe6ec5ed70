//! Label the raw survey corpus and train the archetype classifier.
//!
//! Run with: cargo run --example train_archetypes -- [config.toml]

use archetype_engine_core::{ConfigError, EngineConfig, PersonalityEngine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = load_config()?;
    let engine = PersonalityEngine::new(config);

    if !engine.config().paths.labeled_dataset.exists() {
        tracing::info!("No labeled dataset yet, clustering the raw corpus");
        let summary = engine.try_label_dataset()?;
        println!(
            "Labeled {} of {} respondents (inertia {:.2})",
            summary.labeled_rows, summary.total_rows, summary.inertia
        );
        for (name, size) in &summary.archetype_sizes {
            println!("  {:<22} {}", name, size);
        }
    }

    let report = engine.train()?;
    println!("\n{} accuracy: {:.4}", report.model_type, report.accuracy);
    println!("{}", report.report);
    Ok(())
}

fn load_config() -> Result<EngineConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_file(path),
        None => EngineConfig::load_from_file("config/engine.toml").or_else(|err| {
            eprintln!("Falling back to default config: {err}");
            Ok(EngineConfig::default())
        }),
    }
}
