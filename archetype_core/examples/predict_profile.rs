//! Load a trained model and classify a few reference profiles.
//!
//! Run with: cargo run --example predict_profile

use archetype_engine_core::{EngineConfig, PersonalityEngine, TraitDimension};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let config = EngineConfig::load_from_file("config/engine.toml").unwrap_or_default();
    let engine = PersonalityEngine::new(config);
    if !engine.load_artifacts() {
        eprintln!("Model could not be loaded; run the train_archetypes example first");
        std::process::exit(1);
    }

    let alternating = [5.0, 4.0, 5.0, 4.0, 5.0, 4.0, 5.0, 4.0, 5.0, 4.0];
    let mut high_extraversion = alternating.to_vec();
    high_extraversion.extend([3.0; 40]);
    let mut high_conscientiousness = vec![3.0; 30];
    high_conscientiousness.extend(alternating);
    high_conscientiousness.extend([3.0; 10]);
    let balanced = vec![3.0; 50];

    let cases = [
        ("High extraversion", high_extraversion),
        ("High conscientiousness", high_conscientiousness),
        ("Balanced profile", balanced),
    ];

    for (idx, (label, answers)) in cases.iter().enumerate() {
        let prediction = engine.predict(answers)?;
        println!("\n{}. {}", idx + 1, label);
        println!(
            "   Archetype: {} (id {}, confidence {:.1}%)",
            prediction.archetype_name,
            prediction.archetype_id,
            prediction.confidence * 100.0
        );
        for dim in TraitDimension::all() {
            println!("     {}: {:.2}", dim.code(), prediction.trait_scores.get(dim));
        }

        let mut ranked: Vec<(&String, &f64)> = prediction.distribution.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1));
        for (name, p) in ranked {
            println!("     {:<22} {:.1}%", name, p * 100.0);
        }
    }

    let importance = engine.feature_importance()?;
    println!("\nDimension importance:");
    for (code, value) in &importance.per_dimension {
        println!("  {}: {:.4}", code, value);
    }
    Ok(())
}
