//! Seed behavior samples for the intent model.
//!
//! The file holds a `samples` list in the same shape the browser posts:
//!
//! ```yaml
//! samples:
//!   - { scroll: 0.9, time: 24000, clicks: 12, ctaSeen: 1, converted: 1 }
//!   - { scroll: 0.2, time: 3000, clicks: 1 }
//! ```
//!
//! Samples are sanitized before insert, exactly as the ingest endpoint does.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use nudge_core::behavior::BehaviorSample;
use nudge_storefront::db::BehaviorRepository;

use super::connect;

#[derive(Debug, Deserialize)]
struct SeedFile {
    samples: Vec<BehaviorSample>,
}

fn parse_seed(content: &str) -> Result<Vec<BehaviorSample>, serde_yaml::Error> {
    let file: SeedFile = serde_yaml::from_str(content)?;
    Ok(file
        .samples
        .into_iter()
        .map(BehaviorSample::sanitized)
        .collect())
}

/// Insert behavior samples from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the database
/// is unreachable.
pub async fn behavior(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading behavior samples from file");

    // Parse before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let samples = parse_seed(&content)?;
    info!(samples = samples.len(), "Parsed seed file");

    let pool = connect().await?;
    let repo = BehaviorRepository::new(&pool);

    for sample in &samples {
        repo.insert(sample).await?;
    }

    info!("Seeding complete!");
    info!("  Samples inserted: {}", samples.len());
    info!("  Stored samples: {}", repo.count().await?);

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_sanitizes() {
        let samples = parse_seed(
            "samples:\n  - { scroll: 1.7, time: 24000, clicks: 12, ctaSeen: 1, converted: 1 }\n  - { scroll: 0.2 }\n",
        )
        .unwrap();

        assert_eq!(samples.len(), 2);
        assert!((samples[0].scroll - 1.0).abs() < f64::EPSILON);
        assert!((samples[0].converted - 1.0).abs() < f64::EPSILON);
        assert!(samples[1].clicks.abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_seed_requires_samples_key() {
        assert!(parse_seed("- { scroll: 0.5 }\n").is_err());
    }
}
