//! Startup-artifact health listing for the `artifacts` command.
//!
//! Every artifact is probed independently, so a missing snapshot shows up
//! as one ERROR row instead of aborting the listing. Nothing here needs
//! API credentials — the encoder and generator rows report configuration,
//! not connectivity.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;
use crate::store::FeatureStore;

pub async fn list_artifacts(config: &Config) -> Result<()> {
    println!("{:<18} {:<8} DETAIL", "ARTIFACT", "STATUS");

    for (name, path) in [
        ("place snapshot", &config.stores.place_snapshot),
        ("person snapshot", &config.stores.person_snapshot),
    ] {
        match FeatureStore::load(path) {
            Ok(store) => print_row(
                name,
                "OK",
                &format!("{} records, {} dims", store.len(), store.dims()),
            ),
            Err(e) => print_row(name, "ERROR", &e.to_string()),
        }
    }

    for (name, path) in [
        ("place encoder", &config.encoders.place.model_path),
        ("person encoder", &config.encoders.person.model_path),
        ("classifier", &config.classifier.model_path),
    ] {
        match probe_file(path) {
            Ok(size) => print_row(name, "OK", &format!("{} ({} bytes)", path.display(), size)),
            Err(e) => print_row(name, "ERROR", &e),
        }
    }

    match load_label_count(&config.classifier.labels_path) {
        Ok(count) => print_row("label table", "OK", &format!("{} classes", count)),
        Err(e) => print_row("label table", "ERROR", &e),
    }

    match count_places(&config.index.db_path).await {
        Ok(count) => print_row("place index", "OK", &format!("{} places", count)),
        Err(e) => print_row("place index", "ERROR", &e),
    }

    print_row(
        "text encoder",
        &config.index.embedding.provider,
        config
            .index
            .embedding
            .model
            .as_deref()
            .unwrap_or("local-sentence-encoder"),
    );
    print_row(
        "generator",
        "remote",
        &format!("{} via {}", config.generation.model, config.generation.base_url),
    );

    Ok(())
}

fn print_row(name: &str, status: &str, detail: &str) {
    println!("{:<18} {:<8} {}", name, status, detail);
}

fn probe_file(path: &Path) -> Result<u64, String> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| format!("{}: {}", path.display(), e))
}

fn load_label_count(path: &Path) -> Result<usize, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let labels: Vec<String> =
        serde_json::from_str(&content).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(labels.len())
}

async fn count_places(path: &Path) -> Result<i64, String> {
    if !path.exists() {
        return Err(format!("{}: not found", path.display()));
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| e.to_string())?
        .read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| e.to_string())?;
    let row = sqlx::query("SELECT COUNT(*) AS n FROM places")
        .fetch_one(&pool)
        .await
        .map_err(|e| e.to_string())?;
    let count = row.get("n");
    pool.close().await;
    Ok(count)
}
