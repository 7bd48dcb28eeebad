//! # Kemet Guide CLI (`kemet`)
//!
//! The `kemet` binary runs the three grounded pipelines from the command
//! line and hosts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! kemet --config ./config/kemet.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kemet artifacts` | List startup artifacts and their health |
//! | `kemet recognize` | Match an image against a feature store |
//! | `kemet translate` | Classify hieroglyph crops and synthesize a reading |
//! | `kemet chat` | Ask the domain-restricted chatbot one question |
//! | `kemet plan` | Generate a schema-constrained trip itinerary |
//! | `kemet serve` | Start the JSON HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use kemet_guide::{app, artifacts, chat, config, plan, recognize, server, translate};

/// Kemet Guide — grounded recognition, translation, and trip planning
/// over a knowledge base of ancient Egyptian sites.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kemet.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kemet",
    about = "Kemet Guide — grounded recognition, translation, and trip planning",
    version,
    long_about = "Kemet Guide grounds images and text queries in a knowledge base of ancient \
    Egyptian places and symbols, then explains them in natural language: nearest-neighbor \
    place/person recognition, hieroglyph classification with LLM-synthesized translation, and \
    retrieval-augmented itinerary planning constrained to a structured schema."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kemet.toml`. All artifact paths, encoder
    /// settings, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/kemet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List startup artifacts and their health.
    ///
    /// Probes each snapshot, model, and index independently and prints
    /// one status row per artifact. Useful for verifying configuration
    /// before starting the server.
    Artifacts,

    /// Recognize a place or person in an image.
    ///
    /// Embeds the image with the domain's frozen encoder and matches it
    /// against the domain's feature store by cosine similarity. An empty
    /// store yields the domain's "unknown" sentinel.
    Recognize {
        /// Visual domain: `place` or `person`.
        #[arg(long)]
        domain: String,

        /// Path to the image file.
        image: PathBuf,
    },

    /// Translate a sequence of cropped hieroglyph images.
    ///
    /// Classifies each crop independently (1 to 10 images, in reading
    /// order), then asks the generative model to synthesize a reading
    /// from the classified symbols.
    Translate {
        /// Paths to the cropped symbol images, in reading order.
        images: Vec<PathBuf>,
    },

    /// Ask the domain-restricted chatbot one question.
    ///
    /// Streams the response to stdout as it is generated.
    Chat {
        /// The question to ask.
        question: String,

        /// Optional grounding context folded into the question.
        #[arg(long)]
        context: Option<String>,
    },

    /// Generate a day-by-day trip itinerary.
    ///
    /// Retrieves the closest historical places to the query from the
    /// vector index and generates a schema-constrained plan over them.
    Plan {
        /// Free-text interests (e.g., "New Kingdom temples").
        #[arg(long)]
        query: String,

        /// Trip start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Number of days to plan.
        #[arg(long)]
        days: u32,

        /// Budget descriptor (e.g., "budget", "mid-range", "luxury").
        #[arg(long)]
        budget: String,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// four pipelines plus `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    // `artifacts` reports on a broken setup instead of requiring a
    // working one, so it runs before the context is loaded.
    if let Commands::Artifacts = cli.command {
        artifacts::list_artifacts(&cfg).await?;
        return Ok(());
    }

    let ctx = Arc::new(app::AppContext::load(cfg).await?);

    match cli.command {
        Commands::Artifacts => unreachable!(),
        Commands::Recognize { domain, image } => {
            recognize::run_recognize(&ctx, &domain, &image).await?;
        }
        Commands::Translate { images } => {
            translate::run_translate(&ctx, &images).await?;
        }
        Commands::Chat { question, context } => {
            chat::run_chat(&ctx, &question, context).await?;
        }
        Commands::Plan {
            query,
            start,
            days,
            budget,
        } => {
            plan::run_plan(&ctx, &query, &start, days, &budget).await?;
        }
        Commands::Serve => {
            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
