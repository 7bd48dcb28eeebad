//! # Kemet Guide
//!
//! A retrieval-grounded heritage-guide service: visual place/person
//! recognition, hieroglyph translation, and trip-itinerary planning over
//! a knowledge base of ancient Egyptian sites.
//!
//! All three pipelines share one pattern — embed → retrieve/classify →
//! assemble grounding context → generate constrained text:
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ image / text │──▶│ encode or     │──▶│ retrieve:     │
//! │ request      │   │ classify      │   │ store / index │
//! └──────────────┘   └───────────────┘   └──────┬───────┘
//!                                               │
//!                      ┌────────────────────────┤
//!                      ▼                        ▼
//!                 ┌──────────┐            ┌──────────┐
//!                 │ assemble │───────────▶│ generate │
//!                 │ prompt   │            │ (LLM)    │
//!                 └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kemet artifacts                                # check startup artifacts
//! kemet recognize --domain place photo.jpg       # nearest-neighbor match
//! kemet translate glyph1.png glyph2.png          # classify + translate
//! kemet chat "Who built the Great Pyramid?"      # domain-restricted chat
//! kemet plan --query "temples" --start 2026-09-01 --days 3 --budget mid-range
//! kemet serve                                    # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types and typed requests |
//! | [`store`] | Immutable feature-store snapshots |
//! | [`matcher`] | Cosine-similarity nearest-neighbor matching |
//! | [`encoder`] | Frozen ONNX image encoders |
//! | [`classifier`] | Hieroglyph symbol classifier |
//! | [`embedding`] | Text-query encoders (remote and local) |
//! | [`index`] | Semantic search over the place index |
//! | [`memory`] | Bounded per-session conversation memory |
//! | [`prompt`] | Grounding-context assembly |
//! | [`generate`] | Grounded generation client (text, stream, JSON) |
//! | [`app`] | Startup arena of loaded artifacts |
//! | [`server`] | JSON HTTP server |

pub mod app;
pub mod artifacts;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod embedding;
pub mod encoder;
pub mod error;
pub mod generate;
pub mod index;
pub mod matcher;
pub mod memory;
pub mod models;
pub mod plan;
pub mod prompt;
pub mod recognize;
pub mod server;
pub mod store;
pub mod translate;
