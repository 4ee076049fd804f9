//! # docrag
//!
//! Retrieval core for document question answering.
//!
//! Documents are split into overlapping character windows, embedded through
//! a pluggable provider, and stored in a vector index that answers
//! nearest-neighbour queries by cosine distance. Ranked chunks come back with
//! their source file and position so an answer can cite them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │ Extract  │──▶│  Chunk   │──▶│ Embedding │──▶│ VectorIndex │
//! │ PDF/TXT  │   │ windows  │   │ provider  │   │ (+ SQLite)  │
//! └──────────┘   └──────────┘   └───────────┘   └──────┬──────┘
//!                                                      │
//!                        query ──▶ embed ──▶ search ◀──┘
//!                                              │
//!                                              ▼
//!                                     ranked chunks + context
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docrag init                          # create database
//! docrag ingest ./docs                 # chunk + embed + index PDF/TXT files
//! docrag query "how do I rotate keys"  # ranked chunks
//! docrag stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index with persistence hook |
//! | [`store`] | Record persistence (memory, SQLite) |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Retrieval pipeline |
//! | [`context`] | Cited context assembly |
//! | [`extract`] | PDF / TXT text extraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod store;
