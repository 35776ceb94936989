//! # docvault
//!
//! A semantically-indexed document mirror. docvault pulls documents from
//! multiple content sources (the GitHub REST API and a local filesystem)
//! into a durable SQLite store with SHA-keyed change detection, generates
//! embeddings for them in batches, and serves similarity search through a
//! cached query path.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐   ┌───────────┐
//! │  Adapters   │──▶│    Sync      │──▶│  SQLite   │──▶│  Indexer  │
//! │ GitHub / FS │   │ Orchestrator │   │ documents │   │ (vectors) │
//! └─────────────┘   └──────────────┘   └─────┬─────┘   └───────────┘
//!                                            │
//!                            ┌───────────────┤
//!                            ▼               ▼
//!                      ┌──────────┐    ┌──────────┐
//!                      │  Cache   │◀──▶│  Search  │
//!                      │  (TTL)   │    │ Service  │
//!                      └──────────┘    └──────────┘
//! ```
//!
//! Data flows one direction: adapter → sync → store → indexer → vectors.
//! At query time the search service checks the cache, embeds the query on
//! a miss, ranks against the store, and populates the cache. Writes
//! invalidate the cache namespaces they make stale.
//!
//! ## Quick Start
//!
//! ```bash
//! vault init                          # create database
//! vault sync github:acme/platform    # mirror a repository
//! vault sync local                   # ingest the local workspace
//! vault index                        # embed unindexed documents
//! vault search "deployment runbook"
//! vault status                       # per-repository sync status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`adapter`] | Source adapter trait |
//! | [`connector_github`] | GitHub tree adapter |
//! | [`connector_local`] | Local filesystem adapter |
//! | [`sync`] | Sync orchestration |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`indexer`] | Batched embedding indexing |
//! | [`cache`] | TTL cache with prefix invalidation |
//! | [`search`] | Cached similarity search |
//! | [`store`] | SQLite document store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod adapter;
pub mod cache;
pub mod config;
pub mod connector_github;
pub mod connector_local;
pub mod db;
pub mod embedding;
pub mod indexer;
pub mod migrate;
pub mod models;
pub mod search;
pub mod store;
pub mod sync;
