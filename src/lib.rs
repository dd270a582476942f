//! Purchase Insights API Library
//!
//! Persists clients, catalog items and purchases, and offers an analysis
//! endpoint that aggregates a client's purchase history and streams commentary
//! from a local Ollama-compatible inference server.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `analysis`: Purchase aggregation and prompt rendering.
//! - `analysis_handler`: Analysis HTTP handlers.
//! - `auth`: Bearer-token middleware.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema bootstrap.
//! - `errors`: Error handling types.
//! - `handlers`: CRUD HTTP handlers and shared state.
//! - `models`: Core data models.
//! - `ollama_client`: Inference server client and streaming relay.
//! - `routes`: Router construction.
//! - `store`: Storage trait and PostgreSQL implementation.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

pub mod analysis;
pub mod analysis_handler;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod ollama_client;
pub mod routes;
pub mod store;
