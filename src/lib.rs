//! Imob Lead API Library
//!
//! Core functionality for the real-estate lead intake and scoring
//! service: WhatsApp webhook and web-form ingestion, deterministic
//! lead scoring, Postgres persistence, and the HTTP surface.
//!
//! # Modules
//!
//! - `audit`: Ingestion audit trail types and payload digests.
//! - `config`: Configuration management.
//! - `contact`: Phone normalization and email validation.
//! - `db`: Database connection, pool, and schema bootstrap.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and shared state.
//! - `ingest`: WhatsApp and web-form intake pipelines.
//! - `memory_store`: In-memory store for tests and local runs.
//! - `models`: Core data models.
//! - `pg_store`: Postgres store implementation.
//! - `router`: Route and middleware assembly.
//! - `scoring`: The lead scoring rule engine.
//! - `store`: Storage traits the handlers talk to.
//! - `webhook_handler`: WhatsApp webhook handler.
//! - `whatsapp_models`: Flexible webhook payload models.

pub mod audit;
pub mod config;
pub mod contact;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod ingest;
pub mod memory_store;
pub mod models;
pub mod pg_store;
pub mod router;
pub mod scoring;
pub mod store;
pub mod webhook_handler;
pub mod whatsapp_models;
