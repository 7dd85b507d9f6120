#![deny(missing_docs)]

//! Core library for the semsync CMS search service.

/// HTTP routing and REST handlers.
pub mod api;
/// Headless CMS read-API client.
pub mod cms;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and provider adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Indexing and search activity counters.
pub mod metrics;
/// File-persisted local mirror of indexed vectors.
pub mod mirror;
/// Managed vector index integration.
pub mod pinecone;
/// Entry processing pipeline and sync orchestration.
pub mod processing;
/// Webhook verification and event normalization.
pub mod webhook;
