//! # kb-sync core
//!
//! Provisioning and synchronization logic for a managed RAG knowledge base:
//! data models, the cloud service traits, an in-memory backend, naming,
//! retry, and the staged workflow.
//!
//! This crate performs no HTTP or filesystem I/O. The `kb-sync` crate
//! supplies the AWS clients, configuration, and the CLI.

pub mod cloud;
pub mod error;
pub mod ingest;
pub mod models;
pub mod naming;
pub mod provision;
pub mod retry;
pub mod workflow;
