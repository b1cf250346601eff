//! # kb-sync
//!
//! Provision a managed vector store and keep a Bedrock knowledge base in
//! sync with the documents in an S3 bucket.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌────────────────┐   ┌───────────┐
//! │ identity │──▶│ collection │──▶│  index  │──▶│ knowledge base │──▶│ ingestion │
//! │   (STS)  │   │   (AOSS)   │   │ (AOSS)  │   │ + data source  │   │  polling  │
//! └──────────┘   └────────────┘   └─────────┘   └────────────────┘   └─────┬─────┘
//!                                                                          ▼
//!                                                                   ┌─────────────┐
//!                                                                   │ run record  │
//!                                                                   └─────────────┘
//! ```
//!
//! The workflow itself lives in `kb-sync-core`; this crate supplies the
//! configuration, the signed AWS clients, and the `kbsync` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! kbsync names                  # show derived resource names
//! kbsync identity               # check credentials
//! kbsync sync --dry-run         # print the plan
//! kbsync sync                   # provision, ingest, record
//! kbsync query "how do I deploy a pipeline?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`aws`] | SigV4 signing and per-service HTTP clients |
//! | [`clients`] | Client factory injected into the workflow |
//! | [`sink`] | Run metadata sinks (log, JSON lines) |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`names`] | `kbsync names` |
//! | [`identity`] | `kbsync identity` |
//! | [`provision`] | `kbsync provision` |
//! | [`sync`] | `kbsync sync` |
//! | [`query`] | `kbsync query` |

pub mod aws;
pub mod clients;
pub mod config;
pub mod identity;
pub mod names;
pub mod progress;
pub mod provision;
pub mod query;
pub mod sink;
pub mod sync;
