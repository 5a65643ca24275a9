//! Relations for AI-generated tools, projected as a virtual filesystem.
//!
//! relfs records what agents create as typed relations with open property
//! bags, and serves them over [MCP](https://modelcontextprotocol.io/) as a
//! browsable tree. Four relation types are known:
//!
//! | Type | Key | Appears under |
//! |------|-----|---------------|
//! | **Tool** | `name` | `/tools/...`, `/commands/`, `/by-date/` |
//! | **Artifact** | `name` | `/artifacts/<kind>/`, `/by-date/` |
//! | **URLArtifact** | `url` | `/artifacts/urls/`, `/by-date/` |
//! | **MemorySession** | `session_id` | `/memory/`, `/by-agent/`, `/by-date/` |
//!
//! # Architecture
//!
//! - **Storage**: SQLite holds one row per relation plus an audit log; content
//!   bytes live in a SHA-256 addressed object directory
//! - **Indexes**: the path index and the keyword search index are in memory and
//!   rebuilt from the relations at startup
//! - **Rules**: data-driven spawn rules (TOML) declare follow-up relations,
//!   such as a viewer for an analysis tool
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP/SSE
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations and health checks
//! - [`engine`]: the shared state and the declare pipeline
//! - [`relations`], [`paths`], [`rules`], [`search`], [`vfs`]: the pieces the engine drives

pub mod config;
pub mod content;
pub mod db;
pub mod engine;
pub mod error;
pub mod paths;
pub mod relations;
pub mod rules;
pub mod search;
pub mod server;
pub mod tools;
pub mod vfs;

pub use error::{Error, Result, StorageError, ValidationError};
