//! Stateless media extraction service.
//!
//! Each request runs an external extractor (gallery-dl by default) inside its
//! own temporary workspace, then returns either the tool's metadata or the
//! downloaded files packaged as a single file, a zip archive, a multipart body
//! or a JSON list of base64 payloads.

pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod job;
pub mod metadata;
pub mod packager;
pub mod routes;
pub mod sites;
pub mod workspace;

pub use config::Config;
pub use error::{AppError, JobError};
pub use job::JobRunner;
pub use packager::Mode;
pub use routes::{router, AppState};
pub use workspace::WorkspaceRoot;
