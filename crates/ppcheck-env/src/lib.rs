//! ppcheck-env: Toolchain Environments for ppcheck
//!
//! This crate owns the isolated environments the pretty-printer tests run
//! in. Each LLVM version gets its own Docker image, built from a single
//! Dockerfile and labelled with the sha256 of that Dockerfile so later runs
//! can reuse it until the definition changes.
//!
//! ## Layers
//!
//! - [`fingerprint`]: content hash of the environment definition
//! - [`runtime`]: the [`ContainerRuntime`] seam and its Docker implementation
//! - [`cache`]: build-or-reuse decisions per [`ToolchainVersion`]

pub mod cache;
pub mod error;
pub mod fakes;
pub mod fingerprint;
pub mod runtime;
pub mod version;

pub use cache::{CacheSettings, EnvironmentCache, EnvironmentRecord, DEFINITION_HASH_LABEL};
pub use error::EnvError;
pub use fingerprint::{fingerprint_definition, DefinitionHash};
pub use runtime::{BuildRequest, CommandOutput, ContainerRuntime, DockerRuntime, Mount, RunRequest};
pub use version::{default_versions, is_safe_token, ToolchainVersion, DEFAULT_VERSIONS};

/// Result type for environment operations
pub type Result<T> = std::result::Result<T, EnvError>;
