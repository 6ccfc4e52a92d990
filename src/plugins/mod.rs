// ============================================
// TANZU CLI - Plugin System
// ============================================

//! Plugin distribution: repositories publish versioned binaries, the
//! catalog installs them locally and the runner executes them.

pub mod arch;
pub mod catalog;
pub mod descriptor;
pub mod manifest;
pub mod multi_repo;
pub mod query;
pub mod repository;
pub mod runner;
pub mod version;

pub use arch::Arch;
pub use catalog::{Catalog, CORE_NAME, DEFAULT_DISTRO};
pub use descriptor::PluginDescriptor;
pub use manifest::{Manifest, Plugin};
pub use multi_repo::{has_plugin_update, MultiRepo};
pub use query::{ExecQuery, PluginQuery, INFO_COMMAND, POST_INSTALL_COMMAND};
pub use repository::{
    load_repositories, load_repository, GcpBucketRepository, GcpRepositoryOptions, LocalRepository,
    Repository, ALL_PLUGINS, VERSION_LATEST,
};
pub use runner::Runner;
pub use version::VersionSelector;
