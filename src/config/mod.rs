// ============================================
// TANZU CLI - Client Configuration
// ============================================

mod lock;
mod settings;

pub use lock::{lock_path, ConfigLock, DEFAULT_LOCK_TIMEOUT};
pub use settings::{
    CliOptions, ClientConfig, ClientOptions, DiscoverySource, GcpRepositoryConfig,
    LocalDiscovery, LocalRepositoryConfig, OciDiscovery, PluginRepository, Server, ServerType,
    VersionSelectorLevel, CONFIG_ENV, UNSTABLE_VERSIONS_PATH,
};
