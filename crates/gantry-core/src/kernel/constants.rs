/// Application name
pub const APP_NAME: &str = "gantry";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name used under the XDG data home
pub const DATA_DIR_NAME: &str = "gantry";

/// Fallback data directory when no home directory can be determined
pub const FALLBACK_DATA_DIR: &str = ".gantry";

/// File holding the install records, relative to the data directory
pub const DEFAULT_STORE_FILE: &str = "installed_plugins.json";

/// Manifest location inside a plugin repository
pub const DEFAULT_MANIFEST_PATH: &str = "plugin.toml";

/// Schema version written into the install store document
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Default timeout for resolving a ref, in seconds
pub const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 30;

/// Default timeout for fetching a manifest, in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default bound on concurrent update checks
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;

/// Default git executable
pub const DEFAULT_GIT_BINARY: &str = "git";

/// Number of commit characters shown in listings
pub const SHORT_COMMIT_LEN: usize = 7;

/// Environment variable overriding the data directory
pub const ENV_DATA_DIR: &str = "GANTRY_DATA_DIR";

/// Environment variable overriding the resolve timeout
pub const ENV_RESOLVE_TIMEOUT_SECS: &str = "GANTRY_RESOLVE_TIMEOUT_SECS";

/// Environment variable overriding the update-check concurrency
pub const ENV_MAX_CONCURRENT_CHECKS: &str = "GANTRY_MAX_CONCURRENT_CHECKS";
