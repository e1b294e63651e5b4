//! Default configuration values

/// Build tag used when none is configured
pub const DEFAULT_BUILD_TAG: &str = "fedora-build";

/// Tag searched for source builds of missing dependencies
pub const DEFAULT_SOURCE_TAG: &str = "rawhide";

/// Name of the koji client binary
pub const KOJI_BINARY: &str = "koji";

/// Deadline for a blocking build submission (in seconds)
pub const BUILD_TIMEOUT: u64 = 3600; // 1 hour

/// Deadline for short hub calls (in seconds)
pub const CALL_TIMEOUT: u64 = 60;

/// Deadline for a repository regeneration wait (in seconds)
pub const REPO_TIMEOUT: u64 = 1800;

/// Extra time the client process gets beyond the repo wait itself
pub const REPO_TIMEOUT_GRACE: u64 = 60;

/// Interval between task status polls (in seconds)
pub const POLL_INTERVAL: u64 = 30;

/// Deadline for fetching one SRPM from the source hub (in seconds)
pub const DOWNLOAD_TIMEOUT: u64 = 300;

/// Deadline for `rpmbuild -bs` (in seconds)
pub const RPMBUILD_TIMEOUT: u64 = 300;

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Koji client configuration files, in order of precedence
pub const KOJI_CONFIG_FILES: &[&str] = &["/etc/koji.conf", "~/.koji/config"];
