//! Transfer constants (timeouts, buffer sizes, pacing defaults).

use std::time::Duration;

/// Connect timeout for document downloads.
pub const DOWNLOAD_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Total timeout for document downloads (labels can be tens of megabytes).
pub const DOWNLOAD_READ_TIMEOUT_SECS: u64 = 300;

/// Connect timeout for portal page requests.
pub const PORTAL_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout for portal page requests.
pub const PORTAL_READ_TIMEOUT_SECS: u64 = 30;

/// Buffer between the response stream and the temp file.
pub const WRITE_BUFFER_BYTES: usize = 64 * 1024;

/// Default minimum spacing between requests to one host.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 250;

/// Maximum Retry-After value honoured (1 hour).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
