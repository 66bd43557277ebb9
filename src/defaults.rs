//! Shared defaults for the route worker.

/// Geocoding requests in flight at once within a single optimization request
pub const DEFAULT_GEOCODE_CONCURRENCY: usize = 8;

/// Reject optimization requests with more resolved stops than this
pub const DEFAULT_MATRIX_MAX_LOCATIONS: usize = 120;

/// Sub-matrix edge length when chunking large matrix requests
pub const MATRIX_CHUNK_SIZE: usize = 25;

/// Extra attempts after the first failed matrix provider call
pub const MATRIX_RETRY_ATTEMPTS: u32 = 2;

/// Base delay for matrix retry backoff (doubles per attempt)
pub const MATRIX_RETRY_BASE_DELAY_MS: u64 = 500;
