//! Fixed sizes and defaults shared across subsystems.

use std::time::Duration;

/// Chunk size for every socket read and relay copy.
pub const MAX_BYTES: usize = 4096;

/// Default size of the admission permit pool.
pub const MAX_CLIENTS: usize = 400;

/// Default cap on the aggregate size of all cache entries.
pub const MAX_SIZE: usize = 200 * (1 << 20);

/// Default cap on the size of a single cache entry.
pub const MAX_ELEMENT_SIZE: usize = 10 * (1 << 20);

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ORIGIN_PORT: u16 = 80;
pub const DEFAULT_TUNNEL_PORT: u16 = 443;

/// Longest request line buffered from a client, terminator included.
pub const MAX_REQUEST_LINE_LENGTH: usize = 1 << 20;

/// Longest CONNECT header line accepted, terminator included.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// CONNECT header lines consumed before the tunnel request is rejected.
pub const MAX_HEADER_LINES: usize = 100;

/// How long a served GET connection keeps reading client bytes it will
/// never use before it is dropped.
pub const CLIENT_LINGER: Duration = Duration::from_secs(2);
