//! Shared constants: file extensions, cache layout, defaults.

/// Extension of ordinary source files.
pub const SOURCE_EXTENSION: &str = "wf";

/// Extension of declaration-only files indexed in bulk.
pub const DECLARATION_EXTENSION: &str = "d";

/// Directory (relative to the cache root) holding index shards.
pub const INDEX_DIR: &str = "index";

/// Extension of a serialized index shard.
pub const SHARD_EXTENSION: &str = "idx";

/// Name of the validity marker written next to the shard directory.
pub const VALID_MARKER_FILE: &str = "valid.txt";

/// Separator between segments of a package name.
pub const PACKAGE_SEPARATOR: char = '.';

/// Package name used when a file declares none.
pub const DEFAULT_PACKAGE: &str = "default";

/// Default number of compiler instances kept alive.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Default number of files analyzed at the same time.
pub const DEFAULT_MAX_CONCURRENT_ANALYSES: usize = 1;

/// Version of a document the store has never seen.
pub const UNKNOWN_VERSION: i64 = -1;
