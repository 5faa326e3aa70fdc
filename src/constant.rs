//! This module contains constants that are needed throughout the codebase.

/// The width of a byte on the EVM (and most other places) in bits.
pub const BYTE_SIZE_BITS: usize = 8;

/// The width of a storage slot on the EVM in bytes.
pub const WORD_SIZE_BYTES: usize = 32;

/// The width of an address (and hence of a contract reference) in bytes.
pub const ADDRESS_WIDTH_BYTES: usize = 20;

/// The width of a bool in bytes.
pub const BOOL_WIDTH_BYTES: usize = 1;

/// The width of an internal function pointer in storage.
pub const INTERNAL_FUNCTION_WIDTH_BYTES: usize = 8;

/// The width of an external function reference, namely an address followed by
/// a four-byte selector.
pub const EXTERNAL_FUNCTION_WIDTH_BYTES: usize = ADDRESS_WIDTH_BYTES + 4;

/// The manifest schema version written by this library.
pub const CURRENT_MANIFEST_VERSION: &str = "3.1";

/// The oldest manifest schema version that can still be read (and migrated).
pub const OLDEST_SUPPORTED_MANIFEST_VERSION: &str = "3.0";

/// The default directory, relative to the working directory, in which the
/// per-network manifests live.
pub const DEFAULT_MANIFEST_DIRECTORY: &str = ".upgrades";

/// The default number of additional attempts made to acquire a manifest lock
/// when it is held by someone else.
pub const DEFAULT_LOCK_RETRIES: usize = 3;

/// The default delay between attempts to acquire a manifest lock.
pub const DEFAULT_LOCK_RETRY_INTERVAL_MS: u64 = 100;

/// The extension appended to a manifest path to name its lock file.
pub const LOCK_FILE_EXTENSION: &str = "lock";

/// The NatSpec tags that mark a state variable as renamed from a previous
/// label.
pub const RENAMED_FROM_TAGS: [&str; 2] = ["@custom:oz-renamed-from", "@custom:renamed-from"];
