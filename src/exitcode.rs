//! Standard exit codes (BSD sysexits.h compatible)

/// Query answered but found nothing usable (ambiguous or invalid prefix)
pub const UNRESOLVED: i32 = 2;

/// Command line usage error
pub const USAGE: i32 = 64;

/// Data format error (schema violations)
pub const DATAERR: i32 = 65;

/// Cannot open input
pub const NOINPUT: i32 = 66;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error
pub const CONFIG: i32 = 78;
