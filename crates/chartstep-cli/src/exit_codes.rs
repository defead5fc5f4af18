//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - schema, client version or credentials rejected
pub const VALIDATION_ERROR: i32 = 2;

/// Protocol error - malformed payload or wrong step count
pub const PROTOCOL_ERROR: i32 = 3;

/// Command error - the chart tool or kubectl failed or could not start
pub const COMMAND_ERROR: i32 = 4;

/// IO error - stdin unreadable, stdout closed, etc.
pub const IO_ERROR: i32 = 5;

/// Output error - an output value could not be read or written
pub const OUTPUT_ERROR: i32 = 6;
