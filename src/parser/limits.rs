//! Implementation limits for WebAssembly decoding and execution.
//!
//! Malformed input can claim unrealistic counts (a vector of four billion
//! locals, a block nested a million levels deep). These limits turn such
//! input into a `DecodeError::LimitExceeded` instead of an allocation failure
//! or a native stack overflow.

// =============================================================================
// Function-level limits
// =============================================================================

/// Maximum number of declared local variables in a function (excluding params)
pub const MAX_FUNCTION_LOCALS: u32 = 50_000;

/// Maximum number of function parameters
pub const MAX_FUNCTION_PARAMS: u32 = 1_000;

/// Maximum number of function return values
pub const MAX_FUNCTION_RETURNS: u32 = 1_000;

// =============================================================================
// Instruction-level limits
// =============================================================================

/// Maximum number of labels in a br_table instruction
pub const MAX_BR_TABLE_LABELS: u32 = 65_536;

/// Maximum nesting of block, loop and if
///
/// Decoding a body and laying it out for execution both recurse per nesting
/// level.
pub const MAX_NESTING_DEPTH: usize = 1_024;

// =============================================================================
// Memory limits
// =============================================================================

/// Maximum memory pages for 32-bit addressing (4 GB)
pub const MAX_MEMORY_PAGES: u32 = 65_536;
