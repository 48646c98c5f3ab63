//! Constant-time comparison helpers.
//!
//! Public keys are not secret, but comparing them without a data-dependent
//! early exit keeps validation timing independent of where two keys differ.

use constant_time_eq::constant_time_eq;

/// Compare two fixed-size arrays in constant time.
///
/// ```rust
/// use e2ee_crypto::utils::constant_time_compare_array;
///
/// assert!(constant_time_compare_array(b"encr", b"encr"));
/// assert!(!constant_time_compare_array(b"encr", b"sign"));
/// ```
pub fn constant_time_compare_array<const N: usize>(a: &[u8; N], b: &[u8; N]) -> bool {
    constant_time_eq(a, b)
}
