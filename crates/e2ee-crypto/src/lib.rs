//! Public-key validation for end-to-end encrypted channels.
//!
//! Clients upload their P-256 public keys; everything here is pure and
//! deterministic so it can run on any request thread.

#![forbid(unsafe_code)]

pub mod point;
pub mod pubkey;
pub mod utils;

pub use point::{
    check_point, encode_uncompressed, validate_point, EcPoint, PointError, FIELD_BYTES,
    UNCOMPRESSED_POINT_LEN, UNCOMPRESSED_TAG,
};
pub use pubkey::{KeyError, PubKey};

#[cfg(test)]
mod proptests;
