//! Uncompressed NIST P-256 point validation.
//!
//! Public keys arrive from clients as raw SEC1 bytes and are later fed into
//! key agreement by other members of a channel. A crafted point (off the
//! curve, or with small order) can leak bits of the peer's secret during
//! ECDH, so every check below is mandatory and runs in this order:
//!
//! 1. exact length `2 * FIELD_BYTES + 1`
//! 2. uncompressed tag `0x04`
//! 3. neither coordinate is zero
//! 4. both coordinates are below the group order `N`
//! 5. the point satisfies the curve equation
//! 6. `[N]P` is the identity
//!
//! See <https://neilmadden.blog/2017/05/17/so-how-do-you-validate-nist-ecdh-public-keys/>.

use p256::elliptic_curve::bigint::U256;
use p256::elliptic_curve::sec1::FromEncodedPoint;
use p256::elliptic_curve::Curve;
use p256::{AffinePoint, EncodedPoint, FieldBytes, NistP256, ProjectivePoint, Scalar};

use crate::utils::constant_time_compare_array;

/// Byte length of one coordinate.
pub const FIELD_BYTES: usize = 32;

/// Byte length of an uncompressed point: `0x04 || x || y`.
pub const UNCOMPRESSED_POINT_LEN: usize = 2 * FIELD_BYTES + 1;

/// SEC1 tag for the uncompressed encoding. Compressed and hybrid forms are
/// not accepted.
pub const UNCOMPRESSED_TAG: u8 = 0x04;

/// Reason a byte buffer was rejected as a public point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PointError {
    #[error("invalid point length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("unsupported point encoding tag 0x{0:02x}")]
    UnsupportedEncoding(u8),
    #[error("point has a zero coordinate")]
    ZeroCoordinate,
    #[error("point coordinate is not below the group order")]
    NonCanonicalCoordinate,
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("point is not in the prime-order subgroup")]
    WrongSubgroup,
}

/// A validated, non-identity point of the P-256 prime-order group.
///
/// Only [`check_point`] and [`validate_point`] construct it, so holding an
/// `EcPoint` means every check above has passed.
#[derive(Clone, Copy, Debug)]
pub struct EcPoint {
    x: [u8; FIELD_BYTES],
    y: [u8; FIELD_BYTES],
}

impl EcPoint {
    /// Big-endian x coordinate.
    pub fn x(&self) -> &[u8; FIELD_BYTES] {
        &self.x
    }

    /// Big-endian y coordinate.
    pub fn y(&self) -> &[u8; FIELD_BYTES] {
        &self.y
    }

    /// Re-encode as `0x04 || x || y`.
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_POINT_LEN] {
        encode_uncompressed(&self.x, &self.y)
    }
}

impl PartialEq for EcPoint {
    fn eq(&self, other: &Self) -> bool {
        // Evaluate both sides so the result does not depend on which
        // coordinate differs.
        let same_x = constant_time_compare_array(&self.x, &other.x);
        let same_y = constant_time_compare_array(&self.y, &other.y);
        same_x & same_y
    }
}

impl Eq for EcPoint {}

/// Encode raw coordinates as an uncompressed SEC1 point.
pub fn encode_uncompressed(
    x: &[u8; FIELD_BYTES],
    y: &[u8; FIELD_BYTES],
) -> [u8; UNCOMPRESSED_POINT_LEN] {
    let mut out = [0u8; UNCOMPRESSED_POINT_LEN];
    out[0] = UNCOMPRESSED_TAG;
    out[1..=FIELD_BYTES].copy_from_slice(x);
    out[1 + FIELD_BYTES..].copy_from_slice(y);
    out
}

/// Validate an uncompressed point, returning `None` on any failure.
pub fn validate_point(data: &[u8]) -> Option<EcPoint> {
    check_point(data).ok()
}

/// Validate an uncompressed point and report which check rejected it.
pub fn check_point(data: &[u8]) -> Result<EcPoint, PointError> {
    if data.len() != UNCOMPRESSED_POINT_LEN {
        return Err(PointError::InvalidLength {
            expected: UNCOMPRESSED_POINT_LEN,
            got: data.len(),
        });
    }
    if data[0] != UNCOMPRESSED_TAG {
        return Err(PointError::UnsupportedEncoding(data[0]));
    }

    let mut x = [0u8; FIELD_BYTES];
    let mut y = [0u8; FIELD_BYTES];
    x.copy_from_slice(&data[1..=FIELD_BYTES]);
    y.copy_from_slice(&data[1 + FIELD_BYTES..]);

    let x_int = U256::from_be_slice(&x);
    let y_int = U256::from_be_slice(&y);

    if x_int == U256::ZERO || y_int == U256::ZERO {
        return Err(PointError::ZeroCoordinate);
    }

    // N < p on P-256, so this is stricter than field-element canonicality.
    if x_int >= NistP256::ORDER || y_int >= NistP256::ORDER {
        return Err(PointError::NonCanonicalCoordinate);
    }

    let encoded = EncodedPoint::from_affine_coordinates(
        &FieldBytes::from(x),
        &FieldBytes::from(y),
        false,
    );
    let affine: AffinePoint = Option::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or(PointError::NotOnCurve)?;

    if !has_group_order(&affine) {
        return Err(PointError::WrongSubgroup);
    }

    Ok(EcPoint { x, y })
}

/// `[N]P == O`.
///
/// Scalars are reduced mod N, so N itself would become zero and the check
/// would be vacuous. Compute `[N-1]P + P` instead.
fn has_group_order(point: &AffinePoint) -> bool {
    let p = ProjectivePoint::from(*point);
    let n_minus_one = -Scalar::ONE;
    p * n_minus_one + p == ProjectivePoint::IDENTITY
}
