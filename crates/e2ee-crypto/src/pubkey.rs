//! User public key pairs.
//!
//! A user publishes two independent P-256 points: `encr` for key agreement
//! and `sign` for signatures. The pair is stored and served as JSON with
//! base64 byte fields, e.g. `{"encr":"BGsX…","sign":"BOg2…"}`.

use serde::{Deserialize, Serialize};

use crate::point::{check_point, EcPoint, PointError};

/// Reason a key pair was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid encryption key: {0}")]
    Encr(#[source] PointError),
    #[error("invalid signing key: {0}")]
    Sign(#[source] PointError),
    #[error("encryption and signing keys must differ")]
    Reused,
}

/// A user's public encryption identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    /// Uncompressed encryption point.
    #[serde(default, with = "base64_bytes")]
    pub encr: Vec<u8>,
    /// Uncompressed signing point.
    #[serde(default, with = "base64_bytes")]
    pub sign: Vec<u8>,
}

impl PubKey {
    pub fn new(encr: impl Into<Vec<u8>>, sign: impl Into<Vec<u8>>) -> Self {
        Self {
            encr: encr.into(),
            sign: sign.into(),
        }
    }

    /// Validate both points and make sure one key is not reused for both
    /// roles.
    pub fn check(&self) -> Result<(EcPoint, EcPoint), KeyError> {
        let encr = check_point(&self.encr).map_err(KeyError::Encr)?;
        let sign = check_point(&self.sign).map_err(KeyError::Sign)?;
        if encr == sign {
            return Err(KeyError::Reused);
        }
        Ok((encr, sign))
    }

    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }
}

/// Byte fields as standard base64 strings; `null` reads as empty.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
