//! OpenPGP key-server index parsing and armored key extraction.
//!
//! Handles the machine-readable HKP index format (`options=mr`):
//!
//! ```text
//! info:1:2
//! pub:<keyid>:<algo>:<keylen>:<created>:<expires>:<flags>
//! uid:<escaped uid>:<created>:<expires>:<flags>
//! ```
//!
//! Only `pub` lines are interpreted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

const ARMOR_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const ARMOR_FOOTER: &str = "-----END PGP PUBLIC KEY BLOCK-----";

/// Characters of a key id kept by [`short_key_id`].
pub const SHORT_KEY_ID_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum GpgError {
    #[error("no valid key found")]
    NoValidKey,

    #[error("invalid format")]
    InvalidFormat,

    #[error("key server request failed: {0}")]
    Http(String),

    #[error("key server returned status {0}")]
    Status(u16),
}

/// OpenPGP public-key algorithm ids (RFC 2440 section 9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PublicKeyAlgorithm {
    RsaEncryptOrSign,
    RsaEncrypt,
    RsaSign,
    ElGamalEncrypt,
    Dsa,
    Ec,
    Ecdsa,
    ElGamalEncryptOrSign,
    Dh,
}

impl PublicKeyAlgorithm {
    pub fn from_id(id: u32) -> Option<Self> {
        Some(match id {
            1 => Self::RsaEncryptOrSign,
            2 => Self::RsaEncrypt,
            3 => Self::RsaSign,
            16 => Self::ElGamalEncrypt,
            17 => Self::Dsa,
            18 => Self::Ec,
            19 => Self::Ecdsa,
            20 => Self::ElGamalEncryptOrSign,
            21 => Self::Dh,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RsaEncryptOrSign => "RSAEncryptOrSign",
            Self::RsaEncrypt => "RSAEncrypt",
            Self::RsaSign => "RSASign",
            Self::ElGamalEncrypt => "ElGamalEncrypt",
            Self::Dsa => "DSA",
            Self::Ec => "EC",
            Self::Ecdsa => "ECDSA",
            Self::ElGamalEncryptOrSign => "ElGamalEncryptOrSign",
            Self::Dh => "DH",
        }
    }
}

/// One `pub` record of an index listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyListing {
    pub key_id: String,
    /// `None` when the id is missing or not in the known table.
    pub algorithm: Option<PublicKeyAlgorithm>,
    pub key_len: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub disabled: bool,
    pub expired: bool,
}

impl KeyListing {
    /// Neither revoked, disabled nor expired.
    pub fn is_usable(&self) -> bool {
        !(self.revoked || self.disabled || self.expired)
    }

    /// Trailing characters of the key id, as used in `0x`-prefixed lookups.
    pub fn short_key_id(&self) -> &str {
        short_key_id(&self.key_id)
    }

    fn flags(&self) -> String {
        let mut flags = String::new();
        if self.revoked {
            flags.push('r');
        }
        if self.disabled {
            flags.push('d');
        }
        if self.expired {
            flags.push('e');
        }
        flags
    }
}

impl fmt::Display for KeyListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithm = self.algorithm.map_or("unknown", PublicKeyAlgorithm::name);
        write!(f, "{} [{}:{}]", self.key_id, algorithm, self.key_len.unwrap_or(0))?;
        if let Some(created) = self.created_at {
            write!(f, " created {}", created.to_rfc3339())?;
        }
        if let Some(expires) = self.expires_at {
            write!(f, " expires {}", expires.to_rfc3339())?;
        }
        let flags = self.flags();
        if !flags.is_empty() {
            write!(f, " {flags}")?;
        }
        Ok(())
    }
}

/// Last [`SHORT_KEY_ID_LEN`] characters of `key_id`, or all of it when shorter.
pub fn short_key_id(key_id: &str) -> &str {
    let start = key_id.len().saturating_sub(SHORT_KEY_ID_LEN);
    key_id.get(start..).unwrap_or(key_id)
}

fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    field
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Parse `pub` records from a machine-readable index.
///
/// Lines that are not `pub` records with exactly seven fields are skipped.
/// Unparseable numeric fields are left unset.
pub fn parse_machine_readable_index(body: &str) -> Vec<KeyListing> {
    body.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim().split(':').collect();
            if fields.len() != 7 || fields[0] != "pub" {
                return None;
            }
            let flags = fields[6];
            Some(KeyListing {
                key_id: fields[1].to_string(),
                algorithm: fields[2].parse().ok().and_then(PublicKeyAlgorithm::from_id),
                key_len: fields[3].parse().ok(),
                created_at: parse_timestamp(fields[4]),
                expires_at: parse_timestamp(fields[5]),
                revoked: flags.contains('r'),
                disabled: flags.contains('d'),
                expired: flags.contains('e'),
            })
        })
        .collect()
}

/// Key id of the first usable record in listing order.
pub fn first_usable_key_id(listings: &[KeyListing]) -> Result<&str, GpgError> {
    listings
        .iter()
        .find(|listing| listing.is_usable())
        .map(|listing| listing.key_id.as_str())
        .ok_or(GpgError::NoValidKey)
}

/// Extract the armored public key block, dropping anything around it.
pub fn sanitize_public_key(text: &str) -> Result<String, GpgError> {
    let start = text.find(ARMOR_HEADER).ok_or(GpgError::InvalidFormat)?;
    let body_start = start + ARMOR_HEADER.len();
    let footer = text[body_start..]
        .find(ARMOR_FOOTER)
        .ok_or(GpgError::InvalidFormat)?;
    let end = body_start + footer + ARMOR_FOOTER.len();
    Ok(text[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "
info:1:3
pub:79885E33920840DA65EEE2013F3519E42C47C59D:1:2048:1567427747::r
uid:Roger <roger@example.com>
pub:F407961CACD217A1C246F0C286B4406B454ABAC4:1:4096:1611760459::
uid:Roger <roger@example.com>
pub:AD353BC4362B6F73870660B1F59254FCF963F61C:1:3072:1611758351::r
uid:Roger <roger@example.com>
";

    #[test]
    fn test_parse_index() {
        let listings = parse_machine_readable_index(INDEX);
        assert_eq!(listings.len(), 3);

        let second = &listings[1];
        assert_eq!(second.key_id, "F407961CACD217A1C246F0C286B4406B454ABAC4");
        assert_eq!(second.algorithm, Some(PublicKeyAlgorithm::RsaEncryptOrSign));
        assert_eq!(second.key_len, Some(4096));
        assert_eq!(second.created_at.map(|t| t.timestamp()), Some(1611760459));
        assert_eq!(second.expires_at, None);
        assert!(second.is_usable());

        assert!(listings[0].revoked);
        assert!(!listings[0].is_usable());
    }

    #[test]
    fn test_first_usable() {
        let listings = parse_machine_readable_index(INDEX);
        assert_eq!(
            first_usable_key_id(&listings).unwrap(),
            "F407961CACD217A1C246F0C286B4406B454ABAC4"
        );
    }

    #[test]
    fn test_malformed_records_skipped() {
        let listings = parse_machine_readable_index("pub:1:2048:1567427747::r\nuid:x\n");
        assert!(listings.is_empty());
        assert!(matches!(
            first_usable_key_id(&listings),
            Err(GpgError::NoValidKey)
        ));
    }

    #[test]
    fn test_flags_and_unknown_algorithm() {
        let listings = parse_machine_readable_index(
            "pub:AAAA:99:x:::rd\r\npub:BBBB:18:256:::e\npub:CCCC:19:256:::d\n",
        );
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].algorithm, None);
        assert_eq!(listings[0].key_len, None);
        assert!(listings[0].revoked && listings[0].disabled);
        assert!(listings[1].expired);
        assert_eq!(listings[1].algorithm, Some(PublicKeyAlgorithm::Ec));
        assert!(listings[2].disabled);
        assert!(first_usable_key_id(&listings).is_err());
    }

    #[test]
    fn test_short_key_id() {
        let listing = KeyListing {
            key_id: "F407961CACD217A1C246F0C286B4406B454ABAC4".into(),
            ..Default::default()
        };
        assert_eq!(listing.short_key_id(), "454ABAC4");

        let short = KeyListing {
            key_id: "ABC".into(),
            ..Default::default()
        };
        assert_eq!(short.short_key_id(), "ABC");
        assert_eq!(short_key_id("0123456789ABCDEF"), "89ABCDEF");
        assert_eq!(short_key_id(""), "");
    }

    #[test]
    fn test_display() {
        let listings = parse_machine_readable_index(INDEX);
        let text = listings[0].to_string();
        assert!(text.starts_with("79885E33920840DA65EEE2013F3519E42C47C59D [RSAEncryptOrSign:2048]"));
        assert!(text.ends_with(" r"));
    }

    #[test]
    fn test_sanitize() {
        let raw = format!("<html><pre>{ARMOR_HEADER}\nmQENBF\n{ARMOR_FOOTER}</pre></html>");
        assert_eq!(
            sanitize_public_key(&raw).unwrap(),
            format!("{ARMOR_HEADER}\nmQENBF\n{ARMOR_FOOTER}")
        );
    }

    #[test]
    fn test_sanitize_invalid() {
        assert!(matches!(
            sanitize_public_key("no key here"),
            Err(GpgError::InvalidFormat)
        ));
        assert!(matches!(
            sanitize_public_key(&format!("{ARMOR_HEADER}\nmQENBF\n")),
            Err(GpgError::InvalidFormat)
        ));
        // Footer before header does not count.
        assert!(matches!(
            sanitize_public_key(&format!("{ARMOR_FOOTER}\n{ARMOR_HEADER}")),
            Err(GpgError::InvalidFormat)
        ));
    }
}
