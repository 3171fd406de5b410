//! Hex digest validation for sample, child, and report hashes.

use crate::data::HashKind;
use crate::errors::CorpusError;
use crate::types::HexDigest;

/// Validate `value` as a `kind` digest and return its upper-cased form.
///
/// Rejects anything that is not exactly `kind.hex_len()` hex characters; the
/// value is never trimmed, truncated, or padded.
pub fn validate_digest(kind: HashKind, value: &str) -> Result<HexDigest, CorpusError> {
    let valid =
        value.len() == kind.hex_len() && value.bytes().all(|byte| byte.is_ascii_hexdigit());
    if !valid {
        return Err(CorpusError::InvalidHash {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value.to_ascii_uppercase())
}

pub fn validate_md5(value: &str) -> Result<HexDigest, CorpusError> {
    validate_digest(HashKind::Md5, value)
}

pub fn validate_sha1(value: &str) -> Result<HexDigest, CorpusError> {
    validate_digest(HashKind::Sha1, value)
}

pub fn validate_sha256(value: &str) -> Result<HexDigest, CorpusError> {
    validate_digest(HashKind::Sha256, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_is_uppercased_and_accepted() {
        let digest = validate_md5("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(digest, "D41D8CD98F00B204E9800998ECF8427E");
        assert_eq!(
            validate_md5("D41D8CD98F00B204E9800998ECF8427E").unwrap(),
            "D41D8CD98F00B204E9800998ECF8427E"
        );
    }

    #[test]
    fn short_or_non_hex_digests_are_rejected() {
        let short = "D41D8CD98F00B204E9800998ECF8427";
        assert!(matches!(
            validate_md5(short),
            Err(CorpusError::InvalidHash {
                kind: HashKind::Md5,
                ..
            })
        ));
        let non_hex = "Z41D8CD98F00B204E9800998ECF8427E";
        assert!(validate_md5(non_hex).is_err());
        assert!(validate_md5("").is_err());
    }

    #[test]
    fn padded_digests_are_not_trimmed() {
        let padded = format!(" {}", "a".repeat(40));
        assert!(validate_sha1(&padded).is_err());
        assert!(validate_sha1(&"a".repeat(40)).is_ok());
    }

    #[test]
    fn sha256_length_is_enforced() {
        assert!(validate_sha256(&"0f".repeat(32)).is_ok());
        assert!(validate_sha256(&"0f".repeat(31)).is_err());
        assert!(validate_sha256(&"0f".repeat(33)).is_err());
    }
}
