//! Stored credential decoding
//!
//! Passwords are persisted as `<prefix>base64,<payload>`. The prefix may carry
//! scheme metadata and may itself contain the marker, so the payload always
//! starts after the *last* marker occurrence.
//!
//! ```
//! use hive_rdbc::credential::decode_secret;
//!
//! assert_eq!(decode_secret("prefix:base64,c2VjcmV0").unwrap(), "secret");
//! assert!(decode_secret("c2VjcmV0").is_err());
//! ```

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{Error, Result};

/// Marker separating the stored prefix from the base64 payload
pub const BASE64_MARKER: &str = "base64,";

/// Standard alphabet; trailing padding is optional.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A stored password parsed once at the configuration boundary
#[derive(Clone, PartialEq, Eq)]
pub enum StoredSecret<'a> {
    /// `<prefix>base64,<payload>`
    Base64 {
        /// Everything before the last marker (may be empty)
        prefix: &'a str,
        /// Encoded payload after the last marker
        payload: &'a str,
    },
    /// No marker present
    Plain(&'a str),
}

impl<'a> StoredSecret<'a> {
    /// Split a raw stored password at the last marker occurrence
    pub fn parse(raw: &'a str) -> Self {
        match raw.rfind(BASE64_MARKER) {
            Some(idx) => Self::Base64 {
                prefix: &raw[..idx],
                payload: &raw[idx + BASE64_MARKER.len()..],
            },
            None => Self::Plain(raw),
        }
    }

    /// Scheme tag of this secret
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Base64 { .. } => "base64",
            Self::Plain(_) => "plain",
        }
    }

    /// Decode into the plaintext password.
    ///
    /// Only the base64 form is accepted; a plain value is a missing-marker error.
    pub fn decode(&self) -> Result<String> {
        match self {
            Self::Base64 { payload, .. } => {
                let bytes = STANDARD_LENIENT.decode(payload).map_err(|e| {
                    Error::malformed_credential_with_source("payload is not valid base64", e)
                })?;
                String::from_utf8(bytes).map_err(|e| {
                    Error::malformed_credential_with_source("payload is not valid UTF-8", e)
                })
            }
            Self::Plain(_) => Err(Error::MissingCredentialMarker),
        }
    }
}

impl std::fmt::Debug for StoredSecret<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSecret")
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}

/// Decode the secret embedded in a stored password field
pub fn decode_secret(raw: &str) -> Result<String> {
    StoredSecret::parse(raw).decode()
}
