use crate::*;
use digest::Digest;
use ed25519_dalek::PublicKey;
use sha2::Sha256;
use std::fmt;

/// Number of bytes of a public key digest kept in a public-key hash
const PUBLIC_KEY_HASH_LENGTH: usize = 20;

/// Encode bytes as padded, URL-safe base64
pub fn encode_b64(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE)
}

/// Decode padded, URL-safe base64
pub fn decode_b64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::decode_config(s, base64::URL_SAFE)
}

/// A base64url-encoded SHA-256 digest
///
/// Protocol identifiers (message ids, LAO / election / roll-call ids, vote ids, transaction ids)
/// are all hashes of an ordered list of strings, see [`Hash::from_strings`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Hash(String);

impl Hash {
    /// Wrap an already-encoded hash
    pub fn new<S: Into<String>>(encoded: S) -> Self {
        Hash(encoded.into())
    }

    /// Hash an ordered list of strings.
    ///
    /// Each element is prefixed with its UTF-8 byte length in decimal so that
    /// `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn from_strings<S: AsRef<str>>(parts: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            let part = part.as_ref();
            hasher.update(part.len().to_string().as_bytes());
            hasher.update(part.as_bytes());
        }
        Hash(encode_b64(&hasher.finalize()))
    }

    /// Truncated digest of a public key, used to address ledger outputs
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = Sha256::digest(public_key.as_bytes());
        Hash(encode_b64(&digest[..PUBLIC_KEY_HASH_LENGTH]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw digest bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        decode_b64(&self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Hash {
    fn from(s: &str) -> Self {
        Hash(s.to_owned())
    }
}
