// Base64url serde helpers for key material.
use crate::hash::{decode_b64, encode_b64};
use ed25519_dalek::PublicKey;
use ed25519_dalek::Signature;
use serde::{de, Deserialize, Deserializer, Serializer};
use std::convert::TryFrom;

/// Parse a base64url-encoded ed25519 public key
pub fn public_key_from_b64(s: &str) -> Result<PublicKey, String> {
    let bytes = decode_b64(s).map_err(|e| format!("{}", e))?;
    PublicKey::from_bytes(&bytes).map_err(|e| format!("{}", e))
}

/// Parse a base64url-encoded ed25519 signature
pub fn signature_from_b64(s: &str) -> Result<Signature, String> {
    let bytes = decode_b64(s).map_err(|e| format!("{}", e))?;
    Signature::try_from(&bytes[..]).map_err(|e| format!("{}", e))
}

pub fn public_key_to_b64(public_key: &PublicKey) -> String {
    encode_b64(public_key.as_bytes())
}

pub fn signature_to_b64(signature: &Signature) -> String {
    encode_b64(&signature.to_bytes())
}

// a single-purpose type for use in `#[serde(with)]`
pub enum EdPublicKeyB64 {}

impl EdPublicKeyB64 {
    pub fn serialize<S: Serializer>(public_key: &PublicKey, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&public_key_to_b64(public_key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        let s = String::deserialize(d)?;
        public_key_from_b64(&s).map_err(de::Error::custom)
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum EdSignatureB64 {}

impl EdSignatureB64 {
    pub fn serialize<S: Serializer>(sig: &Signature, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&signature_to_b64(sig))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Signature, D::Error> {
        let s = String::deserialize(d)?;
        signature_from_b64(&s).map_err(de::Error::custom)
    }
}

// a single-purpose type for use in `#[serde(with)]` on lists of keys
pub enum EdPublicKeyListB64 {}

impl EdPublicKeyListB64 {
    pub fn serialize<S: Serializer>(keys: &[PublicKey], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(keys.iter().map(public_key_to_b64))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<PublicKey>, D::Error> {
        let encoded = Vec::<String>::deserialize(d)?;
        encoded
            .iter()
            .map(|s| public_key_from_b64(s).map_err(de::Error::custom))
            .collect()
    }
}
