//! ElGamal encryption on the edwards25519 curve, used to hide secret-ballot vote indices.
//!
//! A short message (at most 29 bytes) is embedded into a curve point: the first byte of the
//! compressed encoding holds the message length, the message follows, and the remaining bytes are
//! random. Embedding retries with fresh random bytes until the encoding is a valid, torsion-free
//! point.
//!
//! A ciphertext is `K || C`, two compressed points where `K = k·B` and `C = k·Y + M` for the
//! election key `Y`.

use crate::*;
use curve25519_dalek::constants;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Length of a compressed point
pub const POINT_LENGTH: usize = 32;

/// Length of a ciphertext
pub const CIPHERTEXT_LENGTH: usize = 2 * POINT_LENGTH;

/// Maximum number of bytes that can be embedded into a point
pub const MAX_MESSAGE_LENGTH: usize = 29;

/// The public key of a secret-ballot election
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionPublicKey(EdwardsPoint);

impl ElectionPublicKey {
    pub fn to_bytes(&self) -> [u8; POINT_LENGTH] {
        self.0.compress().to_bytes()
    }

    /// Returns None if the bytes are not a valid point
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        decompress(bytes).map(ElectionPublicKey)
    }

    pub fn to_b64(&self) -> String {
        encode_b64(&self.to_bytes())
    }

    pub fn from_b64(encoded: &str) -> Result<Self, Error> {
        let bytes = decode_b64(encoded)?;
        ElectionPublicKey::from_bytes(&bytes)
            .ok_or_else(|| Error::InvalidElectionKey(encoded.to_owned()))
    }

    /// Encrypt a message of at most `MAX_MESSAGE_LENGTH` bytes
    pub fn encrypt(&self, msg: &[u8]) -> Result<Vec<u8>, Error> {
        let m = embed(msg)?;
        let k = Scalar::random(&mut OsRng);
        let big_k = &k * &constants::ED25519_BASEPOINT_TABLE;
        let c = self.0 * k + m;

        let mut cipher_text = Vec::with_capacity(CIPHERTEXT_LENGTH);
        cipher_text.extend(big_k.compress().as_bytes().iter());
        cipher_text.extend(c.compress().as_bytes().iter());
        Ok(cipher_text)
    }
}

impl Serialize for ElectionPublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for ElectionPublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ElectionPublicKey::from_b64(&s).map_err(de::Error::custom)
    }
}

/// The secret key of a secret-ballot election
#[derive(Clone)]
pub struct ElectionSecretKey(Scalar);

impl ElectionSecretKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Returns None for non-canonical scalars
    pub fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        Scalar::from_canonical_bytes(bytes).map(ElectionSecretKey)
    }

    pub fn public_key(&self) -> ElectionPublicKey {
        ElectionPublicKey(&self.0 * &constants::ED25519_BASEPOINT_TABLE)
    }

    /// Decrypt a `K || C` ciphertext
    pub fn decrypt(&self, cipher_text: &[u8]) -> Result<Vec<u8>, Error> {
        if cipher_text.len() != CIPHERTEXT_LENGTH {
            return Err(Error::InvalidCiphertext);
        }
        let big_k = decompress(&cipher_text[..POINT_LENGTH]).ok_or(Error::InvalidCiphertext)?;
        let c = decompress(&cipher_text[POINT_LENGTH..]).ok_or(Error::InvalidCiphertext)?;

        let m = c - big_k * self.0;
        extract(&m)
    }
}

/// An election key pair, held by the tallying authority
#[derive(Clone)]
pub struct ElectionKeyPair {
    pub public: ElectionPublicKey,
    pub secret: ElectionSecretKey,
}

impl ElectionKeyPair {
    pub fn generate() -> Self {
        let secret = ElectionSecretKey(Scalar::random(&mut OsRng));
        ElectionKeyPair {
            public: secret.public_key(),
            secret,
        }
    }
}

fn decompress(bytes: &[u8]) -> Option<EdwardsPoint> {
    if bytes.len() != POINT_LENGTH {
        return None;
    }
    CompressedEdwardsY::from_slice(bytes).decompress()
}

fn embed(msg: &[u8]) -> Result<EdwardsPoint, Error> {
    if msg.len() > MAX_MESSAGE_LENGTH {
        return Err(Error::MessageTooLong(msg.len()));
    }

    let mut rng = OsRng;
    loop {
        let mut bytes = [0u8; POINT_LENGTH];
        rng.fill_bytes(&mut bytes);
        bytes[0] = msg.len() as u8;
        bytes[1..1 + msg.len()].copy_from_slice(msg);

        if let Some(point) = CompressedEdwardsY(bytes).decompress() {
            if point.is_torsion_free() {
                return Ok(point);
            }
        }
    }
}

fn extract(point: &EdwardsPoint) -> Result<Vec<u8>, Error> {
    let bytes = point.compress().to_bytes();
    let len = bytes[0] as usize;
    if len > MAX_MESSAGE_LENGTH {
        return Err(Error::InvalidCiphertext);
    }
    Ok(bytes[1..1 + len].to_vec())
}
