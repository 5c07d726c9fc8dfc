use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("popcore: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("popcore: JSON error: {0}")]
    JSONSerialization(#[from] serde_json::Error),

    #[error("popcore: base64 decoding error: {0}")]
    Base64Decoding(#[from] base64::DecodeError),

    #[error("popcore: unsupported message type {0}#{1}")]
    UnsupportedMessage(ObjectType, ActionType),

    #[error("popcore: invalid configuration value for {0}: {1}")]
    InvalidConfig(&'static str, String),

    #[error("popcore: elgamal: message of {0} bytes cannot be embedded (max 29)")]
    MessageTooLong(usize),

    #[error("popcore: elgamal: invalid ciphertext")]
    InvalidCiphertext,

    #[error("popcore: elgamal: invalid election key {0}")]
    InvalidElectionKey(String),

    #[error("popcore: election {0} has the wrong version for this operation")]
    WrongElectionVersion(Hash),

    #[error("popcore: insufficient balance: have {0}, need {1}")]
    InsufficientBalance(u64, u64),

    #[error("popcore: coin values overflow")]
    ValueOverflow,

    #[error("popcore: network error: {0}")]
    Network(String),
}

/// Message validation errors
///
/// Returned for malformed input: the message is dropped at the ingestion boundary.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("popcore validation: invalid field '{0}': {1}")]
    InvalidField(&'static str, String),

    #[error("popcore validation: missing field '{0}'")]
    MissingField(&'static str),

    #[error("popcore validation: 'message_id' does not match data and signature")]
    MessageIdMismatch,

    #[error("popcore validation: 'signature' does not verify against sender")]
    InvalidSignature,

    #[error("popcore validation: witness signature from {0} does not verify")]
    InvalidWitnessSignature(String),

    #[error("popcore validation: unknown message type {0}#{1}")]
    UnknownMessageType(String, String),

    #[error("popcore validation: no builder registered for {0}#{1}")]
    NoBuilder(ObjectType, ActionType),

    #[error("popcore validation: no handler registered for {0}#{1}")]
    NoHandler(ObjectType, ActionType),

    #[error("popcore validation: '{0}' does not match its derivation")]
    IdMismatch(&'static str),

    #[error("popcore validation: timestamp '{0}' is stale ({1} < {2})")]
    StaleTimestamp(&'static str, i64, i64),

    #[error("popcore validation: timestamp '{0}' is too far in the future ({1})")]
    FutureTimestamp(&'static str, i64),

    #[error("popcore validation: '{0}' must not be earlier than '{1}'")]
    TimestampOrder(&'static str, &'static str),

    #[error("popcore validation: message requires a LAO channel")]
    NotLaoChannel,

    #[error("popcore validation: transaction id mismatch: expected {0}")]
    TransactionIdMismatch(Hash),

    #[error("popcore validation: transaction output values overflow")]
    ValueOverflow,

    #[error("popcore validation: JSON error: {0}")]
    JSONDeserialization(#[from] serde_json::Error),

    #[error("popcore validation: base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
