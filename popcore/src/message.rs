use crate::*;
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use serde_json::Value;
use tracing::warn;

/// A co-signature of a message id by a witness
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WitnessSignature {
    #[serde(with = "EdPublicKeyB64")]
    pub witness: PublicKey,

    #[serde(with = "EdSignatureB64")]
    pub signature: Signature,
}

impl WitnessSignature {
    /// Sign the target message id
    pub fn sign(keypair: &Keypair, message_id: &Hash) -> Result<Self, Error> {
        let id_bytes = message_id.to_bytes()?;
        Ok(WitnessSignature {
            witness: keypair.public,
            signature: keypair.sign(&id_bytes),
        })
    }

    /// Check the signature against the target message id (not the witness message's own id)
    pub fn verify(&self, message_id: &Hash) -> bool {
        match message_id.to_bytes() {
            Ok(id_bytes) => self.witness.verify(&id_bytes, &self.signature).is_ok(),
            Err(_) => false,
        }
    }
}

/// The signed, hash-identified message envelope
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    /// base64url of the JSON payload
    pub data: String,

    #[serde(with = "EdPublicKeyB64")]
    pub sender: PublicKey,

    #[serde(with = "EdSignatureB64")]
    pub signature: Signature,

    pub message_id: Hash,

    pub witness_signatures: Vec<WitnessSignature>,
}

impl Message {
    /// Serialize, sign and identify a payload
    pub fn from_data(
        data: &MessageData,
        keypair: &Keypair,
        witness_signatures: Vec<WitnessSignature>,
    ) -> Result<Self, Error> {
        let bytes = data.to_bytes()?;
        Ok(Message::sign_bytes(&bytes, keypair, witness_signatures))
    }

    /// Sign an arbitrary JSON payload, without checking it against the protocol schema
    pub fn from_payload(payload: &Value, keypair: &Keypair) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Message::sign_bytes(&bytes, keypair, vec![]))
    }

    fn sign_bytes(bytes: &[u8], keypair: &Keypair, witness_signatures: Vec<WitnessSignature>) -> Self {
        let signature = keypair.sign(bytes);
        let encoded = encode_b64(bytes);
        let message_id = Message::compute_id(&encoded, &signature);

        Message {
            data: encoded,
            sender: keypair.public,
            signature,
            message_id,
            witness_signatures,
        }
    }

    /// `Hash(data, signature)` over their base64url encodings
    pub fn compute_id(data: &str, signature: &Signature) -> Hash {
        Hash::from_strings(&[data.to_owned(), signature_to_b64(signature)])
    }

    /// The raw payload bytes
    pub fn data_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        decode_b64(&self.data).map_err(|e| ValidationError::InvalidField("data", e.to_string()))
    }

    /// The decoded JSON payload
    pub fn decode_data(&self) -> Result<Value, ValidationError> {
        let bytes = self.data_bytes()?;
        serde_json::from_slice(&bytes).map_err(|e| ValidationError::InvalidField("data", e.to_string()))
    }

    /// Verify the envelope.
    ///
    /// `election/result` payloads are authored by a server that does not hold the sender's key:
    /// they are checked against `config.result_authority_key` when one is configured, and are
    /// otherwise accepted without id or signature checks.
    pub fn verify(&self, config: &Config) -> Result<(), ValidationError> {
        let bytes = self.data_bytes()?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ValidationError::InvalidField("data", e.to_string()))?;

        if is_election_result(&payload) {
            match &config.result_authority_key {
                Some(authority) => {
                    if *authority != self.sender {
                        return Err(ValidationError::InvalidField(
                            "sender",
                            "election result not sent by the result authority".to_owned(),
                        ));
                    }
                    self.verify_integrity(&bytes)?;
                }
                None => {
                    warn!(
                        message_id = %self.message_id,
                        "accepting election result without signature verification"
                    );
                }
            }
        } else {
            self.verify_integrity(&bytes)?;
        }

        for ws in self.witness_signatures.iter() {
            if !ws.verify(&self.message_id) {
                return Err(ValidationError::InvalidWitnessSignature(public_key_to_b64(
                    &ws.witness,
                )));
            }
        }

        Ok(())
    }

    fn verify_integrity(&self, bytes: &[u8]) -> Result<(), ValidationError> {
        let expected_id = Message::compute_id(&self.data, &self.signature);
        if expected_id != self.message_id {
            return Err(ValidationError::MessageIdMismatch);
        }
        self.sender
            .verify(bytes, &self.signature)
            .map_err(|_| ValidationError::InvalidSignature)
    }

    /// Add a witness signature unless this witness already signed
    pub fn add_witness_signature(&mut self, ws: WitnessSignature) -> bool {
        if self.witness_signatures.iter().any(|w| w.witness == ws.witness) {
            return false;
        }
        self.witness_signatures.push(ws);
        true
    }
}

/// Only the `election/result` header is exempt from sender verification
fn is_election_result(payload: &Value) -> bool {
    MessageHeader::from_value(payload)
        .and_then(|header| header.key())
        .map_or(false, |key| key == (ObjectType::Election, ActionType::Result))
}

/// A verified message together with its decoded payload and arrival channel
#[derive(Clone, Debug)]
pub struct ProcessedMessage {
    pub message: Message,
    pub channel: Channel,
    pub data: MessageData,
    pub received_at: i64,
}

impl ProcessedMessage {
    pub fn new(message: Message, channel: Channel, data: MessageData) -> Self {
        ProcessedMessage {
            message,
            channel,
            data,
            received_at: now(),
        }
    }

    pub fn message_id(&self) -> &Hash {
        &self.message.message_id
    }

    pub fn sender(&self) -> &PublicKey {
        &self.message.sender
    }

    pub fn lao_id(&self) -> Option<Hash> {
        self.channel.lao_id()
    }
}
