use crate::*;
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use serde_json::Value;

/// Output reference of the single input of a coinbase transaction
pub const COINBASE_HASH: &str = "0000000000000000000000000000000000000000000=";

/// Script type of every input and output: pay to public-key hash
pub const SCRIPT_TYPE: &str = "P2PKH";

pub const TRANSACTION_VERSION: u32 = 1;

/// Unlocking script of an input
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InputScript {
    #[serde(rename = "type")]
    pub script_type: String,

    #[serde(with = "EdPublicKeyB64")]
    pub pubkey: PublicKey,

    #[serde(with = "EdSignatureB64")]
    pub sig: Signature,
}

/// Spends output `tx_out_index` of transaction `tx_out_hash`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_out_hash: Option<Hash>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_out_index: Option<u32>,

    pub script: InputScript,
}

impl TxInput {
    fn out_hash(&self) -> &str {
        self.tx_out_hash.as_ref().map_or("", |hash| hash.as_str())
    }

    fn out_index(&self) -> String {
        self.tx_out_index.map_or_else(String::new, |index| index.to_string())
    }
}

/// Locking script of an output
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OutputScript {
    #[serde(rename = "type")]
    pub script_type: String,

    pub pubkey_hash: Hash,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script: OutputScript,
}

impl TxOutput {
    pub fn pay_to(public_key: &PublicKey, value: u64) -> Self {
        TxOutput {
            value,
            script: OutputScript {
                script_type: SCRIPT_TYPE.to_owned(),
                pubkey_hash: Hash::from_public_key(public_key),
            },
        }
    }
}

/// An input before it is signed
struct Outpoint {
    tx_out_hash: Hash,
    tx_out_index: u32,
}

/// A digital cash transaction.
///
/// Its id is not carried inline: see [`Transaction::id`] and [`PostTransaction`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u64,
}

impl Transaction {
    /// Hash of every field, in lexicographic order of field names: for each input its public key,
    /// signature, script type and outpoint, then the lock time, then for each output its key hash,
    /// script type and value, then the version.
    pub fn id(&self) -> Hash {
        let mut parts: Vec<String> = Vec::new();
        for input in self.inputs.iter() {
            parts.push(public_key_to_b64(&input.script.pubkey));
            parts.push(signature_to_b64(&input.script.sig));
            parts.push(input.script.script_type.clone());
            parts.push(input.out_hash().to_owned());
            parts.push(input.out_index());
        }
        parts.push(self.lock_time.to_string());
        for output in self.outputs.iter() {
            parts.push(output.script.pubkey_hash.to_string());
            parts.push(output.script.script_type.clone());
            parts.push(output.value.to_string());
        }
        parts.push(self.version.to_string());
        Hash::from_strings(&parts)
    }

    /// Parse a posted transaction, requiring `transaction_id` to match its contents
    pub fn from_json(raw: &Value, transaction_id: &Hash) -> Result<Self, ValidationError> {
        let transaction: Transaction = parse(raw)?;
        let expected = transaction.id();
        if expected != *transaction_id {
            return Err(ValidationError::TransactionIdMismatch(expected));
        }
        Ok(transaction)
    }

    /// Transfer `amount` from `from` to `to`.
    ///
    /// Every output of `prior` paying `from` is spent. The remainder, if any, goes back to `from`
    /// in a second output so that its whole balance stays in a single output.
    pub fn create(
        from: &Keypair,
        to: &PublicKey,
        amount: u64,
        prior: &[Transaction],
    ) -> Result<Self, Error> {
        let from_hash = Hash::from_public_key(&from.public);

        let mut outpoints = Vec::new();
        let mut balance: u64 = 0;
        for transaction in prior {
            let tx_out_hash = transaction.id();
            for (index, output) in transaction.outputs.iter().enumerate() {
                if output.script.pubkey_hash != from_hash {
                    continue;
                }
                balance = balance
                    .checked_add(output.value)
                    .ok_or(Error::ValueOverflow)?;
                outpoints.push(Outpoint {
                    tx_out_hash: tx_out_hash.clone(),
                    tx_out_index: index as u32,
                });
            }
        }
        if balance < amount {
            return Err(Error::InsufficientBalance(balance, amount));
        }

        let mut outputs = vec![TxOutput::pay_to(to, amount)];
        if balance > amount {
            outputs.push(TxOutput::pay_to(&from.public, balance - amount));
        }

        Ok(Transaction::sign(from, outpoints, outputs))
    }

    /// Mint `amount` for `to`, signed by the LAO organizer
    pub fn create_coinbase(organizer: &Keypair, to: &PublicKey, amount: u64) -> Self {
        let outpoint = Outpoint {
            tx_out_hash: Hash::from(COINBASE_HASH),
            tx_out_index: 0,
        };
        Transaction::sign(organizer, vec![outpoint], vec![TxOutput::pay_to(to, amount)])
    }

    fn sign(keypair: &Keypair, outpoints: Vec<Outpoint>, outputs: Vec<TxOutput>) -> Self {
        let mut transaction = Transaction {
            version: TRANSACTION_VERSION,
            inputs: Vec::with_capacity(outpoints.len()),
            outputs,
            lock_time: 0,
        };

        let mut data = String::new();
        for outpoint in outpoints.iter() {
            data.push_str(outpoint.tx_out_hash.as_str());
            data.push_str(&outpoint.tx_out_index.to_string());
        }
        transaction.push_outputs_data(&mut data);
        let sig = keypair.sign(data.as_bytes());

        transaction.inputs = outpoints
            .into_iter()
            .map(|outpoint| TxInput {
                tx_out_hash: Some(outpoint.tx_out_hash),
                tx_out_index: Some(outpoint.tx_out_index),
                script: InputScript {
                    script_type: SCRIPT_TYPE.to_owned(),
                    pubkey: keypair.public,
                    sig,
                },
            })
            .collect();
        transaction
    }

    fn push_outputs_data(&self, data: &mut String) {
        for output in self.outputs.iter() {
            data.push_str(&output.value.to_string());
            data.push_str(&output.script.script_type);
            data.push_str(output.script.pubkey_hash.as_str());
        }
    }

    /// The string every input signs: each outpoint, then each output's value, script type and key
    /// hash. Input scripts are not covered.
    pub fn signed_data(&self) -> String {
        let mut data = String::new();
        for input in self.inputs.iter() {
            data.push_str(input.out_hash());
            data.push_str(&input.out_index());
        }
        self.push_outputs_data(&mut data);
        data
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs
            .first()
            .map_or(false, |input| input.out_hash() == COINBASE_HASH)
    }

    /// Every input signature verifies against its own public key, and coinbase inputs are all
    /// signed by the organizer
    pub fn is_valid(&self, organizer: &PublicKey) -> bool {
        if self.inputs.is_empty() {
            return false;
        }
        let coinbase = self.is_coinbase();
        let data = self.signed_data();
        self.inputs.iter().all(|input| {
            if coinbase && input.script.pubkey != *organizer {
                return false;
            }
            input
                .script
                .pubkey
                .verify(data.as_bytes(), &input.script.sig)
                .is_ok()
        })
    }

    /// Sum of output values, None on overflow
    pub fn output_total(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value))
    }
}
