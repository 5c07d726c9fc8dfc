use crate::*;
use ed25519_dalek::{Signature, Signer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How the messages of one kind get co-signed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WitnessingPolicy {
    NoWitnessing,

    /// Every node signs automatically after processing
    Passive,

    /// A human witness must sign explicitly
    Active,
}

/// `message/witness`: a witness signature over the id of another message.
///
/// The witness is the sender of the envelope carrying it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WitnessMessage {
    pub message_id: Hash,

    #[serde(with = "EdSignatureB64")]
    pub signature: Signature,
}

/// A message waiting for a manual witness signature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub message_id: Hash,
    pub channel: Channel,
    pub object: ObjectType,
    pub action: ActionType,
}

/// Witnessing policy of every message kind
#[derive(Clone, Debug)]
pub struct WitnessingTable {
    policies: BTreeMap<(ObjectType, ActionType), WitnessingPolicy>,
}

impl Default for WitnessingTable {
    fn default() -> Self {
        let mut policies = BTreeMap::new();
        for key in SUPPORTED_MESSAGES {
            policies.insert(*key, WitnessingPolicy::NoWitnessing);
        }
        for key in &[
            (ObjectType::Election, ActionType::CastVote),
            (ObjectType::Chirp, ActionType::Add),
            (ObjectType::Chirp, ActionType::Delete),
            (ObjectType::Reaction, ActionType::Add),
        ] {
            policies.insert(*key, WitnessingPolicy::Passive);
        }
        WitnessingTable { policies }
    }
}

impl WitnessingTable {
    pub fn get(&self, object: ObjectType, action: ActionType) -> WitnessingPolicy {
        self.policies
            .get(&(object, action))
            .copied()
            .unwrap_or(WitnessingPolicy::NoWitnessing)
    }

    /// Override the policy of one message kind
    pub fn set(
        &mut self,
        object: ObjectType,
        action: ActionType,
        policy: WitnessingPolicy,
    ) -> Result<(), Error> {
        if !is_supported(object, action) {
            return Err(Error::UnsupportedMessage(object, action));
        }
        // Witness messages are never witnessed themselves
        if object == ObjectType::Message {
            return Err(Error::UnsupportedMessage(object, action));
        }
        self.policies.insert((object, action), policy);
        Ok(())
    }
}

fn build_witness(raw: &Value, _ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: WitnessMessage = parse(raw)?;
    Ok(data.into())
}

/// `message/witness`: merge the carried signature into the target message.
///
/// A signature that does not verify is dropped with a warning, the message itself is still accepted.
fn handle_witness_message(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::MessageWitness(data) => data,
        _ => return false,
    };

    let ws = WitnessSignature {
        witness: *msg.sender(),
        signature: data.signature,
    };
    if !ws.verify(&data.message_id) {
        warn!(
            target_message = %data.message_id,
            witness = %public_key_to_b64(&ws.witness),
            "ignoring witness signature that does not match its message"
        );
        return true;
    }

    if ctx.store.add_witness_signature(&data.message_id, ws) {
        debug!(target_message = %data.message_id, "witness signature added");
    }
    true
}

/// Sign `msg` as a witness and publish the signature on its channel
fn witness_passively(ctx: &mut Context, msg: &ProcessedMessage) {
    if let Some(data) = sign(ctx, msg.message_id()) {
        ctx.publish(&msg.channel, data.into());
    }
}

/// Queue `msg` for a manual signature
fn queue_for_witnessing(ctx: &mut Context, msg: &ProcessedMessage) {
    let message_id = msg.message_id().clone();
    if ctx.store.pending_witness.contains_key(&message_id) {
        return;
    }
    ctx.store
        .pending_witness
        .insert(message_id.clone(), msg.channel.clone());
    ctx.store.notifications.push(Notification {
        message_id: message_id.clone(),
        channel: msg.channel.clone(),
        object: msg.data.object(),
        action: msg.data.action(),
    });
    info!(message_id = %message_id, "message awaits witness signature");
}

fn sign(ctx: &Context, message_id: &Hash) -> Option<WitnessMessage> {
    match message_id.to_bytes() {
        Ok(id_bytes) => Some(WitnessMessage {
            message_id: message_id.clone(),
            signature: ctx.keypair.sign(&id_bytes),
        }),
        Err(e) => {
            warn!(%message_id, error = %e, "cannot witness a malformed message id");
            None
        }
    }
}

/// Sign a message from the pending-witness queue, publishing the witness message on its channel
pub fn witness_pending_message(ctx: &mut Context, message_id: &Hash) -> bool {
    let channel = match ctx.store.pending_witness.shift_remove(message_id) {
        Some(channel) => channel,
        None => return false,
    };
    ctx.store
        .notifications
        .retain(|notification| notification.message_id != *message_id);

    match sign(ctx, message_id) {
        Some(data) => ctx.publish(&channel, data.into()),
        None => false,
    }
}

/// Register the witness message handler and the after-processing hook of every witnessed kind
pub(crate) fn configure(registry: &mut MessageRegistry, table: &WitnessingTable) -> Result<(), Error> {
    registry.add(
        ObjectType::Message,
        ActionType::Witness,
        handle_witness_message,
        build_witness,
    )?;

    for (object, action) in SUPPORTED_MESSAGES {
        match table.get(*object, *action) {
            WitnessingPolicy::NoWitnessing => {}
            WitnessingPolicy::Passive => {
                registry.add_after_processing(*object, *action, witness_passively)?
            }
            WitnessingPolicy::Active => {
                registry.add_after_processing(*object, *action, queue_for_witnessing)?
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn chirp(text: &str) -> MessageData {
        AddChirp {
            text: text.to_owned(),
            parent_id: None,
            timestamp: now(),
        }
        .into()
    }

    #[test]
    fn test_default_table() {
        let table = WitnessingTable::default();
        assert_eq!(
            table.get(ObjectType::Election, ActionType::CastVote),
            WitnessingPolicy::Passive
        );
        assert_eq!(
            table.get(ObjectType::Lao, ActionType::Create),
            WitnessingPolicy::NoWitnessing
        );
        assert_eq!(
            table.get(ObjectType::Message, ActionType::Witness),
            WitnessingPolicy::NoWitnessing
        );

        let mut table = table;
        assert!(table
            .set(ObjectType::Message, ActionType::Witness, WitnessingPolicy::Passive)
            .is_err());
        assert!(table
            .set(ObjectType::Coin, ActionType::Create, WitnessingPolicy::Active)
            .is_err());
    }

    #[test]
    fn test_passive_witnessing_publishes_signature() {
        let mut harness = Harness::new();
        let channel = Channel::social(&harness.lao_id, "author");
        let message = harness.message(&generate_keypair(), chirp("hello"));
        let target = message.message_id.clone();
        harness.node.network_mut().take_published();

        assert!(harness.node.handle_broadcast(&channel, message).unwrap());

        let published = harness.node.network_mut().take_published();
        assert_eq!(published.len(), 1);
        let (out_channel, witness_msg) = &published[0];
        assert_eq!(out_channel, &channel);
        assert_eq!(witness_msg.sender, harness.node.public_key());

        let data = witness_msg.decode_data().unwrap();
        assert_eq!(data["object"], "message");
        assert_eq!(data["action"], "witness");
        assert_eq!(data["message_id"], target.as_str());

        // Feeding it back merges the node's own signature into the chirp
        let witness_msg = witness_msg.clone();
        assert!(harness.node.handle_broadcast(&channel, witness_msg).unwrap());
        let stored = harness.node.store().get_message(&target).unwrap();
        assert_eq!(stored.witness_signatures.len(), 1);
        assert!(stored.witness_signatures[0].verify(&target));
    }

    #[test]
    fn test_witness_idempotent_and_bad_signatures_dropped() {
        let mut harness = Harness::new();
        let channel = Channel::social(&harness.lao_id, "author");
        let message = harness.message(&generate_keypair(), chirp("hello"));
        let target = message.message_id.clone();
        assert!(harness.node.handle_broadcast(&channel, message).unwrap());

        let witness = generate_keypair();
        let ws = WitnessSignature::sign(&witness, &target).unwrap();
        let data = WitnessMessage {
            message_id: target.clone(),
            signature: ws.signature,
        };
        assert!(harness.send(&witness, &channel, data.clone().into()).unwrap());
        assert_eq!(
            harness.node.store().get_message(&target).unwrap().witness_signatures,
            vec![ws]
        );

        // The same witness signing again, carried by a distinct message, changes nothing
        let mut store = harness.node.store().clone();
        assert!(!store.add_witness_signature(&target, ws));

        // A signature from someone else than the envelope sender does not verify and is dropped
        let impostor = generate_keypair();
        assert!(harness.send(&impostor, &channel, data.into()).unwrap());
        assert_eq!(
            harness.node.store().get_message(&target).unwrap().witness_signatures,
            vec![ws]
        );
    }

    #[test]
    fn test_witness_before_target_is_kept() {
        let mut harness = Harness::new();
        let channel = Channel::social(&harness.lao_id, "author");
        let message = harness.message(&generate_keypair(), chirp("later"));
        let target = message.message_id.clone();

        let witness = generate_keypair();
        let ws = WitnessSignature::sign(&witness, &target).unwrap();
        let data = WitnessMessage {
            message_id: target.clone(),
            signature: ws.signature,
        };
        assert!(harness.send(&witness, &channel, data.into()).unwrap());
        assert!(harness.node.store().get_message(&target).is_none());

        assert!(harness.node.handle_broadcast(&channel, message).unwrap());
        assert_eq!(
            harness.node.store().get_message(&target).unwrap().witness_signatures,
            vec![ws]
        );
    }

    #[test]
    fn test_active_witnessing() {
        let mut table = WitnessingTable::default();
        table
            .set(ObjectType::Chirp, ActionType::Add, WitnessingPolicy::Active)
            .unwrap();
        let mut harness = Harness::with_table(&table);
        let channel = Channel::social(&harness.lao_id, "author");
        let message = harness.message(&generate_keypair(), chirp("needs a human"));
        let target = message.message_id.clone();
        harness.node.network_mut().take_published();

        assert!(harness.node.handle_broadcast(&channel, message).unwrap());
        assert!(harness.node.network().published.is_empty());
        assert_eq!(harness.node.store().notifications.len(), 1);
        assert!(harness.node.store().pending_witness.contains_key(&target));

        assert!(harness.node.witness_pending_message(&target));
        assert!(harness.node.store().notifications.is_empty());
        assert!(harness.node.store().pending_witness.is_empty());
        assert_eq!(harness.node.network().published.len(), 1);

        // Nothing left to sign
        assert!(!harness.node.witness_pending_message(&target));
    }
}
