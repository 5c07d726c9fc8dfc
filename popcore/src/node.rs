use crate::*;
use ed25519_dalek::{Keypair, PublicKey};
use tracing::{debug, warn};

/// A protocol participant: owns the registry, the state and the network handle, and processes
/// inbound messages one at a time
pub struct Node<N: Network> {
    registry: MessageRegistry,
    store: MemStore,
    network: N,
    keypair: Keypair,
    config: Config,
}

impl<N: Network> Node<N> {
    /// A node with the default witnessing policies
    pub fn new(keypair: Keypair, network: N, config: Config) -> Result<Self, Error> {
        Self::with_witnessing(keypair, network, config, &WitnessingTable::default())
    }

    /// Register every message type. Fails on a registration outside the protocol schema.
    pub fn with_witnessing(
        keypair: Keypair,
        network: N,
        config: Config,
        table: &WitnessingTable,
    ) -> Result<Self, Error> {
        let mut registry = MessageRegistry::new();
        lao::configure(&mut registry)?;
        meeting::configure(&mut registry)?;
        roll_call::configure(&mut registry)?;
        election::configure(&mut registry)?;
        social::configure(&mut registry)?;
        ledger::configure(&mut registry)?;
        witness::configure(&mut registry, table)?;

        Ok(Node {
            registry,
            store: MemStore::default(),
            network,
            keypair,
            config,
        })
    }

    fn context(&mut self) -> (&MessageRegistry, Context<'_>) {
        (
            &self.registry,
            Context {
                store: &mut self.store,
                network: &mut self.network,
                keypair: &self.keypair,
                config: &self.config,
            },
        )
    }

    /// Verify, decode and dispatch a message received on `channel`.
    ///
    /// Returns whether a handler applied it. A message seen before is not dispatched again, only
    /// its new witness signatures are kept.
    pub fn handle_broadcast(&mut self, channel: &Channel, message: Message) -> Result<bool, ValidationError> {
        if self.store.contains_message(&message.message_id) {
            for ws in message.witness_signatures.iter() {
                if ws.verify(&message.message_id) {
                    self.store.add_witness_signature(&message.message_id, *ws);
                }
            }
            debug!(message_id = %message.message_id, "duplicate message");
            return Ok(false);
        }

        message.verify(&self.config)?;
        let raw = message.decode_data()?;
        let build_ctx = BuildContext::new(channel, &self.config);
        let data = self.registry.build_message_data(&raw, &build_ctx)?;
        let processed = ProcessedMessage::new(message, channel.clone(), data);

        let (registry, mut ctx) = self.context();
        let handled = registry.handle_message(&mut ctx, &processed)?;
        if handled {
            self.store.add_message(processed.channel, processed.message);
        }
        Ok(handled)
    }

    /// Like [`Node::handle_broadcast`], logging and dropping malformed messages
    pub fn receive(&mut self, channel: &Channel, message: Message) -> bool {
        let message_id = message.message_id.clone();
        match self.handle_broadcast(channel, message) {
            Ok(handled) => handled,
            Err(e) => {
                warn!(%channel, %message_id, error = %e, "dropping message");
                false
            }
        }
    }

    /// Parse a JSON envelope and [`Node::receive`] it
    pub fn handle_raw(&mut self, channel: &Channel, raw: &str) -> bool {
        match serde_json::from_str::<Message>(raw) {
            Ok(message) => self.receive(channel, message),
            Err(e) => {
                warn!(%channel, error = %e, "dropping unparsable message");
                false
            }
        }
    }

    /// Sign and publish a payload with this node's key
    pub fn publish(&mut self, channel: &Channel, data: MessageData) -> bool {
        let (_, mut ctx) = self.context();
        ctx.publish(channel, data)
    }

    /// Sign a message waiting in the witnessing queue
    pub fn witness_pending_message(&mut self, message_id: &Hash) -> bool {
        let (_, mut ctx) = self.context();
        witness::witness_pending_message(&mut ctx, message_id)
    }

    pub fn store(&self) -> &MemStore {
        &self.store
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_duplicates_are_not_dispatched_again() {
        let mut harness = Harness::new();
        let author = generate_keypair();
        let channel = Channel::social(&harness.lao_id, "author");
        let data = AddChirp {
            text: "once".to_owned(),
            parent_id: None,
            timestamp: now(),
        };
        let message = harness.message(&author, data.into());
        let id = message.message_id.clone();

        assert!(harness.node.handle_broadcast(&channel, message.clone()).unwrap());
        assert!(!harness.node.handle_broadcast(&channel, message.clone()).unwrap());
        assert_eq!(harness.node.store().chirps.len(), 1);

        // A copy carrying a new witness signature only adds the signature
        let mut witnessed = message;
        let ws = WitnessSignature::sign(&generate_keypair(), &id).unwrap();
        witnessed.witness_signatures.push(ws);
        assert!(!harness.node.handle_broadcast(&channel, witnessed).unwrap());
        assert_eq!(
            harness.node.store().get_message(&id).unwrap().witness_signatures,
            vec![ws]
        );
    }

    #[test]
    fn test_malformed_messages_are_dropped() {
        let mut harness = Harness::new();
        let channel = Channel::lao(&harness.lao_id);
        let author = generate_keypair();
        let data = AddChirp {
            text: "tampered".to_owned(),
            parent_id: None,
            timestamp: now(),
        };

        let mut message = harness.message(&author, data.clone().into());
        message.sender = generate_keypair().public;
        assert!(matches!(
            harness.node.handle_broadcast(&channel, message.clone()),
            Err(ValidationError::InvalidSignature)
        ));
        assert!(!harness.node.receive(&channel, message));

        let mut message = harness.message(&author, data.into());
        message.message_id = Hash::from_strings(&["other"]);
        assert!(matches!(
            harness.node.handle_broadcast(&channel, message),
            Err(ValidationError::MessageIdMismatch)
        ));

        assert!(!harness.node.handle_raw(&channel, "{\"data\": 42}"));
        assert!(harness.node.store().chirps.is_empty());
    }

    #[test]
    fn test_unknown_message_type() {
        let mut harness = Harness::new();
        let author = generate_keypair();
        let payload = serde_json::json!({"object": "chirp", "action": "fly"});
        let message = Message::from_payload(&payload, &author).unwrap();
        let channel = Channel::lao(&harness.lao_id);
        assert!(matches!(
            harness.node.handle_broadcast(&channel, message),
            Err(ValidationError::UnknownMessageType(_, _))
        ));
    }

    #[test]
    fn test_publish_signs_with_node_key() {
        let mut harness = Harness::new();
        harness.node.network_mut().take_published();
        let channel = Channel::lao(&harness.lao_id);
        let data = AddChirp {
            text: "from the node".to_owned(),
            parent_id: None,
            timestamp: now(),
        };
        assert!(harness.node.publish(&channel, data.into()));

        let published = harness.node.network_mut().take_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1.sender, harness.node.public_key());
        assert!(published[0].1.verify(harness.node.config()).is_ok());
    }
}
