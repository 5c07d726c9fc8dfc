use crate::*;
use ed25519_dalek::Keypair;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Mutable state handed to handlers for the duration of one message
pub struct Context<'a> {
    pub store: &'a mut MemStore,
    pub network: &'a mut dyn Network,
    pub keypair: &'a Keypair,
    pub config: &'a Config,
}

impl<'a> Context<'a> {
    /// Sign `data` with this node's key and publish it.
    ///
    /// Failures are logged and reported as `false`, they never abort the current dispatch.
    pub fn publish(&mut self, channel: &Channel, data: MessageData) -> bool {
        let message = match Message::from_data(&data, self.keypair, vec![]) {
            Ok(message) => message,
            Err(e) => {
                warn!(%channel, error = %e, "failed to build outbound message");
                return false;
            }
        };
        match self.network.publish(channel, message) {
            Ok(()) => true,
            Err(e) => {
                warn!(%channel, error = %e, "failed to publish");
                false
            }
        }
    }

    pub fn subscribe(&mut self, channel: &Channel) -> bool {
        match self.network.subscribe(channel) {
            Ok(()) => true,
            Err(e) => {
                warn!(%channel, error = %e, "failed to subscribe");
                false
            }
        }
    }
}

/// Parses and validates a raw payload into its variant
pub type Builder = fn(&Value, &BuildContext) -> Result<MessageData, ValidationError>;

/// Applies a processed message, returning whether it was recognized and fully applied
pub type Handler = Box<dyn Fn(&mut Context, &ProcessedMessage) -> bool>;

/// Runs after a handler accepted a message
pub type AfterProcessing = Box<dyn Fn(&mut Context, &ProcessedMessage)>;

struct Entry {
    handler: Handler,
    builder: Builder,
}

/// Dispatch table from `(object, action)` to handler and builder
#[derive(Default)]
pub struct MessageRegistry {
    entries: BTreeMap<(ObjectType, ActionType), Entry>,
    after_processing: BTreeMap<(ObjectType, ActionType), Vec<AfterProcessing>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler and builder of a message type.
    ///
    /// Only pairs of the protocol schema may be registered.
    pub fn add<H>(
        &mut self,
        object: ObjectType,
        action: ActionType,
        handler: H,
        builder: Builder,
    ) -> Result<(), Error>
    where
        H: Fn(&mut Context, &ProcessedMessage) -> bool + 'static,
    {
        if !is_supported(object, action) {
            return Err(Error::UnsupportedMessage(object, action));
        }
        self.entries.insert(
            (object, action),
            Entry {
                handler: Box::new(handler),
                builder,
            },
        );
        Ok(())
    }

    /// Register a hook run after the handler of `(object, action)` returned true
    pub fn add_after_processing<F>(
        &mut self,
        object: ObjectType,
        action: ActionType,
        hook: F,
    ) -> Result<(), Error>
    where
        F: Fn(&mut Context, &ProcessedMessage) + 'static,
    {
        if !is_supported(object, action) {
            return Err(Error::UnsupportedMessage(object, action));
        }
        self.after_processing
            .entry((object, action))
            .or_insert_with(Vec::new)
            .push(Box::new(hook));
        Ok(())
    }

    pub fn is_registered(&self, object: ObjectType, action: ActionType) -> bool {
        self.entries.contains_key(&(object, action))
    }

    /// Build the typed payload of a raw message
    pub fn build_message_data(
        &self,
        raw: &Value,
        ctx: &BuildContext,
    ) -> Result<MessageData, ValidationError> {
        let header = MessageHeader::from_value(raw)?;
        let key = header.key()?;
        let entry = self
            .entries
            .get(&key)
            .ok_or(ValidationError::NoBuilder(key.0, key.1))?;
        (entry.builder)(raw, ctx)
    }

    /// Dispatch a processed message to its handler, then run after-processing hooks if it was accepted
    pub fn handle_message(
        &self,
        ctx: &mut Context,
        msg: &ProcessedMessage,
    ) -> Result<bool, ValidationError> {
        let key = msg.data.key();
        let entry = self
            .entries
            .get(&key)
            .ok_or(ValidationError::NoHandler(key.0, key.1))?;

        let handled = (entry.handler)(ctx, msg);
        if !handled {
            debug!(
                message_id = %msg.message_id(),
                object = %key.0,
                action = %key.1,
                "message not applied"
            );
            return Ok(false);
        }

        if let Some(hooks) = self.after_processing.get(&key) {
            for hook in hooks {
                hook(ctx, msg);
            }
        }
        Ok(true)
    }

    /// Which class of key is expected to sign this message
    pub fn get_signature_type(&self, data: &MessageData) -> SignatureType {
        signature_type(data.object(), data.action())
    }
}

/// Participant actions are signed with PoP tokens, everything else with long-term keys
pub fn signature_type(object: ObjectType, action: ActionType) -> SignatureType {
    match (object, action) {
        (ObjectType::Chirp, ActionType::Add)
        | (ObjectType::Chirp, ActionType::Delete)
        | (ObjectType::Reaction, ActionType::Add)
        | (ObjectType::Election, ActionType::CastVote)
        | (ObjectType::Coin, ActionType::PostTransaction) => SignatureType::PopToken,
        _ => SignatureType::Keypair,
    }
}
