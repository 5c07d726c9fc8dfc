use crate::*;
use ed25519_dalek::PublicKey;
use serde_json::Value;

/// Maximum number of characters in a chirp
pub const MAX_CHIRP_CHARS: usize = 300;

#[derive(Clone, Debug)]
pub struct Chirp {
    pub id: Hash,
    pub lao: Hash,
    pub sender: PublicKey,
    pub text: String,
    pub parent_id: Option<Hash>,
    pub timestamp: i64,
    pub is_deleted: bool,
}

#[derive(Clone, Debug)]
pub struct Reaction {
    pub id: Hash,
    pub sender: PublicKey,
    pub codepoint: String,
    pub chirp_id: Hash,
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AddChirp {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Hash>,

    pub timestamp: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeleteChirp {
    pub chirp_id: Hash,
    pub timestamp: i64,
}

/// Broadcast by a server on the LAO feed when a chirp was posted
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotifyAddChirp {
    pub chirp_id: Hash,
    pub channel: Channel,
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotifyDeleteChirp {
    pub chirp_id: Hash,
    pub channel: Channel,
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AddReaction {
    pub reaction_codepoint: String,
    pub chirp_id: Hash,
    pub timestamp: i64,
}

fn build_add_chirp(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: AddChirp = parse(raw)?;
    ctx.require_lao()?;
    if data.text.chars().count() > MAX_CHIRP_CHARS {
        return Err(ValidationError::InvalidField(
            "text",
            format!("longer than {} characters", MAX_CHIRP_CHARS),
        ));
    }
    ctx.config.check_timestamp("timestamp", data.timestamp)?;
    Ok(data.into())
}

fn build_delete_chirp(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: DeleteChirp = parse(raw)?;
    ctx.require_lao()?;
    ctx.config.check_timestamp("timestamp", data.timestamp)?;
    Ok(data.into())
}

fn build_notify_add(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: NotifyAddChirp = parse(raw)?;
    ctx.require_lao()?;
    ctx.config.check_timestamp("timestamp", data.timestamp)?;
    Ok(data.into())
}

fn build_notify_delete(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: NotifyDeleteChirp = parse(raw)?;
    ctx.require_lao()?;
    ctx.config.check_timestamp("timestamp", data.timestamp)?;
    Ok(data.into())
}

fn build_add_reaction(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: AddReaction = parse(raw)?;
    ctx.require_lao()?;
    if data.reaction_codepoint.is_empty() {
        return Err(ValidationError::MissingField("reaction_codepoint"));
    }
    ctx.config.check_timestamp("timestamp", data.timestamp)?;
    Ok(data.into())
}

fn handle_add_chirp(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ChirpAdd(data) => data,
        _ => return false,
    };
    let lao = match msg.lao_id() {
        Some(lao) => lao,
        None => return false,
    };
    if ctx.store.chirps.contains_key(msg.message_id()) {
        return false;
    }

    ctx.store.chirps.insert(
        msg.message_id().clone(),
        Chirp {
            id: msg.message_id().clone(),
            lao,
            sender: *msg.sender(),
            text: data.text.clone(),
            parent_id: data.parent_id.clone(),
            timestamp: data.timestamp,
            is_deleted: false,
        },
    );
    true
}

/// Only the author may delete a chirp, its text is dropped
fn handle_delete_chirp(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ChirpDelete(data) => data,
        _ => return false,
    };
    let chirp = match ctx.store.chirps.get_mut(&data.chirp_id) {
        Some(chirp) => chirp,
        None => return false,
    };
    if chirp.sender != *msg.sender() || chirp.is_deleted {
        return false;
    }

    chirp.is_deleted = true;
    chirp.text.clear();
    true
}

fn handle_notify_add_chirp(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    match &msg.data {
        MessageData::ChirpNotifyAdd(data) => {
            ctx.store
                .chirp_feed
                .insert(data.chirp_id.clone(), data.channel.clone());
            true
        }
        _ => false,
    }
}

fn handle_notify_delete_chirp(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    match &msg.data {
        MessageData::ChirpNotifyDelete(data) => {
            ctx.store.chirp_feed.shift_remove(&data.chirp_id);
            true
        }
        _ => false,
    }
}

fn handle_add_reaction(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ReactionAdd(data) => data,
        _ => return false,
    };
    if msg.lao_id().is_none() || ctx.store.reactions.contains_key(msg.message_id()) {
        return false;
    }

    ctx.store.reactions.insert(
        msg.message_id().clone(),
        Reaction {
            id: msg.message_id().clone(),
            sender: *msg.sender(),
            codepoint: data.reaction_codepoint.clone(),
            chirp_id: data.chirp_id.clone(),
            timestamp: data.timestamp,
        },
    );
    true
}

pub(crate) fn configure(registry: &mut MessageRegistry) -> Result<(), Error> {
    registry.add(ObjectType::Chirp, ActionType::Add, handle_add_chirp, build_add_chirp)?;
    registry.add(
        ObjectType::Chirp,
        ActionType::Delete,
        handle_delete_chirp,
        build_delete_chirp,
    )?;
    registry.add(
        ObjectType::Chirp,
        ActionType::NotifyAdd,
        handle_notify_add_chirp,
        build_notify_add,
    )?;
    registry.add(
        ObjectType::Chirp,
        ActionType::NotifyDelete,
        handle_notify_delete_chirp,
        build_notify_delete,
    )?;
    registry.add(
        ObjectType::Reaction,
        ActionType::Add,
        handle_add_reaction,
        build_add_reaction,
    )?;
    Ok(())
}
