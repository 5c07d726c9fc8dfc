use crate::*;
use ed25519_dalek::PublicKey;
use serde_json::Value;
use tracing::info;

/// Roll-call id prefix, shared by creation and state updates
const ROLL_CALL_TAG: &str = "R";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RollCallStatus {
    Created,
    Opened,
    Closed,
}

#[derive(Clone, Debug)]
pub struct RollCall {
    /// Id assigned at creation
    pub id: Hash,

    /// Id of the latest state change: `open`, `reopen` and `close` reference it
    pub current_id: Hash,

    pub lao: Hash,
    pub name: String,
    pub creation: i64,
    pub location: String,
    pub description: Option<String>,
    pub proposed_start: i64,
    pub proposed_end: i64,
    pub status: RollCallStatus,
    pub opened_at: Option<i64>,
    pub closed_at: Option<i64>,
    pub attendees: Vec<PublicKey>,
}

impl RollCall {
    /// `Hash("R", lao, creation, name)`
    pub fn compute_id(lao: &Hash, creation: i64, name: &str) -> Hash {
        Hash::from_strings(&[ROLL_CALL_TAG, lao.as_str(), creation.to_string().as_str(), name])
    }

    /// `Hash("R", lao, previous_id, timestamp)`
    pub fn compute_update_id(lao: &Hash, previous_id: &Hash, timestamp: i64) -> Hash {
        Hash::from_strings(&[
            ROLL_CALL_TAG,
            lao.as_str(),
            previous_id.as_str(),
            timestamp.to_string().as_str(),
        ])
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateRollCall {
    pub id: Hash,
    pub name: String,
    pub creation: i64,
    pub proposed_start: i64,
    pub proposed_end: i64,
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OpenRollCall {
    pub update_id: Hash,
    pub opens: Hash,
    pub opened_at: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReopenRollCall {
    pub update_id: Hash,
    pub opens: Hash,
    pub opened_at: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CloseRollCall {
    pub update_id: Hash,
    pub closes: Hash,
    pub closed_at: i64,

    #[serde(with = "EdPublicKeyListB64")]
    pub attendees: Vec<PublicKey>,
}

fn build_create(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: CreateRollCall = parse(raw)?;
    let lao = ctx.require_lao()?;
    if data.name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    ctx.config.check_timestamp("creation", data.creation)?;
    if data.proposed_start < data.creation {
        return Err(ValidationError::TimestampOrder("proposed_start", "creation"));
    }
    if data.proposed_end < data.proposed_start {
        return Err(ValidationError::TimestampOrder("proposed_end", "proposed_start"));
    }
    check_id(
        "id",
        &data.id,
        &RollCall::compute_id(lao, data.creation, &data.name),
    )?;
    Ok(data.into())
}

fn build_open(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: OpenRollCall = parse(raw)?;
    let lao = ctx.require_lao()?;
    ctx.config.check_timestamp("opened_at", data.opened_at)?;
    check_id(
        "update_id",
        &data.update_id,
        &RollCall::compute_update_id(lao, &data.opens, data.opened_at),
    )?;
    Ok(data.into())
}

fn build_reopen(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: ReopenRollCall = parse(raw)?;
    let lao = ctx.require_lao()?;
    ctx.config.check_timestamp("opened_at", data.opened_at)?;
    check_id(
        "update_id",
        &data.update_id,
        &RollCall::compute_update_id(lao, &data.opens, data.opened_at),
    )?;
    Ok(data.into())
}

fn build_close(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: CloseRollCall = parse(raw)?;
    let lao = ctx.require_lao()?;
    ctx.config.check_timestamp("closed_at", data.closed_at)?;
    check_id(
        "update_id",
        &data.update_id,
        &RollCall::compute_update_id(lao, &data.closes, data.closed_at),
    )?;
    Ok(data.into())
}

/// The roll call whose latest state id is `current_id`, if the sender organizes its LAO
fn find_for_update<'a>(
    store: &'a mut MemStore,
    msg: &ProcessedMessage,
    current_id: &Hash,
) -> Option<&'a mut RollCall> {
    if !msg.channel.is_lao_channel() {
        return None;
    }
    let lao_id = msg.lao_id()?;
    if !store.get_lao(&lao_id)?.is_organizer(msg.sender()) {
        return None;
    }
    store
        .roll_calls
        .values_mut()
        .find(|rc| rc.lao == lao_id && rc.current_id == *current_id)
}

fn handle_create(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::RollCallCreate(data) => data,
        _ => return false,
    };
    if !msg.channel.is_lao_channel() {
        return false;
    }
    let lao_id = match msg.lao_id() {
        Some(lao_id) => lao_id,
        None => return false,
    };
    match ctx.store.get_lao(&lao_id) {
        Some(lao) if lao.is_organizer(msg.sender()) => {}
        _ => return false,
    }
    if ctx.store.roll_calls.contains_key(&data.id) {
        return false;
    }

    ctx.store.roll_calls.insert(
        data.id.clone(),
        RollCall {
            id: data.id.clone(),
            current_id: data.id.clone(),
            lao: lao_id.clone(),
            name: data.name.clone(),
            creation: data.creation,
            location: data.location.clone(),
            description: data.description.clone(),
            proposed_start: data.proposed_start,
            proposed_end: data.proposed_end,
            status: RollCallStatus::Created,
            opened_at: None,
            closed_at: None,
            attendees: Vec::new(),
        },
    );
    info!(lao = %lao_id, roll_call = %data.id, "roll call created");
    true
}

fn open(
    ctx: &mut Context,
    msg: &ProcessedMessage,
    opens: &Hash,
    update_id: &Hash,
    opened_at: i64,
    from: RollCallStatus,
) -> bool {
    let roll_call = match find_for_update(ctx.store, msg, opens) {
        Some(rc) => rc,
        None => return false,
    };
    if roll_call.status != from || opened_at < roll_call.creation {
        return false;
    }

    roll_call.status = RollCallStatus::Opened;
    roll_call.current_id = update_id.clone();
    roll_call.opened_at = Some(opened_at);
    info!(roll_call = %roll_call.id, "roll call opened");
    true
}

fn handle_open(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    match &msg.data {
        MessageData::RollCallOpen(data) => open(
            ctx,
            msg,
            &data.opens,
            &data.update_id,
            data.opened_at,
            RollCallStatus::Created,
        ),
        _ => false,
    }
}

fn handle_reopen(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    match &msg.data {
        MessageData::RollCallReopen(data) => open(
            ctx,
            msg,
            &data.opens,
            &data.update_id,
            data.opened_at,
            RollCallStatus::Closed,
        ),
        _ => false,
    }
}

fn handle_close(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::RollCallClose(data) => data,
        _ => return false,
    };
    let roll_call = match find_for_update(ctx.store, msg, &data.closes) {
        Some(rc) => rc,
        None => return false,
    };
    if roll_call.status != RollCallStatus::Opened {
        return false;
    }
    if roll_call.opened_at.map_or(false, |opened_at| data.closed_at < opened_at) {
        return false;
    }

    roll_call.status = RollCallStatus::Closed;
    roll_call.current_id = data.update_id.clone();
    roll_call.closed_at = Some(data.closed_at);
    roll_call.attendees = data.attendees.clone();
    info!(
        roll_call = %roll_call.id,
        attendees = roll_call.attendees.len(),
        "roll call closed"
    );
    true
}

pub(crate) fn configure(registry: &mut MessageRegistry) -> Result<(), Error> {
    registry.add(ObjectType::RollCall, ActionType::Create, handle_create, build_create)?;
    registry.add(ObjectType::RollCall, ActionType::Open, handle_open, build_open)?;
    registry.add(ObjectType::RollCall, ActionType::Reopen, handle_reopen, build_reopen)?;
    registry.add(ObjectType::RollCall, ActionType::Close, handle_close, build_close)?;
    Ok(())
}
