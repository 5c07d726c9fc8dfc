use crate::*;
use serde_json::Value;
use tracing::info;

#[derive(Clone, Debug)]
pub struct Meeting {
    pub id: Hash,
    pub lao: Hash,
    pub name: String,
    pub creation: i64,
    pub last_modified: i64,
    pub location: Option<String>,
    pub start: i64,
    pub end: Option<i64>,
    pub extra: Option<Value>,
    pub modification_id: Option<Hash>,
}

impl Meeting {
    /// `Hash("M", lao, creation, name)`
    pub fn compute_id(lao: &Hash, creation: i64, name: &str) -> Hash {
        Hash::from_strings(&["M", lao.as_str(), creation.to_string().as_str(), name])
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateMeeting {
    pub id: Hash,
    pub name: String,
    pub creation: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub start: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StateMeeting {
    pub id: Hash,
    pub name: String,
    pub creation: i64,
    pub last_modified: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub start: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,

    pub modification_id: Hash,
    pub modification_signatures: Vec<WitnessSignature>,
}

fn check_schedule(creation: i64, start: i64, end: Option<i64>) -> Result<(), ValidationError> {
    if start < creation {
        return Err(ValidationError::TimestampOrder("start", "creation"));
    }
    if let Some(end) = end {
        if end < start {
            return Err(ValidationError::TimestampOrder("end", "start"));
        }
    }
    Ok(())
}

fn build_create(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: CreateMeeting = parse(raw)?;
    let lao = ctx.require_lao()?;
    if data.name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    ctx.config.check_timestamp("creation", data.creation)?;
    ctx.config.check_timestamp("start", data.start)?;
    check_schedule(data.creation, data.start, data.end)?;
    check_id(
        "id",
        &data.id,
        &Meeting::compute_id(lao, data.creation, &data.name),
    )?;
    Ok(data.into())
}

fn build_state(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: StateMeeting = parse(raw)?;
    ctx.require_lao()?;
    ctx.config.check_timestamp("creation", data.creation)?;
    ctx.config.check_timestamp("last_modified", data.last_modified)?;
    if data.last_modified < data.creation {
        return Err(ValidationError::TimestampOrder("last_modified", "creation"));
    }
    check_schedule(data.creation, data.start, data.end)?;
    Ok(data.into())
}

fn handle_create(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::MeetingCreate(data) => data,
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
    if ctx.store.meetings.contains_key(&data.id) {
        return false;
    }

    ctx.store.meetings.insert(
        data.id.clone(),
        Meeting {
            id: data.id.clone(),
            lao: lao_id.clone(),
            name: data.name.clone(),
            creation: data.creation,
            last_modified: data.creation,
            location: data.location.clone(),
            start: data.start,
            end: data.end,
            extra: data.extra.clone(),
            modification_id: None,
        },
    );
    info!(lao = %lao_id, meeting = %data.id, "meeting created");
    true
}

fn handle_state(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::MeetingState(data) => data,
        _ => return false,
    };
    if !msg.channel.is_lao_channel() {
        return false;
    }
    if ctx.store.get_message(&data.modification_id).is_none() {
        return false;
    }
    if !data
        .modification_signatures
        .iter()
        .all(|ws| ws.verify(&data.modification_id))
    {
        return false;
    }
    let meeting = match ctx.store.meetings.get_mut(&data.id) {
        Some(meeting) => meeting,
        None => return false,
    };
    if msg.lao_id().as_ref() != Some(&meeting.lao) || data.last_modified < meeting.last_modified {
        return false;
    }

    meeting.name = data.name.clone();
    meeting.last_modified = data.last_modified;
    meeting.location = data.location.clone();
    meeting.start = data.start;
    meeting.end = data.end;
    meeting.extra = data.extra.clone();
    meeting.modification_id = Some(data.modification_id.clone());
    true
}

pub(crate) fn configure(registry: &mut MessageRegistry) -> Result<(), Error> {
    registry.add(ObjectType::Meeting, ActionType::Create, handle_create, build_create)?;
    registry.add(ObjectType::Meeting, ActionType::State, handle_state, build_state)?;
    Ok(())
}
