use crate::*;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The object a message acts upon
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Lao,
    Meeting,
    RollCall,
    Election,
    Message,
    Chirp,
    Reaction,
    Coin,
}

impl ObjectType {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Lao => "lao",
            ObjectType::Meeting => "meeting",
            ObjectType::RollCall => "roll_call",
            ObjectType::Election => "election",
            ObjectType::Message => "message",
            ObjectType::Chirp => "chirp",
            ObjectType::Reaction => "reaction",
            ObjectType::Coin => "coin",
        }
    }
}

impl FromStr for ObjectType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let object = match s {
            "lao" => ObjectType::Lao,
            "meeting" => ObjectType::Meeting,
            "roll_call" => ObjectType::RollCall,
            "election" => ObjectType::Election,
            "message" => ObjectType::Message,
            "chirp" => ObjectType::Chirp,
            "reaction" => ObjectType::Reaction,
            "coin" => ObjectType::Coin,
            _ => return Err(()),
        };
        Ok(object)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The action performed on an object
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    UpdateProperties,
    State,
    Open,
    Close,
    Reopen,
    Setup,
    Key,
    CastVote,
    End,
    Result,
    Witness,
    Add,
    Delete,
    NotifyAdd,
    NotifyDelete,
    PostTransaction,
}

impl ActionType {
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::UpdateProperties => "update_properties",
            ActionType::State => "state",
            ActionType::Open => "open",
            ActionType::Close => "close",
            ActionType::Reopen => "reopen",
            ActionType::Setup => "setup",
            ActionType::Key => "key",
            ActionType::CastVote => "cast_vote",
            ActionType::End => "end",
            ActionType::Result => "result",
            ActionType::Witness => "witness",
            ActionType::Add => "add",
            ActionType::Delete => "delete",
            ActionType::NotifyAdd => "notify_add",
            ActionType::NotifyDelete => "notify_delete",
            ActionType::PostTransaction => "post_transaction",
        }
    }
}

impl FromStr for ActionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "create" => ActionType::Create,
            "update_properties" => ActionType::UpdateProperties,
            "state" => ActionType::State,
            "open" => ActionType::Open,
            "close" => ActionType::Close,
            "reopen" => ActionType::Reopen,
            "setup" => ActionType::Setup,
            "key" => ActionType::Key,
            "cast_vote" => ActionType::CastVote,
            "end" => ActionType::End,
            "result" => ActionType::Result,
            "witness" => ActionType::Witness,
            "add" => ActionType::Add,
            "delete" => ActionType::Delete,
            "notify_add" => ActionType::NotifyAdd,
            "notify_delete" => ActionType::NotifyDelete,
            "post_transaction" => ActionType::PostTransaction,
            _ => return Err(()),
        };
        Ok(action)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Every (object, action) pair of the protocol schema
pub const SUPPORTED_MESSAGES: &[(ObjectType, ActionType)] = &[
    (ObjectType::Lao, ActionType::Create),
    (ObjectType::Lao, ActionType::UpdateProperties),
    (ObjectType::Lao, ActionType::State),
    (ObjectType::Meeting, ActionType::Create),
    (ObjectType::Meeting, ActionType::State),
    (ObjectType::RollCall, ActionType::Create),
    (ObjectType::RollCall, ActionType::Open),
    (ObjectType::RollCall, ActionType::Close),
    (ObjectType::RollCall, ActionType::Reopen),
    (ObjectType::Election, ActionType::Setup),
    (ObjectType::Election, ActionType::Key),
    (ObjectType::Election, ActionType::Open),
    (ObjectType::Election, ActionType::CastVote),
    (ObjectType::Election, ActionType::End),
    (ObjectType::Election, ActionType::Result),
    (ObjectType::Message, ActionType::Witness),
    (ObjectType::Chirp, ActionType::Add),
    (ObjectType::Chirp, ActionType::Delete),
    (ObjectType::Chirp, ActionType::NotifyAdd),
    (ObjectType::Chirp, ActionType::NotifyDelete),
    (ObjectType::Reaction, ActionType::Add),
    (ObjectType::Coin, ActionType::PostTransaction),
];

pub fn is_supported(object: ObjectType, action: ActionType) -> bool {
    SUPPORTED_MESSAGES.contains(&(object, action))
}

/// Which class of key is expected to have produced a message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignatureType {
    /// A participant's per-(LAO, roll call) token
    PopToken,

    /// The long-term key of an organizer, witness or server
    Keypair,
}

/// The `object` / `action` pair of an undecoded payload
#[derive(Deserialize, Debug)]
pub struct MessageHeader {
    pub object: String,
    pub action: String,
}

impl MessageHeader {
    pub fn from_value(raw: &Value) -> Result<Self, ValidationError> {
        Ok(serde_json::from_value(raw.clone())?)
    }

    pub fn key(&self) -> Result<(ObjectType, ActionType), ValidationError> {
        let unknown = || ValidationError::UnknownMessageType(self.object.clone(), self.action.clone());
        let object = ObjectType::from_str(&self.object).map_err(|_| unknown())?;
        let action = ActionType::from_str(&self.action).map_err(|_| unknown())?;
        Ok((object, action))
    }
}

/// Information a builder needs beyond the raw payload
pub struct BuildContext<'a> {
    /// LAO of the channel the message arrived on
    pub lao_id: Option<Hash>,
    pub config: &'a Config,
}

impl<'a> BuildContext<'a> {
    pub fn new(channel: &Channel, config: &'a Config) -> Self {
        BuildContext {
            lao_id: channel.lao_id(),
            config,
        }
    }

    pub fn require_lao(&self) -> Result<&Hash, ValidationError> {
        self.lao_id.as_ref().ok_or(ValidationError::NotLaoChannel)
    }
}

/// Deserialize a payload into its concrete type
pub fn parse<T: DeserializeOwned>(raw: &Value) -> Result<T, ValidationError> {
    Ok(serde_json::from_value(raw.clone())?)
}

/// Require `actual` to equal the id derived from the payload
pub fn check_id(field: &'static str, actual: &Hash, expected: &Hash) -> Result<(), ValidationError> {
    if actual != expected {
        return Err(ValidationError::IdMismatch(field));
    }
    Ok(())
}

macro_rules! message_data {
    ($($variant:ident($inner:ty) => ($object:ident, $action:ident),)*) => {
        /// A decoded message payload, one variant per (object, action) pair
        #[derive(Clone, Debug)]
        pub enum MessageData {
            $($variant($inner),)*
        }

        impl MessageData {
            pub fn object(&self) -> ObjectType {
                match self {
                    $(MessageData::$variant(_) => ObjectType::$object,)*
                }
            }

            pub fn action(&self) -> ActionType {
                match self {
                    $(MessageData::$variant(_) => ActionType::$action,)*
                }
            }

            fn fields(&self) -> Result<Value, serde_json::Error> {
                match self {
                    $(MessageData::$variant(inner) => serde_json::to_value(inner),)*
                }
            }
        }

        $(
            impl From<$inner> for MessageData {
                fn from(inner: $inner) -> Self {
                    MessageData::$variant(inner)
                }
            }
        )*
    };
}

message_data! {
    LaoCreate(CreateLao) => (Lao, Create),
    LaoUpdateProperties(UpdateLaoProperties) => (Lao, UpdateProperties),
    LaoState(StateLao) => (Lao, State),
    MeetingCreate(CreateMeeting) => (Meeting, Create),
    MeetingState(StateMeeting) => (Meeting, State),
    RollCallCreate(CreateRollCall) => (RollCall, Create),
    RollCallOpen(OpenRollCall) => (RollCall, Open),
    RollCallClose(CloseRollCall) => (RollCall, Close),
    RollCallReopen(ReopenRollCall) => (RollCall, Reopen),
    ElectionSetup(SetupElection) => (Election, Setup),
    ElectionKey(ElectionKey) => (Election, Key),
    ElectionOpen(OpenElection) => (Election, Open),
    ElectionCastVote(CastVote) => (Election, CastVote),
    ElectionEnd(EndElection) => (Election, End),
    ElectionResult(ElectionResult) => (Election, Result),
    MessageWitness(WitnessMessage) => (Message, Witness),
    ChirpAdd(AddChirp) => (Chirp, Add),
    ChirpDelete(DeleteChirp) => (Chirp, Delete),
    ChirpNotifyAdd(NotifyAddChirp) => (Chirp, NotifyAdd),
    ChirpNotifyDelete(NotifyDeleteChirp) => (Chirp, NotifyDelete),
    ReactionAdd(AddReaction) => (Reaction, Add),
    CoinPostTransaction(PostTransaction) => (Coin, PostTransaction),
}

impl MessageData {
    pub fn key(&self) -> (ObjectType, ActionType) {
        (self.object(), self.action())
    }

    /// The JSON payload, `object` and `action` first
    pub fn to_value(&self) -> Result<Value, Error> {
        let mut map = Map::new();
        map.insert("object".to_owned(), Value::from(self.object().name()));
        map.insert("action".to_owned(), Value::from(self.action().name()));
        if let Value::Object(fields) = self.fields()? {
            for (k, v) in fields {
                map.insert(k, v);
            }
        }
        Ok(Value::Object(map))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&self.to_value()?)?)
    }
}
