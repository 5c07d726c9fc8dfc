use crate::*;
use ed25519_dalek::PublicKey;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Ballot secrecy of an election
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElectionVersion {
    #[serde(rename = "OPEN_BALLOT")]
    OpenBallot,

    #[serde(rename = "SECRET_BALLOT")]
    SecretBallot,
}

/// Lifecycle of an election, strictly linear
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElectionStatus {
    NotStarted,
    Opened,
    Terminated,
    ResultReady,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionQuestion {
    pub id: Hash,
    pub question: String,
    pub voting_method: String,
    pub ballot_options: Vec<String>,
    pub write_in: bool,
}

impl ElectionQuestion {
    /// `Hash("Question", election, question)`
    pub fn compute_id(election: &Hash, question: &str) -> Hash {
        Hash::from_strings(&["Question", election.as_str(), question])
    }
}

/// `election/setup`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SetupElection {
    pub id: Hash,
    pub lao: Hash,
    pub name: String,
    pub version: ElectionVersion,
    pub created_at: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub questions: Vec<ElectionQuestion>,
}

/// `election/key`: the public key secret ballots are encrypted with
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ElectionKey {
    pub election: Hash,
    pub election_key: ElectionPublicKey,
}

/// `election/open`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OpenElection {
    pub lao: Hash,
    pub election: Hash,
    pub opened_at: i64,
}

/// `election/end`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EndElection {
    pub lao: Hash,
    pub election: Hash,
    pub created_at: i64,

    /// Hash of the ordered vote ids, as computed by the organizer
    pub registered_votes: Hash,
}

/// `election/result`, published by a server on the election channel
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionResult {
    pub questions: Vec<ElectionResultQuestion>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionResultQuestion {
    pub id: Hash,
    pub result: Vec<QuestionResult>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct QuestionResult {
    pub ballot_option: String,
    pub count: u64,
}

#[derive(Clone, Debug)]
pub struct Election {
    pub id: Hash,
    pub lao: Hash,
    pub name: String,
    pub version: ElectionVersion,
    pub created_at: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub questions: Vec<ElectionQuestion>,

    /// Sender of `election/setup`, the only key allowed to drive the election
    pub organizer: PublicKey,

    pub election_key: Option<ElectionPublicKey>,
    pub status: ElectionStatus,
    pub opened_at: Option<i64>,

    /// Every accepted cast-vote message, in arrival order
    pub registered_votes: Vec<RegisteredVote>,

    /// Registered-votes hash announced by the organizer on `election/end`
    pub registered_votes_hash: Option<Hash>,

    /// Per-question tallies, keyed by question id
    pub results: IndexMap<Hash, Vec<QuestionResult>>,
}

impl Election {
    /// `Hash("Election", lao, created_at, name)`
    pub fn compute_id(lao: &Hash, created_at: i64, name: &str) -> Hash {
        Hash::from_strings(&["Election", lao.as_str(), created_at.to_string().as_str(), name])
    }

    pub fn from_setup(setup: &SetupElection, organizer: PublicKey) -> Self {
        Election {
            id: setup.id.clone(),
            lao: setup.lao.clone(),
            name: setup.name.clone(),
            version: setup.version,
            created_at: setup.created_at,
            start_time: setup.start_time,
            end_time: setup.end_time,
            questions: setup.questions.clone(),
            organizer,
            election_key: None,
            status: ElectionStatus::NotStarted,
            opened_at: None,
            registered_votes: Vec::new(),
            registered_votes_hash: None,
            results: IndexMap::new(),
        }
    }

    pub fn channel(&self) -> Channel {
        Channel::event(&self.lao, &self.id)
    }

    pub fn get_question(&self, id: &Hash) -> Option<&ElectionQuestion> {
        self.questions.iter().find(|q| q.id == *id)
    }

    /// Hash of every registered vote id, ordered by `(created_at, message_id)` of their cast-vote
    /// message, then by position within the message.
    ///
    /// An election without votes hashes to the empty string.
    pub fn compute_registered_votes_hash(&self) -> Hash {
        let mut registered: Vec<&RegisteredVote> = self.registered_votes.iter().collect();
        registered.sort_by(|a, b| {
            (a.created_at, &a.message_id).cmp(&(b.created_at, &b.message_id))
        });

        let ids: Vec<&str> = registered
            .iter()
            .flat_map(|rv| rv.votes.iter().map(|vote| vote.id().as_str()))
            .collect();

        if ids.is_empty() {
            return Hash::new("");
        }
        Hash::from_strings(&ids)
    }

    /// Check a vote's shape, question and id against this election
    pub fn validate_vote(&self, vote: &Vote) -> Result<(), ValidationError> {
        let question = self
            .get_question(vote.question())
            .ok_or_else(|| ValidationError::InvalidField("question", vote.question().to_string()))?;

        match (self.version, vote) {
            (ElectionVersion::OpenBallot, Vote::Plain(plain)) => {
                if plain.vote as usize >= question.ballot_options.len() {
                    return Err(ValidationError::InvalidField(
                        "vote",
                        format!("no ballot option {}", plain.vote),
                    ));
                }
                check_id("id", &plain.id, &plain.expected_id(&self.id, question.write_in))
            }
            (ElectionVersion::SecretBallot, Vote::Encrypted(encrypted)) => {
                check_id("id", &encrypted.id, &encrypted.expected_id(&self.id))
            }
            (ElectionVersion::OpenBallot, Vote::Encrypted(_)) => Err(ValidationError::InvalidField(
                "vote",
                "encrypted vote in an open-ballot election".to_owned(),
            )),
            (ElectionVersion::SecretBallot, Vote::Plain(_)) => Err(ValidationError::InvalidField(
                "vote",
                "plain vote in a secret-ballot election".to_owned(),
            )),
        }
    }
}

fn build_setup(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: SetupElection = parse(raw)?;
    if data.name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    ctx.config.check_timestamp("created_at", data.created_at)?;
    if data.start_time < data.created_at {
        return Err(ValidationError::TimestampOrder("start_time", "created_at"));
    }
    if data.end_time < data.start_time {
        return Err(ValidationError::TimestampOrder("end_time", "start_time"));
    }
    check_id(
        "id",
        &data.id,
        &Election::compute_id(&data.lao, data.created_at, &data.name),
    )?;

    if data.questions.is_empty() {
        return Err(ValidationError::MissingField("questions"));
    }
    for question in data.questions.iter() {
        if question.ballot_options.is_empty() {
            return Err(ValidationError::MissingField("ballot_options"));
        }
        if question.id != ElectionQuestion::compute_id(&data.id, &question.question) {
            warn!(
                election = %data.id,
                question = %question.id,
                "question id does not match its derivation"
            );
        }
    }
    Ok(data.into())
}

fn build_key(raw: &Value, _ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: ElectionKey = parse(raw)?;
    Ok(data.into())
}

fn build_open(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: OpenElection = parse(raw)?;
    ctx.config.check_timestamp("opened_at", data.opened_at)?;
    Ok(data.into())
}

fn build_cast_vote(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: CastVote = parse(raw)?;
    ctx.config.check_timestamp("created_at", data.created_at)?;
    if data.votes.is_empty() {
        return Err(ValidationError::MissingField("votes"));
    }
    Ok(data.into())
}

fn build_end(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: EndElection = parse(raw)?;
    ctx.config.check_timestamp("created_at", data.created_at)?;
    Ok(data.into())
}

fn build_result(raw: &Value, _ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: ElectionResult = parse(raw)?;
    if data.questions.is_empty() {
        return Err(ValidationError::MissingField("questions"));
    }
    Ok(data.into())
}

/// The election a message refers to, provided it is in `status` and the message arrived on a
/// channel of its LAO
fn election_in_status<'a>(
    store: &'a mut MemStore,
    msg: &ProcessedMessage,
    election_id: &Hash,
    status: ElectionStatus,
) -> Option<&'a mut Election> {
    let lao = msg.lao_id()?;
    let election = store.elections.get_mut(election_id)?;
    if election.lao != lao || election.status != status {
        debug!(
            election = %election_id,
            status = ?election.status,
            expected = ?status,
            "election not in the expected state"
        );
        return None;
    }
    Some(election)
}

/// `election/setup`: LAO channel only, the organizer of a known LAO creates the election
fn handle_setup(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ElectionSetup(data) => data,
        _ => return false,
    };
    if !msg.channel.is_lao_channel() || msg.lao_id().as_ref() != Some(&data.lao) {
        return false;
    }
    if let Some(lao) = ctx.store.get_lao(&data.lao) {
        if !lao.is_organizer(msg.sender()) {
            return false;
        }
    }
    if ctx.store.elections.contains_key(&data.id) {
        return false;
    }

    let election = Election::from_setup(data, *msg.sender());
    let channel = election.channel();
    ctx.store.elections.insert(election.id.clone(), election);
    ctx.subscribe(&channel);
    info!(lao = %data.lao, election = %data.id, name = %data.name, "election created");
    true
}

/// `election/key`: the organizer or the result authority sets the encryption key of a
/// secret-ballot election before it opens
fn handle_key(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ElectionKey(data) => data,
        _ => return false,
    };
    let authority = ctx.config.result_authority_key;
    let election = match election_in_status(ctx.store, msg, &data.election, ElectionStatus::NotStarted)
    {
        Some(election) => election,
        None => return false,
    };
    if *msg.sender() != election.organizer && Some(*msg.sender()) != authority {
        debug!(election = %election.id, "election key not sent by the organizer or the server");
        return false;
    }
    if election.version != ElectionVersion::SecretBallot || election.election_key.is_some() {
        return false;
    }

    election.election_key = Some(data.election_key);
    true
}

/// `election/open`, by the organizer
fn handle_open(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ElectionOpen(data) => data,
        _ => return false,
    };
    if msg.lao_id().as_ref() != Some(&data.lao) {
        return false;
    }
    let election = match election_in_status(ctx.store, msg, &data.election, ElectionStatus::NotStarted)
    {
        Some(election) => election,
        None => return false,
    };
    if *msg.sender() != election.organizer || data.opened_at < election.created_at {
        return false;
    }

    election.status = ElectionStatus::Opened;
    election.opened_at = Some(data.opened_at);
    info!(election = %election.id, "election opened");
    true
}

/// `election/cast_vote`: accepted only while the election is open and every vote is valid.
///
/// On a LAO known to this node the sender must be a PoP token from one of its closed roll calls.
fn handle_cast_vote(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ElectionCastVote(data) => data,
        _ => return false,
    };
    if msg.lao_id().as_ref() != Some(&data.lao) {
        return false;
    }
    if ctx.store.get_lao(&data.lao).is_some()
        && !ctx.store.is_attendee(&data.lao, msg.sender())
    {
        debug!(lao = %data.lao, "vote from a key that attended no roll call");
        return false;
    }
    let election = match election_in_status(ctx.store, msg, &data.election, ElectionStatus::Opened) {
        Some(election) => election,
        None => return false,
    };
    for vote in data.votes.iter() {
        if let Err(e) = election.validate_vote(vote) {
            debug!(election = %election.id, error = %e, "vote rejected");
            return false;
        }
    }

    election.registered_votes.push(RegisteredVote {
        created_at: data.created_at,
        sender: *msg.sender(),
        votes: data.votes.clone(),
        message_id: msg.message_id().clone(),
    });
    true
}

/// `election/end`, by the organizer: the supplied registered-votes hash is stored as announced
fn handle_end(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ElectionEnd(data) => data,
        _ => return false,
    };
    if msg.lao_id().as_ref() != Some(&data.lao) {
        return false;
    }
    let election = match election_in_status(ctx.store, msg, &data.election, ElectionStatus::Opened) {
        Some(election) => election,
        None => return false,
    };
    if *msg.sender() != election.organizer {
        return false;
    }

    let computed = election.compute_registered_votes_hash();
    if computed != data.registered_votes {
        warn!(
            election = %election.id,
            announced = %data.registered_votes,
            %computed,
            "registered votes hash differs from the local one"
        );
    }

    election.registered_votes_hash = Some(data.registered_votes.clone());
    election.status = ElectionStatus::Terminated;
    info!(election = %election.id, votes = election.registered_votes.len(), "election ended");
    true
}

/// `election/result`: the election is the trailing segment of the channel
fn handle_result(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::ElectionResult(data) => data,
        _ => return false,
    };
    let election_id = match msg.channel.last_segment() {
        Some(segment) => Hash::from(segment),
        None => return false,
    };
    let election = match election_in_status(ctx.store, msg, &election_id, ElectionStatus::Terminated)
    {
        Some(election) => election,
        None => return false,
    };

    election.results = data
        .questions
        .iter()
        .map(|q| (q.id.clone(), q.result.clone()))
        .collect();
    election.status = ElectionStatus::ResultReady;
    info!(election = %election.id, "election results received");
    true
}

pub(crate) fn configure(registry: &mut MessageRegistry) -> Result<(), Error> {
    registry.add(ObjectType::Election, ActionType::Setup, handle_setup, build_setup)?;
    registry.add(ObjectType::Election, ActionType::Key, handle_key, build_key)?;
    registry.add(ObjectType::Election, ActionType::Open, handle_open, build_open)?;
    registry.add(
        ObjectType::Election,
        ActionType::CastVote,
        handle_cast_vote,
        build_cast_vote,
    )?;
    registry.add(ObjectType::Election, ActionType::End, handle_end, build_end)?;
    registry.add(ObjectType::Election, ActionType::Result, handle_result, build_result)?;
    Ok(())
}
