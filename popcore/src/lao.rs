use crate::*;
use ed25519_dalek::PublicKey;
use tracing::{debug, info};

/// A Local Autonomous Organization as known to this node
#[derive(Clone, Debug)]
pub struct Lao {
    pub id: Hash,
    pub name: String,
    pub creation: i64,
    pub last_modified: i64,
    pub organizer: PublicKey,
    pub witnesses: Vec<PublicKey>,

    /// Id of the last `lao/update_properties` message applied through `lao/state`
    pub modification_id: Option<Hash>,

    /// `lao/update_properties` messages waiting for their `lao/state`
    pub pending_updates: Vec<PendingUpdate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpdate {
    pub modification_id: Hash,
    pub last_modified: i64,
}

impl Lao {
    /// `Hash(organizer, creation, name)`
    pub fn compute_id(organizer: &PublicKey, creation: i64, name: &str) -> Hash {
        Hash::from_strings(&[
            public_key_to_b64(organizer),
            creation.to_string(),
            name.to_owned(),
        ])
    }

    pub fn is_organizer(&self, key: &PublicKey) -> bool {
        self.organizer == *key
    }

    pub fn is_witness(&self, key: &PublicKey) -> bool {
        self.witnesses.contains(key)
    }

    /// Every signature is a valid one from a witness of this LAO, and every witness signed
    pub fn is_witnessed(&self, message_id: &Hash, signatures: &[WitnessSignature]) -> bool {
        let valid = signatures
            .iter()
            .all(|ws| self.is_witness(&ws.witness) && ws.verify(message_id));
        valid
            && self
                .witnesses
                .iter()
                .all(|witness| signatures.iter().any(|ws| ws.witness == *witness))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateLao {
    pub id: Hash,
    pub name: String,
    pub creation: i64,

    #[serde(with = "EdPublicKeyB64")]
    pub organizer: PublicKey,

    #[serde(with = "EdPublicKeyListB64")]
    pub witnesses: Vec<PublicKey>,
}

impl CreateLao {
    pub fn new(organizer: PublicKey, name: &str, creation: i64, witnesses: Vec<PublicKey>) -> Self {
        CreateLao {
            id: Lao::compute_id(&organizer, creation, name),
            name: name.to_owned(),
            creation,
            organizer,
            witnesses,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateLaoProperties {
    pub id: Hash,
    pub name: String,
    pub last_modified: i64,

    #[serde(with = "EdPublicKeyListB64")]
    pub witnesses: Vec<PublicKey>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StateLao {
    pub id: Hash,
    pub name: String,
    pub creation: i64,
    pub last_modified: i64,

    #[serde(with = "EdPublicKeyB64")]
    pub organizer: PublicKey,

    #[serde(with = "EdPublicKeyListB64")]
    pub witnesses: Vec<PublicKey>,

    pub modification_id: Hash,
    pub modification_signatures: Vec<WitnessSignature>,
}

fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    Ok(())
}

fn build_create(raw: &serde_json::Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: CreateLao = parse(raw)?;
    require_name(&data.name)?;
    ctx.config.check_timestamp("creation", data.creation)?;
    check_id(
        "id",
        &data.id,
        &Lao::compute_id(&data.organizer, data.creation, &data.name),
    )?;
    Ok(data.into())
}

fn build_update_properties(
    raw: &serde_json::Value,
    ctx: &BuildContext,
) -> Result<MessageData, ValidationError> {
    let data: UpdateLaoProperties = parse(raw)?;
    require_name(&data.name)?;
    ctx.config.check_timestamp("last_modified", data.last_modified)?;
    Ok(data.into())
}

fn build_state(raw: &serde_json::Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    let data: StateLao = parse(raw)?;
    require_name(&data.name)?;
    ctx.config.check_timestamp("creation", data.creation)?;
    ctx.config.check_timestamp("last_modified", data.last_modified)?;
    if data.last_modified < data.creation {
        return Err(ValidationError::TimestampOrder("last_modified", "creation"));
    }
    Ok(data.into())
}

/// `lao/create`, received on the root channel
fn handle_create(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::LaoCreate(data) => data,
        _ => return false,
    };
    if !msg.channel.is_root() || *msg.sender() != data.organizer {
        return false;
    }
    if ctx.store.laos.contains_key(&data.id) {
        return false;
    }

    ctx.store.laos.insert(
        data.id.clone(),
        Lao {
            id: data.id.clone(),
            name: data.name.clone(),
            creation: data.creation,
            last_modified: data.creation,
            organizer: data.organizer,
            witnesses: data.witnesses.clone(),
            modification_id: None,
            pending_updates: Vec::new(),
        },
    );
    ctx.subscribe(&Channel::lao(&data.id));
    info!(lao = %data.id, name = %data.name, "lao created");
    true
}

/// `lao/update_properties`: recorded as pending until the matching `lao/state`
fn handle_update_properties(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::LaoUpdateProperties(data) => data,
        _ => return false,
    };
    if !msg.channel.is_lao_channel() || msg.lao_id().as_ref() != Some(&data.id) {
        return false;
    }
    let lao = match ctx.store.laos.get_mut(&data.id) {
        Some(lao) => lao,
        None => return false,
    };
    if !lao.is_organizer(msg.sender()) || data.last_modified < lao.last_modified {
        return false;
    }

    lao.pending_updates.push(PendingUpdate {
        modification_id: msg.message_id().clone(),
        last_modified: data.last_modified,
    });
    true
}

/// `lao/state`: applies a pending update from the organizer once every current witness signed it
fn handle_state(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::LaoState(data) => data,
        _ => return false,
    };
    if !msg.channel.is_lao_channel() || msg.lao_id().as_ref() != Some(&data.id) {
        return false;
    }
    let lao = match ctx.store.laos.get_mut(&data.id) {
        Some(lao) => lao,
        None => return false,
    };
    if !lao.is_organizer(msg.sender()) || data.organizer != lao.organizer {
        debug!(lao = %data.id, "lao state not sent by the organizer");
        return false;
    }
    let pending = lao
        .pending_updates
        .iter()
        .any(|update| {
            update.modification_id == data.modification_id && update.last_modified == data.last_modified
        });
    if !pending || data.last_modified < lao.last_modified {
        debug!(lao = %data.id, modification = %data.modification_id, "no matching pending update");
        return false;
    }
    if !lao.is_witnessed(&data.modification_id, &data.modification_signatures) {
        debug!(lao = %data.id, modification = %data.modification_id, "update not signed by every witness");
        return false;
    }

    lao.name = data.name.clone();
    lao.witnesses = data.witnesses.clone();
    lao.last_modified = data.last_modified;
    lao.modification_id = Some(data.modification_id.clone());
    lao.pending_updates
        .retain(|update| update.last_modified > data.last_modified);
    info!(lao = %data.id, name = %data.name, "lao state updated");
    true
}

pub(crate) fn configure(registry: &mut MessageRegistry) -> Result<(), Error> {
    registry.add(ObjectType::Lao, ActionType::Create, handle_create, build_create)?;
    registry.add(
        ObjectType::Lao,
        ActionType::UpdateProperties,
        handle_update_properties,
        build_update_properties,
    )?;
    registry.add(ObjectType::Lao, ActionType::State, handle_state, build_state)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_create_lao() {
        let harness = Harness::new();
        let lao = harness.node.store().get_lao(&harness.lao_id).unwrap();
        assert_eq!(lao.organizer, harness.organizer.public);
        assert_eq!(lao.name, "LAO");
        assert!(harness
            .node
            .network()
            .subscriptions
            .contains(&Channel::lao(&harness.lao_id)));
    }

    #[test]
    fn test_create_lao_rejects_bad_id() {
        let mut harness = Harness::new();
        let organizer = generate_keypair();
        let mut data = CreateLao::new(organizer.public, "other", now(), vec![]);
        data.id = Hash::from_strings(&["wrong"]);
        let res = harness.send(&organizer, &Channel::root(), data.into());
        assert!(matches!(res, Err(ValidationError::IdMismatch("id"))));
    }

    #[test]
    fn test_create_lao_requires_organizer_as_sender() {
        let mut harness = Harness::new();
        let organizer = generate_keypair();
        let impostor = generate_keypair();
        let data = CreateLao::new(organizer.public, "other", now(), vec![]);
        assert!(!harness.send(&impostor, &Channel::root(), data.into()).unwrap());
    }

    fn update(harness: &mut Harness, name: &str, last_modified: i64, witnesses: Vec<PublicKey>) -> Hash {
        let update = UpdateLaoProperties {
            id: harness.lao_id.clone(),
            name: name.to_owned(),
            last_modified,
            witnesses,
        };
        let message = harness.message(&harness.organizer, update.into());
        let id = message.message_id.clone();
        let channel = Channel::lao(&harness.lao_id);
        assert!(harness.node.handle_broadcast(&channel, message).unwrap());
        id
    }

    fn state(
        harness: &Harness,
        name: &str,
        last_modified: i64,
        witnesses: Vec<PublicKey>,
        modification_id: &Hash,
        modification_signatures: Vec<WitnessSignature>,
    ) -> StateLao {
        let lao = harness.node.store().get_lao(&harness.lao_id).unwrap();
        StateLao {
            id: harness.lao_id.clone(),
            name: name.to_owned(),
            creation: lao.creation,
            last_modified,
            organizer: harness.organizer.public,
            witnesses,
            modification_id: modification_id.clone(),
            modification_signatures,
        }
    }

    #[test]
    fn test_update_then_state() {
        let mut harness = Harness::new();
        let organizer = harness.organizer_keypair();
        let witness = generate_keypair();
        let channel = Channel::lao(&harness.lao_id);
        let creation = harness.node.store().get_lao(&harness.lao_id).unwrap().creation;

        // Without witnesses the organizer alone applies an update
        let update_id = update(&mut harness, "Renamed", creation + 1, vec![witness.public]);
        assert_eq!(
            harness.node.store().get_lao(&harness.lao_id).unwrap().pending_updates.len(),
            1
        );
        let data = state(&harness, "Renamed", creation + 1, vec![witness.public], &update_id, vec![]);
        assert!(harness.send(&organizer, &channel, data.into()).unwrap());

        let lao = harness.node.store().get_lao(&harness.lao_id).unwrap();
        assert_eq!(lao.name, "Renamed");
        assert!(lao.is_witness(&witness.public));
        assert_eq!(lao.modification_id, Some(update_id));
        assert!(lao.pending_updates.is_empty());

        // From now on the witness must sign
        let update_id = update(&mut harness, "Again", creation + 2, vec![witness.public]);
        let unsigned = state(&harness, "Again", creation + 2, vec![witness.public], &update_id, vec![]);
        assert!(!harness.send(&organizer, &channel, unsigned.into()).unwrap());

        let ws = WitnessSignature::sign(&witness, &update_id).unwrap();
        let signed = state(&harness, "Again", creation + 2, vec![witness.public], &update_id, vec![ws]);
        assert!(harness.send(&organizer, &channel, signed.into()).unwrap());
        assert_eq!(harness.node.store().get_lao(&harness.lao_id).unwrap().name, "Again");
    }

    #[test]
    fn test_state_requires_pending_update() {
        let mut harness = Harness::new();
        let organizer = harness.organizer_keypair();
        let channel = Channel::lao(&harness.lao_id);
        let creation = harness.node.store().get_lao(&harness.lao_id).unwrap().creation;

        let unknown = state(&harness, "Renamed", creation, vec![], &Hash::from_strings(&["unknown"]), vec![]);
        assert!(!harness.send(&organizer, &channel, unknown.into()).unwrap());

        // A stored message that is not a pending update
        let create_id = harness
            .node
            .store()
            .messages()
            .next()
            .unwrap()
            .message
            .message_id
            .clone();
        let not_pending = state(&harness, "Renamed", creation, vec![], &create_id, vec![]);
        assert!(!harness.send(&organizer, &channel, not_pending.into()).unwrap());

        // The update's timestamp must match
        let update_id = update(&mut harness, "Renamed", creation + 1, vec![]);
        let mismatch = state(&harness, "Renamed", creation + 5, vec![], &update_id, vec![]);
        assert!(!harness.send(&organizer, &channel, mismatch.into()).unwrap());

        assert_eq!(harness.node.store().get_lao(&harness.lao_id).unwrap().name, "LAO");
    }

    #[test]
    fn test_state_from_outsider_is_rejected() {
        let mut harness = Harness::new();
        let outsider = generate_keypair();
        let channel = Channel::lao(&harness.lao_id);
        let creation = harness.node.store().get_lao(&harness.lao_id).unwrap().creation;

        let update_id = update(&mut harness, "Renamed", creation + 1, vec![]);
        let data = state(&harness, "hijacked", creation + 1, vec![outsider.public], &update_id, vec![]);
        assert!(!harness.send(&outsider, &channel, data.into()).unwrap());

        let lao = harness.node.store().get_lao(&harness.lao_id).unwrap();
        assert_eq!(lao.name, "LAO");
        assert!(lao.witnesses.is_empty());
    }

    #[test]
    fn test_state_signatures_must_come_from_witnesses() {
        let witness = generate_keypair();
        let other = generate_keypair();
        let lao = Lao {
            id: Hash::from_strings(&["lao"]),
            name: "LAO".to_owned(),
            creation: 0,
            last_modified: 0,
            organizer: generate_keypair().public,
            witnesses: vec![witness.public],
            modification_id: None,
            pending_updates: vec![],
        };
        let id = Hash::from_strings(&["update"]);

        assert!(!lao.is_witnessed(&id, &[]));
        assert!(!lao.is_witnessed(&id, &[WitnessSignature::sign(&other, &id).unwrap()]));
        let ws = WitnessSignature::sign(&witness, &id).unwrap();
        assert!(lao.is_witnessed(&id, &[ws]));
        assert!(!lao.is_witnessed(
            &id,
            &[ws, WitnessSignature::sign(&other, &id).unwrap()]
        ));

        // A witness signature over some other id
        let wrong = WitnessSignature::sign(&witness, &Hash::from_strings(&["other"])).unwrap();
        assert!(!lao.is_witnessed(&id, &[wrong]));
    }
}
