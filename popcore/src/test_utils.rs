use crate::*;
use ed25519_dalek::{Keypair, PublicKey};

/// Accepts any past timestamp, so fixtures can use small literal values
pub fn test_config() -> Config {
    Config {
        timestamp_floor: 0,
        ..Config::default()
    }
}

/// A node with a LAO already created on it
pub struct Harness {
    pub node: Node<RecordingNetwork>,
    pub organizer: Keypair,
    pub lao_id: Hash,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_table(&WitnessingTable::default())
    }

    pub fn with_table(table: &WitnessingTable) -> Self {
        Self::build(test_config(), table)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, &WitnessingTable::default())
    }

    fn build(config: Config, table: &WitnessingTable) -> Self {
        let organizer = generate_keypair();
        let mut node =
            Node::with_witnessing(generate_keypair(), RecordingNetwork::default(), config, table)
                .unwrap();

        let create = CreateLao::new(organizer.public, "LAO", now(), vec![]);
        let lao_id = create.id.clone();
        let message = Message::from_data(&MessageData::from(create), &organizer, vec![]).unwrap();
        assert!(node.handle_broadcast(&Channel::root(), message).unwrap());

        Harness {
            node,
            organizer,
            lao_id,
        }
    }

    pub fn message(&self, keypair: &Keypair, data: MessageData) -> Message {
        Message::from_data(&data, keypair, vec![]).unwrap()
    }

    /// Sign `data` with `keypair` and feed it to the node
    pub fn send(
        &mut self,
        keypair: &Keypair,
        channel: &Channel,
        data: MessageData,
    ) -> Result<bool, ValidationError> {
        let message = self.message(keypair, data);
        self.node.handle_broadcast(channel, message)
    }

    /// Run a whole roll call on the LAO, returning its id
    pub fn attend(&mut self, attendees: &[PublicKey]) -> Hash {
        let organizer = self.organizer_keypair();
        let channel = Channel::lao(&self.lao_id);
        let creation = now();
        let name = format!("Roll call {}", self.node.store().roll_calls.len());
        let id = RollCall::compute_id(&self.lao_id, creation, &name);

        let create = CreateRollCall {
            id: id.clone(),
            name,
            creation,
            proposed_start: creation,
            proposed_end: creation + 60,
            location: "Here".to_owned(),
            description: None,
        };
        assert!(self.send(&organizer, &channel, create.into()).unwrap());

        let opened = RollCall::compute_update_id(&self.lao_id, &id, creation);
        let open = OpenRollCall {
            update_id: opened.clone(),
            opens: id.clone(),
            opened_at: creation,
        };
        assert!(self.send(&organizer, &channel, open.into()).unwrap());

        let close = CloseRollCall {
            update_id: RollCall::compute_update_id(&self.lao_id, &opened, creation),
            closes: opened,
            closed_at: creation,
            attendees: attendees.to_vec(),
        };
        assert!(self.send(&organizer, &channel, close.into()).unwrap());
        id
    }

    pub fn organizer_keypair(&self) -> Keypair {
        Keypair::from_bytes(&self.organizer.to_bytes()).unwrap()
    }
}
