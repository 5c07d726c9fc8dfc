use crate::*;
use ed25519_dalek::PublicKey;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// A handled message and the channel it arrived on
#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub message: Message,
    pub channel: Channel,
}

/// Read access to protocol state
pub trait Store {
    /// Get a handled message by id
    fn get_message(&self, id: &Hash) -> Option<&Message>;

    fn get_lao(&self, id: &Hash) -> Option<&Lao>;

    fn get_election_by_id(&self, id: &Hash) -> Option<&Election>;

    /// Balance of a public key in the ledger of a LAO
    fn get_balance(&self, lao: &Hash, public_key: &PublicKey) -> u64;

    /// The transactions holding the current balance of a public key
    fn get_transactions_by_public_key(&self, lao: &Hash, public_key: &PublicKey)
        -> Vec<&Transaction>;
}

/// Messages for which early witness signatures are held, oldest evicted first
pub const MAX_ORPHAN_MESSAGES: usize = 1024;

/// Early witness signatures held for a single message
pub const MAX_ORPHANS_PER_MESSAGE: usize = 64;

/// A simple store that keeps everything in memory
#[derive(Default, Clone)]
pub struct MemStore {
    messages: BTreeMap<Hash, StoredMessage>,

    /// Witness signatures that arrived before the message they sign
    orphan_witness_signatures: IndexMap<Hash, Vec<WitnessSignature>>,

    pub laos: BTreeMap<Hash, Lao>,
    pub meetings: BTreeMap<Hash, Meeting>,
    pub roll_calls: BTreeMap<Hash, RollCall>,
    pub elections: BTreeMap<Hash, Election>,
    pub chirps: BTreeMap<Hash, Chirp>,
    pub reactions: BTreeMap<Hash, Reaction>,

    /// Chirps announced on LAO feeds, with the channel they were posted on
    pub chirp_feed: IndexMap<Hash, Channel>,

    /// Messages awaiting a manual witness signature
    pub pending_witness: IndexMap<Hash, Channel>,
    pub notifications: Vec<Notification>,

    /// Digital cash, one ledger per LAO
    pub ledgers: BTreeMap<Hash, Ledger>,
}

impl MemStore {
    /// Record a handled message, merging any witness signature received for it beforehand
    pub fn add_message(&mut self, channel: Channel, mut message: Message) {
        if let Some(orphans) = self.orphan_witness_signatures.shift_remove(&message.message_id) {
            for ws in orphans {
                message.add_witness_signature(ws);
            }
        }
        self.messages
            .insert(message.message_id.clone(), StoredMessage { message, channel });
    }

    pub fn get_stored_message(&self, id: &Hash) -> Option<&StoredMessage> {
        self.messages.get(id)
    }

    pub fn contains_message(&self, id: &Hash) -> bool {
        self.messages.contains_key(id)
    }

    /// Attach a verified witness signature to a message.
    ///
    /// Signatures for unknown messages are kept until the message arrives, up to
    /// `MAX_ORPHAN_MESSAGES` messages and `MAX_ORPHANS_PER_MESSAGE` signatures each. Returns false
    /// if this witness already signed or the signature was dropped.
    pub fn add_witness_signature(&mut self, message_id: &Hash, ws: WitnessSignature) -> bool {
        match self.messages.get_mut(message_id) {
            Some(stored) => stored.message.add_witness_signature(ws),
            None => {
                if !self.orphan_witness_signatures.contains_key(message_id)
                    && self.orphan_witness_signatures.len() >= MAX_ORPHAN_MESSAGES
                {
                    self.orphan_witness_signatures.shift_remove_index(0);
                }
                let orphans = self
                    .orphan_witness_signatures
                    .entry(message_id.clone())
                    .or_insert_with(Vec::new);
                if orphans.len() >= MAX_ORPHANS_PER_MESSAGE
                    || orphans.iter().any(|o| o.witness == ws.witness)
                {
                    return false;
                }
                orphans.push(ws);
                true
            }
        }
    }

    /// Whether `key` attended a closed roll call of the LAO
    pub fn is_attendee(&self, lao: &Hash, key: &PublicKey) -> bool {
        self.roll_calls.values().any(|rc| {
            rc.lao == *lao && rc.status == RollCallStatus::Closed && rc.attendees.contains(key)
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &StoredMessage> {
        self.messages.values()
    }
}

impl Store for MemStore {
    fn get_message(&self, id: &Hash) -> Option<&Message> {
        self.messages.get(id).map(|stored| &stored.message)
    }

    fn get_lao(&self, id: &Hash) -> Option<&Lao> {
        self.laos.get(id)
    }

    fn get_election_by_id(&self, id: &Hash) -> Option<&Election> {
        self.elections.get(id)
    }

    fn get_balance(&self, lao: &Hash, public_key: &PublicKey) -> u64 {
        self.ledgers
            .get(lao)
            .map_or(0, |ledger| ledger.balance(public_key))
    }

    fn get_transactions_by_public_key(
        &self,
        lao: &Hash,
        public_key: &PublicKey,
    ) -> Vec<&Transaction> {
        self.ledgers
            .get(lao)
            .map(|ledger| ledger.transactions_of(public_key))
            .unwrap_or_default()
    }
}
