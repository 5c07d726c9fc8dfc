use crate::*;
use ed25519_dalek::PublicKey;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// `coin/post_transaction`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PostTransaction {
    pub transaction_id: Hash,
    pub transaction: Transaction,
}

impl PostTransaction {
    pub fn new(transaction: Transaction) -> Self {
        PostTransaction {
            transaction_id: transaction.id(),
            transaction,
        }
    }
}

/// The digital cash state of one LAO.
///
/// Balances are a cache over the transactions, replaying them in arrival order rebuilds it.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    /// Applied transactions, in arrival order
    pub transactions: IndexMap<Hash, Transaction>,

    /// Balance of each public-key hash
    pub balances: BTreeMap<Hash, u64>,

    /// Ids of the transactions holding each public-key hash's current balance
    pub transactions_by_pubhash: BTreeMap<Hash, Vec<Hash>>,
}

impl Ledger {
    /// Apply a validated transaction: every input signer's balance is spent entirely, then each
    /// output is credited.
    ///
    /// The ledger is left untouched when a credit would overflow.
    pub fn apply(&mut self, transaction_id: Hash, transaction: Transaction) -> Result<(), Error> {
        let mut balances = self.balances.clone();
        for input in transaction.inputs.iter() {
            balances.insert(Hash::from_public_key(&input.script.pubkey), 0);
        }
        for output in transaction.outputs.iter() {
            let balance = balances
                .entry(output.script.pubkey_hash.clone())
                .or_insert(0);
            *balance = balance.checked_add(output.value).ok_or(Error::ValueOverflow)?;
        }
        self.balances = balances;

        for input in transaction.inputs.iter() {
            let pubhash = Hash::from_public_key(&input.script.pubkey);
            self.transactions_by_pubhash.remove(&pubhash);
        }
        for output in transaction.outputs.iter() {
            let ids = self
                .transactions_by_pubhash
                .entry(output.script.pubkey_hash.clone())
                .or_insert_with(Vec::new);
            if !ids.contains(&transaction_id) {
                ids.push(transaction_id.clone());
            }
        }

        self.transactions.insert(transaction_id, transaction);
        Ok(())
    }

    pub fn balance(&self, public_key: &PublicKey) -> u64 {
        self.balances
            .get(&Hash::from_public_key(public_key))
            .copied()
            .unwrap_or(0)
    }

    /// The transactions an owner can spend from, as inputs to [`Transaction::create`]
    pub fn transactions_of(&self, public_key: &PublicKey) -> Vec<&Transaction> {
        self.transactions_by_pubhash
            .get(&Hash::from_public_key(public_key))
            .map(|ids| ids.iter().filter_map(|id| self.transactions.get(id)).collect())
            .unwrap_or_default()
    }
}

fn build_post_transaction(raw: &Value, ctx: &BuildContext) -> Result<MessageData, ValidationError> {
    ctx.require_lao()?;
    let transaction_id: Hash = parse(
        raw.get("transaction_id")
            .ok_or(ValidationError::MissingField("transaction_id"))?,
    )?;
    let transaction = Transaction::from_json(
        raw.get("transaction")
            .ok_or(ValidationError::MissingField("transaction"))?,
        &transaction_id,
    )?;
    if transaction.inputs.is_empty() {
        return Err(ValidationError::MissingField("inputs"));
    }
    if transaction.outputs.is_empty() {
        return Err(ValidationError::MissingField("outputs"));
    }
    if transaction.output_total().is_none() {
        return Err(ValidationError::ValueOverflow);
    }
    Ok(PostTransaction {
        transaction_id,
        transaction,
    }
    .into())
}

/// `coin/post_transaction`: on the coin channel of a known LAO, signatures must verify and
/// coinbase transactions must come from its organizer
fn handle_post_transaction(ctx: &mut Context, msg: &ProcessedMessage) -> bool {
    let data = match &msg.data {
        MessageData::CoinPostTransaction(data) => data,
        _ => return false,
    };
    let lao_id = match msg.lao_id() {
        Some(lao_id) => lao_id,
        None => return false,
    };
    if msg.channel != Channel::coin(&lao_id) {
        return false;
    }
    let organizer = match ctx.store.get_lao(&lao_id) {
        Some(lao) => lao.organizer,
        None => return false,
    };
    if !data.transaction.is_valid(&organizer) {
        debug!(transaction = %data.transaction_id, "transaction signatures do not verify");
        return false;
    }

    let ledger = ctx.store.ledgers.entry(lao_id.clone()).or_default();
    if ledger.transactions.contains_key(&data.transaction_id) {
        return false;
    }
    if let Err(e) = ledger.apply(data.transaction_id.clone(), data.transaction.clone()) {
        debug!(transaction = %data.transaction_id, error = %e, "transaction not applied");
        return false;
    }

    info!(
        lao = %lao_id,
        transaction = %data.transaction_id,
        coinbase = data.transaction.is_coinbase(),
        "transaction applied"
    );
    true
}

pub(crate) fn configure(registry: &mut MessageRegistry) -> Result<(), Error> {
    registry.add(
        ObjectType::Coin,
        ActionType::PostTransaction,
        handle_post_transaction,
        build_post_transaction,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_coinbase_balances() {
        let mut harness = Harness::new();
        let organizer = harness.organizer_keypair();
        let channel = Channel::coin(&harness.lao_id);
        let alice = generate_keypair();
        let bob = generate_keypair();

        let minted = Transaction::create_coinbase(&organizer, &alice.public, 50);
        let post = PostTransaction::new(minted);
        assert!(harness.send(&organizer, &channel, post.into()).unwrap());

        let store = harness.node.store();
        assert_eq!(store.get_balance(&harness.lao_id, &alice.public), 50);
        assert_eq!(store.get_balance(&harness.lao_id, &bob.public), 0);
        // The coinbase input signer is not credited
        assert_eq!(store.get_balance(&harness.lao_id, &organizer.public), 0);
        assert_eq!(
            store
                .get_transactions_by_public_key(&harness.lao_id, &alice.public)
                .len(),
            1
        );

        // Minting by anyone but the organizer is refused
        let forged = PostTransaction::new(Transaction::create_coinbase(&bob, &bob.public, 1000));
        assert!(!harness.send(&bob, &channel, forged.into()).unwrap());
        assert_eq!(harness.node.store().get_balance(&harness.lao_id, &bob.public), 0);
    }

    #[test]
    fn test_transfer_conserves_value() {
        let mut harness = Harness::new();
        let organizer = harness.organizer_keypair();
        let lao = harness.lao_id.clone();
        let channel = Channel::coin(&lao);
        let alice = generate_keypair();
        let bob = generate_keypair();

        for amount in &[30, 20] {
            let minted = Transaction::create_coinbase(&organizer, &alice.public, *amount);
            assert!(harness
                .send(&organizer, &channel, PostTransaction::new(minted).into())
                .unwrap());
        }
        assert_eq!(harness.node.store().get_balance(&lao, &alice.public), 50);

        let prior: Vec<Transaction> = harness
            .node
            .store()
            .get_transactions_by_public_key(&lao, &alice.public)
            .into_iter()
            .cloned()
            .collect();
        let transfer = Transaction::create(&alice, &bob.public, 35, &prior).unwrap();
        assert_eq!(transfer.outputs.len(), 2);
        assert!(harness
            .send(&alice, &channel, PostTransaction::new(transfer).into())
            .unwrap());

        let store = harness.node.store();
        assert_eq!(store.get_balance(&lao, &alice.public), 15);
        assert_eq!(store.get_balance(&lao, &bob.public), 35);
        assert_eq!(store.get_transactions_by_public_key(&lao, &alice.public).len(), 1);
        assert_eq!(store.get_transactions_by_public_key(&lao, &bob.public).len(), 1);
    }

    #[test]
    fn test_post_transaction_validation() {
        let mut harness = Harness::new();
        let organizer = harness.organizer_keypair();
        let minted = Transaction::create_coinbase(&organizer, &organizer.public, 5);

        // Wrong id
        let post = PostTransaction {
            transaction_id: Hash::from("bogus"),
            transaction: minted.clone(),
        };
        let coin = Channel::coin(&harness.lao_id);
        assert!(matches!(
            harness.send(&organizer, &coin, post.into()),
            Err(ValidationError::TransactionIdMismatch(_))
        ));

        // Only the coin channel carries transactions
        let lao_channel = Channel::lao(&harness.lao_id);
        let post = PostTransaction::new(minted.clone());
        assert!(!harness.send(&organizer, &lao_channel, post.into()).unwrap());

        // Unknown LAO
        let unknown = Channel::coin(&Hash::from_strings(&["unknown"]));
        let post = PostTransaction::new(minted);
        assert!(!harness.send(&organizer, &unknown, post.into()).unwrap());
    }

    #[test]
    fn test_ledger_replay() {
        let organizer = generate_keypair();
        let alice = generate_keypair();
        let bob = generate_keypair();

        let minted = Transaction::create_coinbase(&organizer, &alice.public, 10);
        let transfer = Transaction::create(&alice, &bob.public, 10, &[minted.clone()]).unwrap();

        let mut ledger = Ledger::default();
        ledger.apply(minted.id(), minted).unwrap();
        ledger.apply(transfer.id(), transfer).unwrap();
        assert_eq!(ledger.balance(&alice.public), 0);
        assert_eq!(ledger.balance(&bob.public), 10);
        assert!(ledger.transactions_of(&alice.public).is_empty());
        assert_eq!(ledger.transactions.len(), 2);

        let overflow = Transaction::create_coinbase(&organizer, &bob.public, u64::MAX);
        assert!(matches!(
            ledger.apply(overflow.id(), overflow),
            Err(Error::ValueOverflow)
        ));
        assert_eq!(ledger.balance(&bob.public), 10);
        assert_eq!(ledger.transactions.len(), 2);
    }
}
