use super::*;
use crate::test_utils::*;
use ed25519_dalek::Keypair;

fn node() -> Node<RecordingNetwork> {
    Node::new(generate_keypair(), RecordingNetwork::default(), test_config()).unwrap()
}

fn send(
    node: &mut Node<RecordingNetwork>,
    keypair: &Keypair,
    channel: &Channel,
    data: MessageData,
) -> bool {
    let message = Message::from_data(&data, keypair, vec![]).unwrap();
    node.handle_broadcast(channel, message).unwrap()
}

#[test]
fn end_to_end_open_ballot() {
    let mut node = node();
    let organizer = generate_keypair();
    let voter = generate_keypair();
    let server = generate_keypair();

    let lao = Hash::from("L");
    let election_id = Hash::from_strings(&["Election", "L", "1000", "E"]);
    assert_eq!(Election::compute_id(&lao, 1000, "E"), election_id);
    let question = Hash::from("Q");
    let lao_channel = Channel::lao(&lao);
    let election_channel = Channel::event(&lao, &election_id);

    // Setup
    let setup = SetupElection {
        id: election_id.clone(),
        lao: lao.clone(),
        name: "E".to_owned(),
        version: ElectionVersion::OpenBallot,
        created_at: 1000,
        start_time: 1000,
        end_time: 2000,
        questions: vec![ElectionQuestion {
            id: question.clone(),
            question: "Q?".to_owned(),
            voting_method: "Plurality".to_owned(),
            ballot_options: vec!["yes".to_owned(), "no".to_owned()],
            write_in: false,
        }],
    };
    assert!(send(&mut node, &organizer, &lao_channel, setup.into()));
    assert!(node.network().subscriptions.contains(&election_channel));

    // Open
    let open = OpenElection {
        lao: lao.clone(),
        election: election_id.clone(),
        opened_at: 1001,
    };
    assert!(send(&mut node, &organizer, &election_channel, open.into()));

    // Cast a vote for option 0
    let vote = PlainVote::new(&election_id, &question, 0);
    assert_eq!(
        vote.id,
        Hash::from_strings(&["Vote", election_id.as_str(), "Q", "0"])
    );
    let cast = CastVote {
        lao: lao.clone(),
        election: election_id.clone(),
        created_at: 1002,
        votes: vec![vote.clone().into()],
    };
    assert!(send(&mut node, &voter, &election_channel, cast.into()));

    // Passively witnessed
    let published = node.network_mut().take_published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, election_channel);

    // End
    let election = node.store().get_election_by_id(&election_id).unwrap();
    let registered_votes = election.compute_registered_votes_hash();
    assert_eq!(registered_votes, Hash::from_strings(&[vote.id.as_str()]));
    let end = EndElection {
        lao: lao.clone(),
        election: election_id.clone(),
        created_at: 1003,
        registered_votes,
    };
    assert!(send(&mut node, &organizer, &election_channel, end.into()));

    // No vote after the end
    let late = CastVote {
        lao: lao.clone(),
        election: election_id.clone(),
        created_at: 1004,
        votes: vec![vote.into()],
    };
    assert!(!send(&mut node, &generate_keypair(), &election_channel, late.into()));

    // Result, tallied locally, stored verbatim
    let election = node.store().get_election_by_id(&election_id).unwrap();
    assert_eq!(election.status, ElectionStatus::Terminated);
    let tally = tally_open_ballot(election).unwrap();
    assert_eq!(tally[0].result[0].count, 1);
    assert_eq!(tally[0].result[1].count, 0);

    let result = ElectionResult { questions: tally };
    assert!(send(&mut node, &server, &election_channel, result.clone().into()));

    let election = node.store().get_election_by_id(&election_id).unwrap();
    assert_eq!(election.status, ElectionStatus::ResultReady);
    assert_eq!(election.results[&question], result.questions[0].result);
}

#[test]
fn end_to_end_secret_ballot() {
    let mut harness = Harness::new();
    let organizer = harness.organizer_keypair();
    let lao = harness.lao_id.clone();
    let created_at = now();
    let election_id = Election::compute_id(&lao, created_at, "Secret");
    let question = ElectionQuestion::compute_id(&election_id, "Who?");
    let channel = Channel::event(&lao, &election_id);

    let setup = SetupElection {
        id: election_id.clone(),
        lao: lao.clone(),
        name: "Secret".to_owned(),
        version: ElectionVersion::SecretBallot,
        created_at,
        start_time: created_at,
        end_time: created_at + 60,
        questions: vec![ElectionQuestion {
            id: question.clone(),
            question: "Who?".to_owned(),
            voting_method: "Plurality".to_owned(),
            ballot_options: vec!["A".to_owned(), "B".to_owned()],
            write_in: false,
        }],
    };
    assert!(harness.send(&organizer, &Channel::lao(&lao), setup.into()).unwrap());

    let keys = ElectionKeyPair::generate();
    let key = ElectionKey {
        election: election_id.clone(),
        election_key: keys.public,
    };
    assert!(harness.send(&organizer, &channel, key.into()).unwrap());

    let open = OpenElection {
        lao: lao.clone(),
        election: election_id.clone(),
        opened_at: created_at,
    };
    assert!(harness.send(&organizer, &channel, open.into()).unwrap());

    let voters: Vec<Keypair> = (0..3).map(|_| generate_keypair()).collect();
    let tokens: Vec<_> = voters.iter().map(|voter| voter.public).collect();
    harness.attend(&tokens);

    for (voter, index) in voters.iter().zip(&[1u16, 1, 0]) {
        let vote = EncryptedVote::encrypt(&election_id, &question, *index, &keys.public).unwrap();
        let cast = CastVote {
            lao: lao.clone(),
            election: election_id.clone(),
            created_at: now(),
            votes: vec![vote.into()],
        };
        assert!(harness.send(voter, &channel, cast.into()).unwrap());
    }

    // Someone who attended no roll call cannot vote
    let vote = EncryptedVote::encrypt(&election_id, &question, 0, &keys.public).unwrap();
    let cast = CastVote {
        lao: lao.clone(),
        election: election_id.clone(),
        created_at: now(),
        votes: vec![vote.into()],
    };
    assert!(!harness.send(&generate_keypair(), &channel, cast.into()).unwrap());

    let registered_votes = harness
        .node
        .store()
        .get_election_by_id(&election_id)
        .unwrap()
        .compute_registered_votes_hash();
    let end = EndElection {
        lao: lao.clone(),
        election: election_id.clone(),
        created_at: now(),
        registered_votes,
    };
    assert!(harness.send(&organizer, &channel, end.into()).unwrap());

    let election = harness.node.store().get_election_by_id(&election_id).unwrap();
    let tally = tally_secret_ballot(election, &keys).unwrap();
    let counts: Vec<(String, u64)> = tally[0]
        .result
        .iter()
        .map(|r| (r.ballot_option.clone(), r.count))
        .collect();
    assert_eq!(counts, vec![("A".to_owned(), 1), ("B".to_owned(), 2)]);
}

#[test]
fn end_to_end_digital_cash() {
    let mut harness = Harness::new();
    let organizer = harness.organizer_keypair();
    let lao = harness.lao_id.clone();
    let coin = Channel::coin(&lao);
    let alice = generate_keypair();
    let bob = generate_keypair();

    let minted = Transaction::create_coinbase(&organizer, &alice.public, 100);
    assert!(harness
        .send(&organizer, &coin, PostTransaction::new(minted).into())
        .unwrap());

    // Alice pays Bob twice, each time spending what she holds
    for amount in &[25, 5] {
        let prior: Vec<Transaction> = harness
            .node
            .store()
            .get_transactions_by_public_key(&lao, &alice.public)
            .into_iter()
            .cloned()
            .collect();
        let transfer = Transaction::create(&alice, &bob.public, *amount, &prior).unwrap();
        assert!(harness
            .send(&alice, &coin, PostTransaction::new(transfer).into())
            .unwrap());
    }

    let store = harness.node.store();
    assert_eq!(store.get_balance(&lao, &alice.public), 70);
    assert_eq!(store.get_balance(&lao, &bob.public), 30);
    assert_eq!(store.ledgers[&lao].transactions.len(), 3);

    // Replaying the ledger from scratch gives the same balances
    let mut replayed = Ledger::default();
    for (id, transaction) in store.ledgers[&lao].transactions.iter() {
        replayed.apply(id.clone(), transaction.clone()).unwrap();
    }
    assert_eq!(replayed.balances, store.ledgers[&lao].balances);
}
