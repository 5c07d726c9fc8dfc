use ed25519_dalek::Keypair;
use popcore::*;
use tracing::info;

/// One line of a replay log
#[derive(serde::Deserialize)]
struct Broadcast {
    channel: Channel,
    message: Message,
}

/// Prints outbound messages as JSON lines instead of sending them
struct StdoutNetwork;

impl Network for StdoutNetwork {
    fn publish(&mut self, channel: &Channel, message: Message) -> Result<(), Error> {
        let line = serde_json::json!({ "channel": channel, "message": message });
        println!("{}", line);
        Ok(())
    }

    fn subscribe(&mut self, channel: &Channel) -> Result<(), Error> {
        info!(%channel, "subscribed");
        Ok(())
    }
}

pub fn command_replay(matches: &clap::ArgMatches, keypair: Option<Keypair>) {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("popcore replay: {}", e);
        std::process::exit(1);
    });
    let keypair = keypair.unwrap_or_else(generate_keypair);

    let mut node = Node::new(keypair, StdoutNetwork, config).unwrap_or_else(|e| {
        eprintln!("popcore replay: {}", e);
        std::process::exit(1);
    });

    let (filename, contents) = crate::read_input("replay", matches);

    let mut handled = 0;
    let mut dropped = 0;
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let broadcast: Broadcast = serde_json::from_str(line).unwrap_or_else(|e| {
            eprintln!("popcore replay: {}:{}: {}", &filename, number + 1, e);
            std::process::exit(1);
        });
        if node.receive(&broadcast.channel, broadcast.message) {
            handled += 1;
        } else {
            dropped += 1;
        }
    }

    print_summary(node.store(), handled, dropped);
}

fn print_summary(store: &MemStore, handled: usize, dropped: usize) {
    println!("> Replayed {} messages, {} not applied", handled, dropped);

    for lao in store.laos.values() {
        println!(
            "LAO {} \"{}\": {} witnesses",
            lao.id,
            lao.name,
            lao.witnesses.len()
        );
    }
    for meeting in store.meetings.values() {
        println!("Meeting {} \"{}\"", meeting.id, meeting.name);
    }
    for roll_call in store.roll_calls.values() {
        println!(
            "Roll call {} \"{}\": {:?}, {} attendees",
            roll_call.id,
            roll_call.name,
            roll_call.status,
            roll_call.attendees.len()
        );
    }
    for election in store.elections.values() {
        println!(
            "Election {} \"{}\": {:?}, {} ballots",
            election.id,
            election.name,
            election.status,
            election.registered_votes.len()
        );
        for question in election.questions.iter() {
            if let Some(results) = election.results.get(&question.id) {
                println!("  {}", question.question);
                for result in results {
                    println!("    {} got {} votes", result.ballot_option, result.count);
                }
            }
        }
    }
    println!(
        "Social: {} chirps, {} reactions",
        store.chirps.len(),
        store.reactions.len()
    );
    for (lao, ledger) in store.ledgers.iter() {
        println!(
            "Ledger of {}: {} transactions",
            lao,
            ledger.transactions.len()
        );
        for (pubkey_hash, balance) in ledger.balances.iter() {
            println!("  {}: {}", pubkey_hash, balance);
        }
    }
    if !store.pending_witness.is_empty() {
        println!("{} messages awaiting witness signatures", store.pending_witness.len());
    }
}
