use crate::*;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::warn;

/// The ballot each voter cast last, by `(created_at, message_id)`
fn latest_ballots(election: &Election) -> Vec<&RegisteredVote> {
    let mut latest: BTreeMap<[u8; 32], &RegisteredVote> = BTreeMap::new();
    for registered in election.registered_votes.iter() {
        let key = registered.sender.to_bytes();
        match latest.get(&key) {
            Some(current)
                if (current.created_at, &current.message_id)
                    >= (registered.created_at, &registered.message_id) => {}
            _ => {
                latest.insert(key, registered);
            }
        }
    }
    latest.into_iter().map(|(_, registered)| registered).collect()
}

/// Per-question counters, every ballot option starting at zero
fn empty_counts(election: &Election) -> IndexMap<Hash, IndexMap<String, u64>> {
    election
        .questions
        .iter()
        .map(|question| {
            let options = question
                .ballot_options
                .iter()
                .map(|option| (option.clone(), 0))
                .collect();
            (question.id.clone(), options)
        })
        .collect()
}

fn into_results(counts: IndexMap<Hash, IndexMap<String, u64>>) -> Vec<ElectionResultQuestion> {
    counts
        .into_iter()
        .map(|(id, options)| ElectionResultQuestion {
            id,
            result: options
                .into_iter()
                .map(|(ballot_option, count)| QuestionResult {
                    ballot_option,
                    count,
                })
                .collect(),
        })
        .collect()
}

fn count(
    counts: &mut IndexMap<Hash, IndexMap<String, u64>>,
    election: &Election,
    question_id: &Hash,
    index: usize,
    write_in: Option<&str>,
) {
    let question = match election.get_question(question_id) {
        Some(question) => question,
        None => return,
    };
    let option = match (write_in, question.write_in) {
        (Some(write_in), true) => write_in.to_owned(),
        _ => match question.ballot_options.get(index) {
            Some(option) => option.clone(),
            None => {
                warn!(election = %election.id, question = %question_id, index, "vote for unknown option");
                return;
            }
        },
    };
    if let Some(options) = counts.get_mut(question_id) {
        *options.entry(option).or_insert(0) += 1;
    }
}

/// Count the latest open ballot of every voter
pub fn tally_open_ballot(election: &Election) -> Result<Vec<ElectionResultQuestion>, Error> {
    if election.version != ElectionVersion::OpenBallot {
        return Err(Error::WrongElectionVersion(election.id.clone()));
    }

    let mut counts = empty_counts(election);
    for registered in latest_ballots(election) {
        for vote in registered.votes.iter() {
            if let Vote::Plain(plain) = vote {
                count(
                    &mut counts,
                    election,
                    &plain.question,
                    plain.vote as usize,
                    plain.write_in.as_deref(),
                );
            }
        }
    }
    Ok(into_results(counts))
}

/// Decrypt and count the latest secret ballot of every voter.
///
/// Votes that fail to decrypt are skipped.
pub fn tally_secret_ballot(
    election: &Election,
    keypair: &ElectionKeyPair,
) -> Result<Vec<ElectionResultQuestion>, Error> {
    if election.version != ElectionVersion::SecretBallot {
        return Err(Error::WrongElectionVersion(election.id.clone()));
    }
    if election.election_key != Some(keypair.public) {
        return Err(Error::InvalidElectionKey(keypair.public.to_b64()));
    }

    let mut counts = empty_counts(election);
    for registered in latest_ballots(election) {
        for vote in registered.votes.iter() {
            if let Vote::Encrypted(encrypted) = vote {
                match encrypted.decrypt(&keypair.secret) {
                    Ok(index) => {
                        count(&mut counts, election, &encrypted.question, index as usize, None)
                    }
                    Err(e) => warn!(vote = %encrypted.id, error = %e, "cannot decrypt vote"),
                }
            }
        }
    }
    Ok(into_results(counts))
}
