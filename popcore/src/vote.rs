use crate::*;
use ed25519_dalek::PublicKey;

/// Id of a vote: `Hash("Vote", election, question, selector)`.
///
/// The selector is the write-in text when the question allows write-ins, otherwise the vote
/// index in decimal or its base64url ciphertext.
pub fn vote_id(election: &Hash, question: &Hash, selector: &str) -> Hash {
    Hash::from_strings(&["Vote", election.as_str(), question.as_str(), selector])
}

/// An open-ballot vote for one question
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlainVote {
    pub id: Hash,
    pub question: Hash,
    pub vote: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_in: Option<String>,
}

impl PlainVote {
    pub fn new(election: &Hash, question: &Hash, vote: u32) -> Self {
        PlainVote {
            id: vote_id(election, question, &vote.to_string()),
            question: question.clone(),
            vote,
            write_in: None,
        }
    }

    pub fn with_write_in(election: &Hash, question: &Hash, vote: u32, write_in: &str) -> Self {
        PlainVote {
            id: vote_id(election, question, write_in),
            question: question.clone(),
            vote,
            write_in: Some(write_in.to_owned()),
        }
    }

    pub fn expected_id(&self, election: &Hash, write_in_enabled: bool) -> Hash {
        match (&self.write_in, write_in_enabled) {
            (Some(write_in), true) => vote_id(election, &self.question, write_in),
            _ => vote_id(election, &self.question, &self.vote.to_string()),
        }
    }
}

/// A secret-ballot vote: the option index encrypted under the election key
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncryptedVote {
    pub id: Hash,
    pub question: Hash,

    /// base64url `K || C` ciphertext
    pub vote: String,
}

impl EncryptedVote {
    pub fn encrypt(
        election: &Hash,
        question: &Hash,
        index: u16,
        key: &ElectionPublicKey,
    ) -> Result<Self, Error> {
        let vote = encrypt_vote_index(key, index)?;
        Ok(EncryptedVote {
            id: vote_id(election, question, &vote),
            question: question.clone(),
            vote,
        })
    }

    pub fn expected_id(&self, election: &Hash) -> Hash {
        vote_id(election, &self.question, &self.vote)
    }

    pub fn decrypt(&self, secret: &ElectionSecretKey) -> Result<u16, Error> {
        decrypt_vote_index(secret, &self.vote)
    }
}

/// A vote as found in `election/cast_vote`.
///
/// Plain votes carry a numeric index, encrypted votes a ciphertext string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Vote {
    Plain(PlainVote),
    Encrypted(EncryptedVote),
}

impl Vote {
    pub fn id(&self) -> &Hash {
        match self {
            Vote::Plain(vote) => &vote.id,
            Vote::Encrypted(vote) => &vote.id,
        }
    }

    pub fn question(&self) -> &Hash {
        match self {
            Vote::Plain(vote) => &vote.question,
            Vote::Encrypted(vote) => &vote.question,
        }
    }
}

impl From<PlainVote> for Vote {
    fn from(vote: PlainVote) -> Self {
        Vote::Plain(vote)
    }
}

impl From<EncryptedVote> for Vote {
    fn from(vote: EncryptedVote) -> Self {
        Vote::Encrypted(vote)
    }
}

/// Encrypt the 2-byte big-endian encoding of an option index
pub fn encrypt_vote_index(key: &ElectionPublicKey, index: u16) -> Result<String, Error> {
    let cipher_text = key.encrypt(&index.to_be_bytes())?;
    Ok(encode_b64(&cipher_text))
}

pub fn decrypt_vote_index(secret: &ElectionSecretKey, encoded: &str) -> Result<u16, Error> {
    let cipher_text = decode_b64(encoded)?;
    let plain = secret.decrypt(&cipher_text)?;
    if plain.len() != 2 {
        return Err(Error::InvalidCiphertext);
    }
    Ok(u16::from_be_bytes([plain[0], plain[1]]))
}

/// `election/cast_vote`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CastVote {
    pub lao: Hash,
    pub election: Hash,
    pub created_at: i64,
    pub votes: Vec<Vote>,
}

/// A cast-vote message accepted by an election
#[derive(Clone, Debug)]
pub struct RegisteredVote {
    pub created_at: i64,
    pub sender: PublicKey,
    pub votes: Vec<Vote>,
    pub message_id: Hash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_ids() {
        let election = Hash::from_strings(&["Election", "L", "1000", "E"]);
        let question = Hash::from("Q");

        let vote = PlainVote::new(&election, &question, 0);
        assert_eq!(vote.id, Hash::from_strings(&["Vote", election.as_str(), "Q", "0"]));
        assert_eq!(vote.expected_id(&election, false), vote.id);

        let write_in = PlainVote::with_write_in(&election, &question, 0, "Alice");
        assert_eq!(write_in.expected_id(&election, true), write_in.id);
        assert_ne!(write_in.expected_id(&election, false), write_in.id);
    }

    #[test]
    fn test_untagged_votes() {
        let plain: Vote = serde_json::from_value(serde_json::json!({
            "id": "a", "question": "q", "vote": 1
        }))
        .unwrap();
        assert!(matches!(plain, Vote::Plain(PlainVote { vote: 1, .. })));

        let encrypted: Vote = serde_json::from_value(serde_json::json!({
            "id": "a", "question": "q", "vote": "AAAA"
        }))
        .unwrap();
        assert!(matches!(encrypted, Vote::Encrypted(_)));
    }

    #[test]
    fn test_encrypted_vote_index() {
        let keypair = ElectionKeyPair::generate();
        let election = Hash::from("E");
        let question = Hash::from("Q");

        let vote = EncryptedVote::encrypt(&election, &question, 258, &keypair.public).unwrap();
        assert_eq!(vote.expected_id(&election), vote.id);
        assert_eq!(decode_b64(&vote.vote).unwrap().len(), CIPHERTEXT_LENGTH);
        assert_eq!(vote.decrypt(&keypair.secret).unwrap(), 258);
    }
}
