use crate::*;
use std::fmt;

pub const ROOT_CHANNEL: &str = "/root";

/// Sub-channel carrying digital cash transactions of a LAO
pub const COIN_SUFFIX: &str = "coin";

/// Sub-channel prefix carrying social media messages of a LAO
pub const SOCIAL_SUFFIX: &str = "social";

/// A publish/subscribe channel path, eg. `/root/<lao_id>/<election_id>`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Channel(path.into())
    }

    pub fn root() -> Self {
        Channel(ROOT_CHANNEL.to_owned())
    }

    /// The main channel of a LAO
    pub fn lao(lao_id: &Hash) -> Self {
        Channel(format!("{}/{}", ROOT_CHANNEL, lao_id))
    }

    /// The channel of a LAO event such as an election
    pub fn event(lao_id: &Hash, event_id: &Hash) -> Self {
        Channel(format!("{}/{}/{}", ROOT_CHANNEL, lao_id, event_id))
    }

    pub fn coin(lao_id: &Hash) -> Self {
        Channel(format!("{}/{}/{}", ROOT_CHANNEL, lao_id, COIN_SUFFIX))
    }

    pub fn social(lao_id: &Hash, suffix: &str) -> Self {
        Channel(format!("{}/{}/{}/{}", ROOT_CHANNEL, lao_id, SOCIAL_SUFFIX, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// The LAO this channel belongs to, None for the root channel or foreign paths
    pub fn lao_id(&self) -> Option<Hash> {
        let segments = self.segments();
        match segments.as_slice() {
            ["root", lao, ..] => Some(Hash::from(*lao)),
            _ => None,
        }
    }

    /// True for the channel `/root/<lao>` itself (not its sub-channels)
    pub fn is_lao_channel(&self) -> bool {
        matches!(self.segments().as_slice(), ["root", _])
    }

    /// True for any channel below `/root/<lao>`, including it
    pub fn is_lao_scoped(&self) -> bool {
        self.lao_id().is_some()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.segments().as_slice(), ["root"])
    }

    /// The trailing path segment, eg. the election id of an election channel
    pub fn last_segment(&self) -> Option<&str> {
        self.0.rsplit('/').find(|s| !s.is_empty())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Channel(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_paths() {
        let lao = Hash::from("lao");
        let election = Hash::from("election");

        let root = Channel::root();
        assert!(root.is_root());
        assert!(root.lao_id().is_none());
        assert!(!root.is_lao_scoped());

        let lao_channel = Channel::lao(&lao);
        assert_eq!(lao_channel.as_str(), "/root/lao");
        assert!(lao_channel.is_lao_channel());
        assert_eq!(lao_channel.lao_id(), Some(lao.clone()));

        let election_channel = Channel::event(&lao, &election);
        assert!(!election_channel.is_lao_channel());
        assert!(election_channel.is_lao_scoped());
        assert_eq!(election_channel.lao_id(), Some(lao.clone()));
        assert_eq!(election_channel.last_segment(), Some("election"));

        assert_eq!(Channel::coin(&lao).as_str(), "/root/lao/coin");
        assert!(Channel::from("/other/lao").lao_id().is_none());
    }
}
