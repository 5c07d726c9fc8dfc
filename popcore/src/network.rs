use crate::*;
use std::collections::BTreeSet;

/// The transport a node publishes to and subscribes through
pub trait Network {
    /// Fire-and-forget publication of a message on a channel
    fn publish(&mut self, channel: &Channel, message: Message) -> Result<(), Error>;

    fn subscribe(&mut self, channel: &Channel) -> Result<(), Error>;
}

/// A network that records outbound traffic instead of sending it
#[derive(Default, Debug)]
pub struct RecordingNetwork {
    pub published: Vec<(Channel, Message)>,
    pub subscriptions: BTreeSet<Channel>,
}

impl RecordingNetwork {
    /// Drain everything published so far
    pub fn take_published(&mut self) -> Vec<(Channel, Message)> {
        std::mem::take(&mut self.published)
    }
}

impl Network for RecordingNetwork {
    fn publish(&mut self, channel: &Channel, message: Message) -> Result<(), Error> {
        self.published.push((channel.clone(), message));
        Ok(())
    }

    fn subscribe(&mut self, channel: &Channel) -> Result<(), Error> {
        self.subscriptions.insert(channel.clone());
        Ok(())
    }
}
