#[macro_use]
extern crate serde;

mod channel;
mod config;
mod data;
mod election;
mod elgamal;
mod error;
mod hash;
mod lao;
mod ledger;
mod meeting;
mod message;
mod network;
mod node;
mod registry;
mod roll_call;
mod serde_b64;
mod social;
mod store;
mod tally;
mod transaction;
mod util;
mod vote;
mod witness;

pub use channel::*;
pub use config::*;
pub use data::*;
pub use election::*;
pub use elgamal::*;
pub use error::*;
pub use hash::*;
pub use lao::*;
pub use ledger::*;
pub use meeting::*;
pub use message::*;
pub use network::*;
pub use node::*;
pub use registry::*;
pub use roll_call::*;
pub use serde_b64::*;
pub use social::*;
pub use store::*;
pub use tally::*;
pub use transaction::*;
pub use util::*;
pub use vote::*;
pub use witness::*;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod tests;
