#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

#[macro_use]
mod error;

mod config;
mod decryption;
mod elgamal;
mod exponentiation;
mod generation;
mod group;
mod hash;
mod kdf;
mod keys;
mod message;
mod node;
mod payload;
mod serde_hex;
mod signature;
mod state;
mod store;
mod validator;
mod zkp;

pub mod keystore;
pub mod serde_decimal;

pub use config::*;
pub use decryption::*;
pub use elgamal::*;
pub use error::*;
pub use exponentiation::*;
pub use generation::*;
pub use group::*;
pub use hash::*;
pub use kdf::*;
pub use keys::*;
pub use message::*;
pub use node::*;
pub use payload::*;
pub use serde_hex::*;
pub use signature::*;
pub use state::*;
pub use store::*;
pub use validator::*;
pub use zkp::*;

#[cfg(test)]
mod testing;
