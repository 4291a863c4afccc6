#[macro_use]
extern crate serde;

mod bigint;
mod certificate;
mod ciphertext;
mod decryption;
mod error;
mod keys;
mod layer;
mod log;
mod message;
mod proof;
mod race;
mod serde_hex;
mod sexp;

pub use bigint::*;
pub use certificate::*;
pub use ciphertext::*;
pub use decryption::*;
pub use error::*;
pub use keys::*;
pub use layer::*;
pub use log::*;
pub use message::*;
pub use proof::*;
pub use race::*;
pub use serde_hex::*;
pub use sexp::*;

#[cfg(test)]
mod tests;
