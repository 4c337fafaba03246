//! Types shared between the vault client and anything speaking its wire contract.

pub mod domain;
pub mod error;
pub mod protocol;
