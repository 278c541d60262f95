//! Domain definitions.

pub mod contract;
pub mod property;
pub mod user;

pub use self::{contract::Contract, property::Property, user::User};
