//! Background [`Task`]s definitions.

mod background;
pub mod clean_archived_contracts;

pub use common::Handler as Task;

pub use self::{
    background::Background, clean_archived_contracts::CleanArchivedContracts,
};
