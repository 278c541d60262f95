//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_contract;
pub mod create_property;
pub mod create_user;
pub mod create_user_session;
pub mod sign_contract;
pub mod update_contract_status;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession,
    create_contract::CreateContract, create_property::CreateProperty,
    create_user::CreateUser, create_user_session::CreateUserSession,
    sign_contract::SignContract,
    update_contract_status::UpdateContractStatus,
};
