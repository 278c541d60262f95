//! [`Contract`]-related handlers.

use axum::{extract::Path, Json};
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, contract, property, user},
    query,
};

use crate::{api, define_error, AsError, Context, Error};

/// A [`domain::Contract`] of the system, as exposed over the HTTP API.
#[derive(Clone, Debug, Serialize)]
pub struct Contract {
    /// ID of this [`Contract`].
    pub id: contract::Id,

    /// ID of the `Property` being rented out.
    pub property_id: property::Id,

    /// ID of the `User` renting out the `Property`.
    pub landlord_id: user::Id,

    /// ID of the tenant `User`, once linked to an account.
    pub tenant_id: Option<user::Id>,

    /// Email address of the tenant, while no account is linked.
    pub tenant_email: Option<String>,

    /// Monthly rent of this [`Contract`] (e.g. `950000COP`).
    pub rent: String,

    /// Deposit of this [`Contract`], if any.
    pub deposit: Option<String>,

    /// Day of month (1..=28) the rent is due.
    pub payment_day: contract::PaymentDay,

    /// Legal clauses of this [`Contract`].
    pub clauses: String,

    /// Status of this [`Contract`].
    pub status: contract::Status,

    /// [RFC 3339] timestamp of the tenant signature, if recorded.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub signed_by_tenant_at: Option<String>,

    /// [RFC 3339] timestamp of the landlord signature, if recorded.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub signed_by_landlord_at: Option<String>,

    /// [RFC 3339] timestamp of when this [`Contract`] was created.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub created_at: String,

    /// [RFC 3339] timestamp of when this [`Contract`] was archived, if it
    /// was.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub archived_at: Option<String>,
}

impl From<domain::Contract> for Contract {
    fn from(contract: domain::Contract) -> Self {
        let (tenant_id, tenant_email) = match contract.tenant {
            contract::Party::User(id) => (Some(id), None),
            contract::Party::Email(email) => (None, Some(email.to_string())),
        };

        Self {
            id: contract.id,
            property_id: contract.property_id,
            landlord_id: contract.landlord_id,
            tenant_id,
            tenant_email,
            rent: contract.rent.to_string(),
            deposit: contract.deposit.map(|d| d.to_string()),
            payment_day: contract.payment_day,
            clauses: contract.clauses.to_string(),
            status: contract.status,
            signed_by_tenant_at: contract
                .signed_by_tenant_at
                .map(|at| at.to_rfc3339()),
            signed_by_landlord_at: contract
                .signed_by_landlord_at
                .map(|at| at.to_rfc3339()),
            created_at: contract.created_at.to_rfc3339(),
            archived_at: contract.archived_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// Request of creating a new [`Contract`].
#[derive(Clone, Debug, Deserialize)]
pub struct CreateContractRequest {
    /// ID of the `Property` to be rented out.
    pub property_id: property::Id,

    /// ID of the tenant `User`, if they have an account already.
    pub tenant_id: Option<user::Id>,

    /// Email address of the tenant, if they have no account yet.
    pub tenant_email: Option<String>,

    /// Monthly rent of the new [`Contract`] (e.g. `950000COP`).
    pub rent: String,

    /// Deposit of the new [`Contract`], if any.
    pub deposit: Option<String>,

    /// Day of month (1..=28) the rent is due.
    pub payment_day: contract::PaymentDay,

    /// Legal clauses of the new [`Contract`].
    pub clauses: String,
}

/// Creates a new draft [`Contract`] for a `Property` owned by the
/// authenticated `User`.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `INVALID_ARGUMENT` - one of the provided fields is malformed;
/// - `INVALID_TENANT` - not exactly one of `tenant_id` and `tenant_email` is
///                      provided;
/// - `NOT_OWNER` - the authenticated `User` does not own the `Property`;
/// - `PROPERTY_NOT_AVAILABLE` - the `Property` is not available for rent;
/// - `PROPERTY_NOT_FOUND` - no `Property` exists with the provided ID;
/// - `TENANT_NOT_FOUND` - no `User` exists with the provided `tenant_id`.
#[tracing::instrument(skip_all, fields(http.route = "/contracts"))]
pub async fn create(
    ctx: Context,
    Json(req): Json<CreateContractRequest>,
) -> Result<Json<Contract>, Error> {
    let my_id = ctx.current_session().await?.user_id;

    let CreateContractRequest {
        property_id,
        tenant_id,
        tenant_email,
        rent,
        deposit,
        payment_day,
        clauses,
    } = req;

    let tenant = match (tenant_id, tenant_email) {
        (Some(id), None) => contract::Party::User(id),
        (None, Some(email)) => {
            contract::Party::Email(api::parse(&email)?)
        }
        (Some(_), Some(_)) | (None, None) => {
            return Err(TenantError::Invalid.into());
        }
    };

    ctx.service()
        .execute(command::CreateContract {
            property_id,
            tenant,
            rent: api::parse(&rent)?,
            deposit: deposit.as_deref().map(api::parse).transpose()?,
            payment_day,
            clauses: api::parse(&clauses)?,
            initiator_id: my_id,
        })
        .await
        .map_err(AsError::into_error)
        .map(|c| Json(c.into()))
}

/// Returns the [`Contract`] with the provided ID.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `CONTRACT_NOT_FOUND` - no `Contract` exists with the provided ID.
#[tracing::instrument(skip_all, fields(http.route = "/contracts/:id"))]
pub async fn get(
    ctx: Context,
    Path(id): Path<contract::Id>,
) -> Result<Json<Contract>, Error> {
    drop(ctx.current_session().await?);

    ctx.service()
        .execute(query::contract::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .map(|c| Json(c.into()))
        .ok_or_else(|| QueryError::NotFound.into())
}

/// Request of signing a [`Contract`].
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SignContractRequest {
    /// Role the authenticated `User` signs as.
    pub role: contract::Role,
}

/// Signs the [`Contract`] with the provided ID as the authenticated `User`.
///
/// # Errors
///
/// Possible error codes:
/// - `ALREADY_SIGNED` - the `Contract` already carries this signature;
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `CONTRACT_NOT_FOUND` - no `Contract` exists with the provided ID;
/// - `CONTRACT_NOT_SIGNABLE` - the `Contract` is not collecting signatures;
/// - `NOT_SIGNER` - the authenticated `User` is not the requested party;
/// - `TENANT_SIGNATURE_MISSING` - the landlord tried to sign before the
///                                tenant.
#[tracing::instrument(skip_all, fields(http.route = "/contracts/:id/sign"))]
pub async fn sign(
    ctx: Context,
    Path(id): Path<contract::Id>,
    Json(req): Json<SignContractRequest>,
) -> Result<Json<Contract>, Error> {
    let my_id = ctx.current_session().await?.user_id;

    ctx.service()
        .execute(command::SignContract {
            contract_id: id,
            role: req.role,
            initiator_id: my_id,
        })
        .await
        .map_err(AsError::into_error)
        .map(|c| Json(c.into()))
}

/// Request of transitioning a [`Contract`] between statuses.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct UpdateContractStatusRequest {
    /// Status to transition the [`Contract`] into.
    pub status: contract::Status,
}

/// Moves the [`Contract`] with the provided ID into the requested status.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `CONTRACT_NOT_FOUND` - no `Contract` exists with the provided ID;
/// - `INVALID_TRANSITION` - the requested status transition is not allowed;
/// - `NOT_LANDLORD` - the authenticated `User` is not the landlord of the
///                    `Contract`.
#[tracing::instrument(skip_all, fields(http.route = "/contracts/:id/status"))]
pub async fn update_status(
    ctx: Context,
    Path(id): Path<contract::Id>,
    Json(req): Json<UpdateContractStatusRequest>,
) -> Result<Json<Contract>, Error> {
    let my_id = ctx.current_session().await?.user_id;

    ctx.service()
        .execute(command::UpdateContractStatus {
            contract_id: id,
            status: req.status,
            initiator_id: my_id,
        })
        .await
        .map_err(AsError::into_error)
        .map(|c| Json(c.into()))
}

define_error! {
    enum QueryError {
        #[code = "CONTRACT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Contract` with the provided ID does not exist"]
        NotFound,
    }
}

define_error! {
    enum TenantError {
        #[code = "INVALID_TENANT"]
        #[status = BAD_REQUEST]
        #[message = "Exactly one of `tenant_id` and `tenant_email` must be \
                     provided"]
        Invalid,
    }
}

impl AsError for command::create_contract::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "PROPERTY_NOT_AVAILABLE"]
                #[status = CONFLICT]
                #[message = "`Property` with the provided ID is not \
                             available for rent"]
                PropertyNotAvailable,

                #[code = "PROPERTY_NOT_FOUND"]
                #[status = NOT_FOUND]
                #[message = "`Property` with the provided ID does not exist"]
                PropertyNotExists,

                #[code = "TENANT_NOT_FOUND"]
                #[status = NOT_FOUND]
                #[message = "`User` with the provided tenant ID does not \
                             exist"]
                TenantNotExists,

                #[code = "NOT_OWNER"]
                #[status = FORBIDDEN]
                #[message = "Authenticated `User` does not own the `Property`"]
                UserNotOwner,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::PropertyNotAvailable(_) => Error::PropertyNotAvailable.into(),
            Self::PropertyNotExists(_) => Error::PropertyNotExists.into(),
            Self::TenantNotExists(_) => Error::TenantNotExists.into(),
            Self::UserNotExists(_) => return None,
            Self::UserNotOwner(_) => Error::UserNotOwner.into(),
        })
    }
}

impl AsError for command::sign_contract::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "ALREADY_SIGNED"]
                #[status = CONFLICT]
                #[message = "`Contract` with the provided ID already carries \
                             this signature"]
                ContractAlreadySigned,

                #[code = "CONTRACT_NOT_FOUND"]
                #[status = NOT_FOUND]
                #[message = "`Contract` with the provided ID does not exist"]
                ContractNotExists,

                #[code = "CONTRACT_NOT_SIGNABLE"]
                #[status = CONFLICT]
                #[message = "`Contract` with the provided ID is not \
                             collecting signatures"]
                ContractNotSignable,

                #[code = "TENANT_SIGNATURE_MISSING"]
                #[status = CONFLICT]
                #[message = "`Contract` cannot be countersigned before the \
                             tenant signs"]
                TenantSignatureMissing,

                #[code = "NOT_SIGNER"]
                #[status = FORBIDDEN]
                #[message = "Authenticated `User` is not a signer of the \
                             `Contract`"]
                UserNotSigner,
            }
        }

        Some(match self {
            Self::ContractAlreadySigned(_) => {
                Error::ContractAlreadySigned.into()
            }
            Self::ContractNotExists(_) => Error::ContractNotExists.into(),
            Self::ContractNotSignable(_) => Error::ContractNotSignable.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::PropertyNotExists(_) | Self::UserNotExists(_) => return None,
            Self::TenantSignatureMissing(_) => {
                Error::TenantSignatureMissing.into()
            }
            Self::UserNotSigner(_) => Error::UserNotSigner.into(),
        })
    }
}

impl AsError for command::update_contract_status::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "CONTRACT_NOT_FOUND"]
                #[status = NOT_FOUND]
                #[message = "`Contract` with the provided ID does not exist"]
                ContractNotExists,

                #[code = "INVALID_TRANSITION"]
                #[status = CONFLICT]
                #[message = "Requested `Contract` status transition is not \
                             allowed"]
                InvalidTransition,

                #[code = "NOT_LANDLORD"]
                #[status = FORBIDDEN]
                #[message = "Authenticated `User` is not the landlord of the \
                             `Contract`"]
                UserNotLandlord,
            }
        }

        Some(match self {
            Self::ContractNotExists(_) => Error::ContractNotExists.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidTransition { .. } => Error::InvalidTransition.into(),
            Self::PropertyNotExists(_) | Self::UserNotExists(_) => return None,
            Self::UserNotLandlord(_) => Error::UserNotLandlord.into(),
        })
    }
}
