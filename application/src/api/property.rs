//! [`Property`]-related handlers.

use axum::{extract::Path, Json};
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, property, user},
    query,
};

use crate::{api, define_error, AsError, Context, Error};

/// A [`domain::Property`] of the system, as exposed over the HTTP API.
#[derive(Clone, Debug, Serialize)]
pub struct Property {
    /// ID of this [`Property`].
    pub id: property::Id,

    /// ID of the `User` owning this [`Property`].
    pub landlord_id: user::Id,

    /// Address of this [`Property`].
    pub address: String,

    /// City this [`Property`] is located in.
    pub city: String,

    /// Description of this [`Property`], if any.
    pub description: Option<String>,

    /// Status of this [`Property`].
    pub status: property::Status,

    /// [RFC 3339] timestamp of when this [`Property`] was created.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub created_at: String,
}

impl From<domain::Property> for Property {
    fn from(property: domain::Property) -> Self {
        Self {
            id: property.id,
            landlord_id: property.landlord_id,
            address: property.address.to_string(),
            city: property.city.to_string(),
            description: property.description.map(|d| d.to_string()),
            status: property.status,
            created_at: property.created_at.to_rfc3339(),
        }
    }
}

/// Request of creating a new [`Property`].
#[derive(Clone, Debug, Deserialize)]
pub struct CreatePropertyRequest {
    /// Address of the new [`Property`].
    pub address: String,

    /// City of the new [`Property`].
    pub city: String,

    /// Description of the new [`Property`], if any.
    pub description: Option<String>,
}

/// Creates a new [`Property`] owned by the authenticated `User`.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `INVALID_ARGUMENT` - one of the provided fields is malformed.
#[tracing::instrument(skip_all, fields(http.route = "/properties"))]
pub async fn create(
    ctx: Context,
    Json(req): Json<CreatePropertyRequest>,
) -> Result<Json<Property>, Error> {
    let my_id = ctx.current_session().await?.user_id;

    let CreatePropertyRequest {
        address,
        city,
        description,
    } = req;

    ctx.service()
        .execute(command::CreateProperty {
            address: api::parse(&address)?,
            city: api::parse(&city)?,
            description: description.as_deref().map(api::parse).transpose()?,
            initiator_id: my_id,
        })
        .await
        .map_err(AsError::into_error)
        .map(|p| Json(p.into()))
}

/// Returns the [`Property`] with the provided ID.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `PROPERTY_NOT_FOUND` - no `Property` exists with the provided ID.
#[tracing::instrument(skip_all, fields(http.route = "/properties/:id"))]
pub async fn get(
    ctx: Context,
    Path(id): Path<property::Id>,
) -> Result<Json<Property>, Error> {
    drop(ctx.current_session().await?);

    ctx.service()
        .execute(query::property::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .map(|p| Json(p.into()))
        .ok_or_else(|| QueryError::NotFound.into())
}

define_error! {
    enum QueryError {
        #[code = "PROPERTY_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Property` with the provided ID does not exist"]
        NotFound,
    }
}

impl AsError for command::create_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => None,
        }
    }
}
