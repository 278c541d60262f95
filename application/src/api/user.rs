//! [`User`]-related handlers.

use axum::{extract::Path, Json};
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, user},
    query,
};

use crate::{api, define_error, AsError, Context, Error};

/// A [`domain::User`] of the system, as exposed over the HTTP API.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    /// ID of this [`User`].
    pub id: user::Id,

    /// Name of this [`User`].
    pub name: String,

    /// Email address of this [`User`].
    pub email: String,

    /// Phone number of this [`User`], if any.
    pub phone: Option<String>,

    /// [RFC 3339] timestamp of when this [`User`] was created.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub created_at: String,
}

impl From<domain::User> for User {
    fn from(user: domain::User) -> Self {
        Self {
            id: user.id,
            name: user.name.to_string(),
            email: user.email.to_string(),
            phone: user.phone.map(|p| p.to_string()),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Request of creating a new [`User`].
#[derive(Clone, Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Name of the new [`User`].
    pub name: String,

    /// Email address of the new [`User`].
    pub email: String,

    /// Password of the new [`User`].
    pub password: String,

    /// Phone number of the new [`User`], if any.
    pub phone: Option<String>,
}

/// Creates a new [`User`].
///
/// # Errors
///
/// Possible error codes:
/// - `EMAIL_OCCUPIED` - the provided email address is used by another `User`;
/// - `INVALID_ARGUMENT` - one of the provided fields is malformed.
#[tracing::instrument(skip_all, fields(http.route = "/users"))]
pub async fn create(
    ctx: Context,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, Error> {
    let CreateUserRequest {
        name,
        email,
        password,
        phone,
    } = req;

    ctx.service()
        .execute(command::CreateUser {
            name: api::parse(&name)?,
            email: api::parse(&email)?,
            password: SecretBox::new(Box::new(api::parse(&password)?)),
            phone: phone.as_deref().map(api::parse).transpose()?,
        })
        .await
        .map_err(AsError::into_error)
        .map(|u| Json(u.into()))
}

/// Returns the [`User`] with the provided ID.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
/// - `USER_NOT_FOUND` - no `User` exists with the provided ID.
#[tracing::instrument(skip_all, fields(http.route = "/users/:id"))]
pub async fn get(
    ctx: Context,
    Path(id): Path<user::Id>,
) -> Result<Json<User>, Error> {
    drop(ctx.current_session().await?);

    ctx.service()
        .execute(query::user::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .map(|u| Json(u.into()))
        .ok_or_else(|| QueryError::NotFound.into())
}

define_error! {
    enum QueryError {
        #[code = "USER_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`User` with the provided ID does not exist"]
        NotFound,
    }
}

/// Request of creating a new [`Session`].
///
/// [`Session`]: crate::Session
#[derive(Clone, Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Email address of the [`User`] to authenticate.
    pub email: String,

    /// Password of the [`User`] to authenticate.
    pub password: String,
}

/// A newly created [`Session`], as exposed over the HTTP API.
///
/// [`Session`]: crate::Session
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    /// Authentication token of this [`Session`].
    ///
    /// [`Session`]: crate::Session
    pub token: String,

    /// [`User`] this [`Session`] belongs to.
    ///
    /// [`Session`]: crate::Session
    pub user: User,

    /// [RFC 3339] timestamp of when this [`Session`] expires.
    ///
    /// [`Session`]: crate::Session
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub expires_at: String,
}

/// Creates a new [`Session`] by the provided [`User`] credentials.
///
/// # Errors
///
/// Possible error codes:
/// - `WRONG_CREDENTIALS` - the provided credentials do not match any `User`;
/// - `INVALID_ARGUMENT` - one of the provided fields is malformed.
///
/// [`Session`]: crate::Session
#[tracing::instrument(skip_all, fields(http.route = "/session"))]
pub async fn create_session(
    ctx: Context,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>, Error> {
    let CreateSessionRequest { email, password } = req;

    ctx.service()
        .execute(command::CreateUserSession::ByCredentials {
            email: api::parse(&email)?,
            password: SecretBox::new(Box::new(api::parse(&password)?)),
        })
        .await
        .map_err(AsError::into_error)
        .map(|out| {
            Json(Session {
                token: out.token.to_string(),
                user: out.user.into(),
                expires_at: out.expires_at.to_rfc3339(),
            })
        })
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "EMAIL_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "Email address is occupied by another `User`"]
                EmailOccupied,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmailOccupied(_) => Some(Error::EmailOccupied.into()),
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = FORBIDDEN]
                #[message = "Provided credentials does not match any `User`"]
                WrongCredentials,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenEncodeError(_) => None,
            Self::UserNotExists(_) | Self::WrongCredentials => {
                Some(Error::WrongCredentials.into())
            }
        }
    }
}
