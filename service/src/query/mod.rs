//! [`Query`] definition.

pub mod contract;
pub mod property;
pub mod user;

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    Service,
};

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::CreateUser,
        domain::user,
        infra::InMemory,
        task, Config, Query as _, Service,
    };

    fn service() -> Service<InMemory> {
        Service {
            config: Config {
                jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                    b"0123456789abcdef",
                ),
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    b"0123456789abcdef",
                ),
                clean_archived_contracts:
                    task::clean_archived_contracts::Config::default(),
            },
            database: InMemory::default(),
        }
    }

    #[tokio::test]
    async fn resolves_a_user_by_id() {
        let svc = service();
        let created = svc
            .execute(CreateUser {
                name: user::Name::new("Ana Maria").unwrap(),
                email: user::Email::new("ana@example.com").unwrap(),
                password: SecretBox::new(Box::new(
                    user::Password::new("s3cr3t").unwrap(),
                )),
                phone: None,
            })
            .await
            .unwrap();

        let found = svc
            .execute(super::user::ById::by(created.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, created.email);

        let missing = svc
            .execute(super::user::ById::by(user::Id::new()))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
