//! [`CleanArchivedContracts`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Delete, Perform, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{contract, Contract},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`CleanArchivedContracts`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between archived [`Contract`]s cleaning.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,

    /// Period an archived [`Contract`] is retained for before deletion.
    #[default(time::Duration::from_secs(15 * 24 * 60 * 60))]
    pub retention: time::Duration,
}

/// [`Task`] for deleting archived [`Contract`]s past their retention period.
#[derive(Clone, Copy, Debug)]
pub struct CleanArchivedContracts<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<CleanArchivedContracts<Self>, Config>>> for Service<Db>
where
    CleanArchivedContracts<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CleanArchivedContracts<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CleanArchivedContracts {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::CleanArchivedContracts` failed: {e}");
            });
        }
    }
}

impl<Db> Task<Perform<()>> for CleanArchivedContracts<Service<Db>>
where
    Db: Database<
        Delete<By<Contract, contract::ArchivalDateTime>>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline =
            contract::ArchivalDateTime::now() - self.config.retention;
        self.service
            .database()
            .execute(Delete(By::new(deadline)))
            .await
            .map_err(tracerr::map_from_and_wrap!())
    }
}

/// Error of [`CleanArchivedContracts`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time;

    use common::{
        operations::{By, Commit, Insert, Perform, Select, Transact},
        money, DateTime, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        domain::{contract, property, user, Contract},
        infra::{Database as _, InMemory},
        task, Config, Service, Task as _,
    };

    use super::CleanArchivedContracts;

    fn contract(archived_secs_ago: Option<u64>) -> Contract {
        Contract {
            id: contract::Id::new(),
            property_id: property::Id::new(),
            landlord_id: user::Id::new(),
            tenant: contract::Party::User(user::Id::new()),
            rent: Money {
                amount: Decimal::new(950_000, 0),
                currency: money::Currency::Cop,
            },
            deposit: None,
            payment_day: contract::PaymentDay::new(5).unwrap(),
            clauses: contract::Clauses::new("No subletting.").unwrap(),
            status: archived_secs_ago
                .map_or(contract::Status::Finished, |_| {
                    contract::Status::Archived
                }),
            signed_by_tenant_at: None,
            signed_by_landlord_at: None,
            created_at: DateTime::now().coerce(),
            archived_at: archived_secs_ago.map(|secs| {
                (DateTime::now() - time::Duration::from_secs(secs)).coerce()
            }),
        }
    }

    async fn insert(db: &InMemory, contract: Contract) {
        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(contract)).await.unwrap();
        tx.execute(Commit).await.unwrap();
    }

    async fn exists(db: &InMemory, id: contract::Id) -> bool {
        db.execute(Select(By::<Option<Contract>, _>::new(id)))
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn deletes_only_expired_archived_contracts() {
        let db = InMemory::default();
        let service = Service {
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
            database: db.clone(),
        };

        const DAY: u64 = 24 * 60 * 60;
        let expired = contract(Some(16 * DAY));
        let recent = contract(Some(2 * DAY));
        let finished = contract(None);
        for c in [expired.clone(), recent.clone(), finished.clone()] {
            insert(&db, c).await;
        }

        let task = CleanArchivedContracts {
            config: service.config().clean_archived_contracts,
            service: service.clone(),
        };
        task.execute(Perform(())).await.unwrap();

        assert!(!exists(&db, expired.id).await);
        assert!(exists(&db, recent.id).await);
        assert!(exists(&db, finished.id).await);
    }
}
