//! [`InMemory`] [`Database`] implementation.
//!
//! Transactions take an exclusive async lock over the whole store and stage
//! their writes on a copy of its state, applying them on [`Commit`]. This
//! makes every transaction serializable by construction, which is exactly
//! the guarantee the signature workflow requires of its store.

use std::{collections::HashMap, sync::Arc};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Transact, Update,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{contract, property, user, Contract, Property, User},
    infra::database,
};

/// Database operation.
use common::Handler as Database;

/// In-memory [`Database`] client.
///
/// Intended for tests and local runs without a PostgreSQL instance.
#[derive(Clone, Debug, Default)]
pub struct InMemory {
    /// Shared state of this [`InMemory`] database.
    state: Arc<Mutex<State>>,
}

/// State of an [`InMemory`] database.
#[derive(Clone, Debug, Default)]
struct State {
    /// Stored [`Contract`]s.
    contracts: HashMap<contract::Id, Contract>,

    /// Stored [`Property`]s.
    properties: HashMap<property::Id, Property>,

    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,
}

/// Transactional [`InMemory`] database client.
#[derive(Clone, Debug)]
pub struct InMemoryTx {
    /// Inner representation of this client.
    inner: Arc<Mutex<Inner>>,
}

/// Inner representation of the [`InMemoryTx`] client.
#[derive(Debug)]
struct Inner {
    /// Guard holding the store exclusively for the transaction's lifetime.
    guard: Option<OwnedMutexGuard<State>>,

    /// Copy of the state the transaction's reads and writes operate on.
    staged: Option<State>,
}

impl InMemoryTx {
    /// Runs the provided function over the staged [`State`].
    async fn staged<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let inner = self.inner.lock().await;
        f(inner.staged.as_ref().expect("transaction already committed"))
    }

    /// Runs the provided function over the staged [`State`] mutably.
    async fn staged_mut<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut inner = self.inner.lock().await;
        f(inner.staged.as_mut().expect("transaction already committed"))
    }
}

impl Database<Transact> for InMemory {
    type Ok = InMemoryTx;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx {
            inner: Arc::new(Mutex::new(Inner {
                guard: Some(guard),
                staged: Some(staged),
            })),
        })
    }
}

impl Database<Transact> for InMemoryTx {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        let mut inner = self.inner.lock().await;
        let staged =
            inner.staged.take().expect("transaction already committed");
        let mut guard =
            inner.guard.take().expect("transaction already committed");
        *guard = staged;
        Ok(())
    }
}

impl Database<Select<By<Option<Contract>, contract::Id>>> for InMemory {
    type Ok = Option<Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Contract>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.lock().await.contracts.get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<Option<Contract>, contract::Id>>> for InMemoryTx {
    type Ok = Option<Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Contract>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.staged(|s| s.contracts.get(&id).cloned()).await)
    }
}

impl Database<Select<By<Option<Property>, property::Id>>> for InMemory {
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.lock().await.properties.get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<Option<Property>, property::Id>>> for InMemoryTx {
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.staged(|s| s.properties.get(&id).cloned()).await)
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for InMemory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.lock().await.users.get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for InMemoryTx {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.staged(|s| s.users.get(&id).cloned()).await)
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Email>>> for InMemory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == *email && u.deleted_at.is_none())
            .cloned())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Email>>> for InMemoryTx {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .staged(|s| {
                s.users
                    .values()
                    .find(|u| u.email == *email && u.deleted_at.is_none())
                    .cloned()
            })
            .await)
    }
}

impl Database<Insert<Contract>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(contract): Insert<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        self.staged_mut(|s| {
            drop(s.contracts.insert(contract.id, contract));
        })
        .await;
        Ok(())
    }
}

impl Database<Update<Contract>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(contract): Update<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        self.staged_mut(|s| {
            drop(s.contracts.insert(contract.id, contract));
        })
        .await;
        Ok(())
    }
}

impl Database<Insert<Property>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.staged_mut(|s| {
            drop(s.properties.insert(property.id, property));
        })
        .await;
        Ok(())
    }
}

impl Database<Update<Property>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(property): Update<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.staged_mut(|s| {
            drop(s.properties.insert(property.id, property));
        })
        .await;
        Ok(())
    }
}

impl Database<Insert<User>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.staged_mut(|s| {
            drop(s.users.insert(user.id, user));
        })
        .await;
        Ok(())
    }
}

impl Database<Lock<By<Contract, contract::Id>>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Contract, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // The transaction already holds the whole store exclusively.
        Ok(())
    }
}

impl Database<Lock<By<Property, property::Id>>> for InMemoryTx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // The transaction already holds the whole store exclusively.
        Ok(())
    }
}

impl Database<Delete<By<Contract, contract::ArchivalDateTime>>> for InMemory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Contract, contract::ArchivalDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        self.state.lock().await.contracts.retain(|_, c| {
            c.status != contract::Status::Archived
                || c.archived_at.map_or(true, |at| at > deadline)
        });
        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Commit, Insert, Select, Transact},
        DateTime,
    };

    use crate::domain::{property, user, Property};

    use super::{Database as _, InMemory};

    fn property(id: property::Id) -> Property {
        Property {
            id,
            landlord_id: user::Id::new(),
            address: property::Address::new("Calle 10 #43-12").unwrap(),
            city: property::City::new("Medellin").unwrap(),
            description: None,
            status: property::Status::Available,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn commit_publishes_staged_writes() {
        let db = InMemory::default();
        let id = property::Id::new();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(property(id))).await.unwrap();

        // The transaction sees its own write.
        let staged: Option<Property> =
            tx.execute(Select(By::new(id))).await.unwrap();
        assert!(staged.is_some());

        tx.execute(Commit).await.unwrap();

        let committed: Option<Property> =
            db.execute(Select(By::new(id))).await.unwrap();
        assert!(committed.is_some());
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let db = InMemory::default();
        let id = property::Id::new();

        {
            let tx = db.execute(Transact).await.unwrap();
            tx.execute(Insert(property(id))).await.unwrap();
            // Dropped without `Commit`.
        }

        let committed: Option<Property> =
            db.execute(Select(By::new(id))).await.unwrap();
        assert!(committed.is_none());
    }
}
