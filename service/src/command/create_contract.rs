//! [`Command`] for creating a new [`Contract`].

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::contract::{Clauses, Party, PaymentDay};
use crate::{
    domain::{contract, property, user, Contract, Property, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Contract`].
#[derive(Clone, Debug)]
pub struct CreateContract {
    /// ID of the [`Property`] to be rented out.
    pub property_id: property::Id,

    /// Tenant [`Party`] of a new [`Contract`].
    pub tenant: contract::Party,

    /// Monthly rent of a new [`Contract`].
    pub rent: Money,

    /// Deposit of a new [`Contract`], if any.
    pub deposit: Option<Money>,

    /// [`PaymentDay`] of a new [`Contract`].
    pub payment_day: contract::PaymentDay,

    /// Legal [`Clauses`] of a new [`Contract`].
    pub clauses: contract::Clauses,

    /// ID of the [`User`] creating the [`Contract`].
    ///
    /// Must own the [`Property`] being rented out.
    pub initiator_id: user::Id,
}

impl<Db> Command<CreateContract> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<Insert<Contract>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Contract;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateContract,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateContract {
            property_id,
            tenant,
            rent,
            deposit,
            payment_day,
            clauses,
            initiator_id,
        } = cmd;

        let initiator = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(initiator_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(initiator_id))
            .map_err(tracerr::wrap!())?;

        if let contract::Party::User(tenant_id) = &tenant {
            drop(
                self.database()
                    .execute(Select(By::<Option<User>, _>::new(*tenant_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::TenantNotExists(*tenant_id))
                    .map_err(tracerr::wrap!())?,
            );
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Property`.
        tx.execute(Lock(By::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let property = tx
            .execute(Select(By::<Option<Property>, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;

        if property.landlord_id != initiator.id {
            return Err(tracerr::new!(E::UserNotOwner(initiator.id)));
        }
        if !property.is_available() {
            return Err(tracerr::new!(E::PropertyNotAvailable(property.id)));
        }

        let contract = Contract {
            id: contract::Id::new(),
            property_id: property.id,
            landlord_id: initiator.id,
            tenant,
            rent,
            deposit,
            payment_day,
            clauses,
            status: contract::Status::Draft,
            signed_by_tenant_at: None,
            signed_by_landlord_at: None,
            created_at: DateTime::now().coerce(),
            archived_at: None,
        };

        tx.execute(Insert(contract.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(contract)
    }
}

/// Error of [`CreateContract`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Property`] is not available for rent.
    #[display("`Property(id: {_0})` is not available for rent")]
    PropertyNotAvailable(#[error(not(source))] property::Id),

    /// [`Property`] with the provided ID does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// Tenant [`User`] with the provided ID does not exist.
    #[display("Tenant `User(id: {_0})` does not exist")]
    TenantNotExists(#[error(not(source))] user::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`User`] does not own the [`Property`].
    #[display("`User(id: {_0})` does not own the `Property`")]
    UserNotOwner(#[error(not(source))] user::Id),
}
