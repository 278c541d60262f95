//! [`Command`] for administrative [`contract::Status`] transitions.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{contract, property, user, Contract, Property, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for moving a [`Contract`] between administrative
/// [`contract::Status`]es.
///
/// Signature-driven transitions are handled by [`SignContract`] only; this
/// [`Command`] covers finishing, cancelling and archiving.
///
/// [`SignContract`]: super::SignContract
#[derive(Clone, Copy, Debug)]
pub struct UpdateContractStatus {
    /// ID of the [`Contract`] to be transitioned.
    pub contract_id: contract::Id,

    /// [`contract::Status`] to transition the [`Contract`] into.
    pub status: contract::Status,

    /// ID of the [`User`] requesting the transition.
    ///
    /// Must be the landlord of the [`Contract`].
    pub initiator_id: user::Id,
}

impl UpdateContractStatus {
    /// Checks whether the `from` → `to` transition is allowed.
    fn is_allowed(from: contract::Status, to: contract::Status) -> bool {
        use contract::Status as S;

        match to {
            S::Finished => from == S::Active,
            S::Cancelled => matches!(from, S::Draft | S::Active),
            S::Archived => matches!(from, S::Finished | S::Cancelled),
            S::Draft | S::Active => false,
        }
    }
}

impl<Db> Command<UpdateContractStatus> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Contract, contract::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Contract>, contract::Id>>,
            Ok = Option<Contract>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<Update<Contract>, Err = Traced<database::Error>>
        + Database<Update<Property>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Contract;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateContractStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateContractStatus {
            contract_id,
            status,
            initiator_id,
        } = cmd;

        let initiator = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(initiator_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(initiator_id))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions of the same `Contract`.
        tx.execute(Lock(By::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut contract = tx
            .execute(Select(By::<Option<Contract>, _>::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ContractNotExists(contract_id))
            .map_err(tracerr::wrap!())?;

        if contract.landlord_id != initiator.id {
            return Err(tracerr::new!(E::UserNotLandlord(initiator.id)));
        }
        if !UpdateContractStatus::is_allowed(contract.status, status) {
            return Err(tracerr::new!(E::InvalidTransition {
                from: contract.status,
                to: status,
            }));
        }

        // Finishing or cancelling a contract in force frees the property
        // for new contracts.
        let releases_property = contract.status == contract::Status::Active;

        contract.status = status;
        if status == contract::Status::Archived {
            contract.archived_at = Some(DateTime::now().coerce());
        }

        if releases_property {
            // Avoid concurrent actions upon the same `Property`.
            tx.execute(Lock(By::new(contract.property_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let mut property = tx
                .execute(Select(By::<Option<Property>, _>::new(
                    contract.property_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::PropertyNotExists(contract.property_id))
                .map_err(tracerr::wrap!())?;

            property.status = property::Status::Available;
            tx.execute(Update(property))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Update(contract.clone()))
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

/// Error of [`UpdateContractStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Contract`] with the provided ID does not exist.
    #[display("`Contract(id: {_0})` does not exist")]
    ContractNotExists(#[error(not(source))] contract::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested [`contract::Status`] transition is not allowed.
    #[display("`Contract` cannot transition from {from} to {to}")]
    InvalidTransition {
        /// Current [`contract::Status`] of the [`Contract`].
        from: contract::Status,

        /// Requested [`contract::Status`].
        to: contract::Status,
    },

    /// [`Property`] of the [`Contract`] does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`User`] is not the landlord of the [`Contract`].
    #[display("`User(id: {_0})` is not the landlord of the `Contract`")]
    UserNotLandlord(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{money, Money};
    use rust_decimal::Decimal;
    use secrecy::SecretBox;

    use crate::{
        command::{
            CreateContract, CreateProperty, CreateUser, SignContract,
        },
        domain::{contract, property, user, Contract, User},
        infra::InMemory,
        task, Command as _, Config, Service,
    };

    use super::{ExecutionError as E, UpdateContractStatus};

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

    async fn user(svc: &Service<InMemory>, email: &str) -> User {
        svc.execute(CreateUser {
            name: user::Name::new("Ana Maria").unwrap(),
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(
                user::Password::new("s3cr3t").unwrap(),
            )),
            phone: None,
        })
        .await
        .unwrap()
    }

    async fn active_contract(
        svc: &Service<InMemory>,
        landlord: &User,
        tenant: &User,
    ) -> Contract {
        let property = svc
            .execute(CreateProperty {
                address: property::Address::new("Carrera 7 #12-34").unwrap(),
                city: property::City::new("Bogota").unwrap(),
                description: None,
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        let contract = svc
            .execute(CreateContract {
                property_id: property.id,
                tenant: tenant.id.into(),
                rent: Money {
                    amount: Decimal::new(950_000, 0),
                    currency: money::Currency::Cop,
                },
                deposit: None,
                payment_day: contract::PaymentDay::new(5).unwrap(),
                clauses: contract::Clauses::new("No subletting.").unwrap(),
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        for (role, id) in [
            (contract::Role::Tenant, tenant.id),
            (contract::Role::Landlord, landlord.id),
        ] {
            drop(
                svc.execute(SignContract {
                    contract_id: contract.id,
                    role,
                    initiator_id: id,
                })
                .await
                .unwrap(),
            );
        }
        contract
    }

    async fn property_status(
        svc: &Service<InMemory>,
        contract: &Contract,
    ) -> property::Status {
        use common::operations::{By, Select};
        use crate::domain::Property;
        use crate::infra::Database as _;

        svc.database()
            .execute(Select(By::<Option<Property>, _>::new(
                contract.property_id,
            )))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn finishing_releases_the_property() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = active_contract(&svc, &landlord, &tenant).await;
        assert_eq!(
            property_status(&svc, &contract).await,
            property::Status::Rented,
        );

        let contract = svc
            .execute(UpdateContractStatus {
                contract_id: contract.id,
                status: contract::Status::Finished,
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        assert_eq!(contract.status, contract::Status::Finished);
        assert_eq!(
            property_status(&svc, &contract).await,
            property::Status::Available,
        );
    }

    #[tokio::test]
    async fn archiving_records_the_timestamp() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = active_contract(&svc, &landlord, &tenant).await;

        let contract = svc
            .execute(UpdateContractStatus {
                contract_id: contract.id,
                status: contract::Status::Finished,
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        assert!(contract.archived_at.is_none());

        let contract = svc
            .execute(UpdateContractStatus {
                contract_id: contract.id,
                status: contract::Status::Archived,
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        assert_eq!(contract.status, contract::Status::Archived);
        assert!(contract.archived_at.is_some());
    }

    #[tokio::test]
    async fn draft_cannot_be_finished() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let property = svc
            .execute(CreateProperty {
                address: property::Address::new("Carrera 7 #12-34").unwrap(),
                city: property::City::new("Bogota").unwrap(),
                description: None,
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        let contract = svc
            .execute(CreateContract {
                property_id: property.id,
                tenant: tenant.id.into(),
                rent: Money {
                    amount: Decimal::new(950_000, 0),
                    currency: money::Currency::Cop,
                },
                deposit: None,
                payment_day: contract::PaymentDay::new(5).unwrap(),
                clauses: contract::Clauses::new("No subletting.").unwrap(),
                initiator_id: landlord.id,
            })
            .await
            .unwrap();

        let err = svc
            .execute(UpdateContractStatus {
                contract_id: contract.id,
                status: contract::Status::Finished,
                initiator_id: landlord.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::InvalidTransition {
                from: contract::Status::Draft,
                to: contract::Status::Finished,
            },
        ));
    }

    #[tokio::test]
    async fn only_the_landlord_may_transition() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = active_contract(&svc, &landlord, &tenant).await;

        let err = svc
            .execute(UpdateContractStatus {
                contract_id: contract.id,
                status: contract::Status::Finished,
                initiator_id: tenant.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::UserNotLandlord(id) if *id == tenant.id,
        ));
    }
}
