//! [`Command`] for signing a [`Contract`].

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

/// [`Command`] for signing a [`Contract`].
///
/// Signatures are collected in a fixed order: the tenant signs first, the
/// landlord countersigns. Once both signatures are recorded, the
/// [`Contract`] becomes [`Active`] and its [`Property`] becomes [`Rented`]
/// within the same transaction.
///
/// [`Active`]: contract::Status::Active
/// [`Rented`]: property::Status::Rented
#[derive(Clone, Copy, Debug)]
pub struct SignContract {
    /// ID of the [`Contract`] to be signed.
    pub contract_id: contract::Id,

    /// [`contract::Role`] the initiator signs as.
    pub role: contract::Role,

    /// ID of the [`User`] signing the [`Contract`].
    pub initiator_id: user::Id,
}

impl<Db> Command<SignContract> for Service<Db>
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

    async fn execute(&self, cmd: SignContract) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SignContract {
            contract_id,
            role,
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

        // Avoid concurrent signings of the same `Contract`.
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

        if !contract.is_signable() {
            return Err(tracerr::new!(E::ContractNotSignable(contract_id)));
        }

        match role {
            contract::Role::Tenant => {
                if !contract.tenant.matches(&initiator) {
                    return Err(tracerr::new!(E::UserNotSigner(initiator.id)));
                }
                if contract.signed_by_tenant_at.is_some() {
                    return Err(tracerr::new!(E::ContractAlreadySigned(
                        contract_id
                    )));
                }
                // An email-matched tenant gets their account linked along
                // with the signature.
                contract.tenant = contract::Party::User(initiator.id);
                contract.signed_by_tenant_at =
                    Some(DateTime::now().coerce());
            }
            contract::Role::Landlord => {
                if contract.landlord_id != initiator.id {
                    return Err(tracerr::new!(E::UserNotSigner(initiator.id)));
                }
                if contract.signed_by_tenant_at.is_none() {
                    return Err(tracerr::new!(E::TenantSignatureMissing(
                        contract_id
                    )));
                }
                if contract.signed_by_landlord_at.is_some() {
                    return Err(tracerr::new!(E::ContractAlreadySigned(
                        contract_id
                    )));
                }
                contract.signed_by_landlord_at =
                    Some(DateTime::now().coerce());
            }
        }

        if contract.is_fully_signed() {
            contract.status = contract::Status::Active;

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

            property.status = property::Status::Rented;
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

/// Error of [`SignContract`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Contract`] already carries the requested signature.
    #[display("`Contract(id: {_0})` is already signed by this party")]
    ContractAlreadySigned(#[error(not(source))] contract::Id),

    /// [`Contract`] with the provided ID does not exist.
    #[display("`Contract(id: {_0})` does not exist")]
    ContractNotExists(#[error(not(source))] contract::Id),

    /// [`Contract`] is not collecting signatures anymore.
    #[display("`Contract(id: {_0})` is not signable")]
    ContractNotSignable(#[error(not(source))] contract::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Property`] of the [`Contract`] does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// Landlord tried to sign before the tenant.
    #[display(
        "`Contract(id: {_0})` cannot be countersigned before the tenant \
         signs"
    )]
    TenantSignatureMissing(#[error(not(source))] contract::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`User`] is not a signer party of the [`Contract`].
    #[display("`User(id: {_0})` is not a signer of the `Contract`")]
    UserNotSigner(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{money, Money};
    use rust_decimal::Decimal;
    use secrecy::SecretBox;

    use crate::{
        command::{CreateContract, CreateProperty, CreateUser},
        domain::{contract, property, user, Contract, User},
        infra::InMemory,
        task, Command as _, Config, Service,
    };

    use super::{ExecutionError as E, SignContract};

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

    async fn draft(
        svc: &Service<InMemory>,
        landlord: &User,
        tenant: impl Into<contract::Party>,
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
        svc.execute(CreateContract {
            property_id: property.id,
            tenant: tenant.into(),
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
        .unwrap()
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
    async fn landlord_cannot_sign_first() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = draft(&svc, &landlord, tenant.id).await;

        let err = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Landlord,
                initiator_id: landlord.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::TenantSignatureMissing(id) if *id == contract.id,
        ));
    }

    #[tokio::test]
    async fn tenant_signs_then_landlord_activates() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = draft(&svc, &landlord, tenant.id).await;

        let contract = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap();
        assert!(contract.signed_by_tenant_at.is_some());
        assert_eq!(contract.status, contract::Status::Draft);
        assert_eq!(
            property_status(&svc, &contract).await,
            property::Status::Available,
        );

        let contract = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Landlord,
                initiator_id: landlord.id,
            })
            .await
            .unwrap();
        assert!(contract.is_fully_signed());
        assert_eq!(contract.status, contract::Status::Active);
        assert_eq!(
            property_status(&svc, &contract).await,
            property::Status::Rented,
        );
    }

    #[tokio::test]
    async fn repeated_tenant_signature_is_rejected_unchanged() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = draft(&svc, &landlord, tenant.id).await;

        let signed = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap();
        let first_signature = signed.signed_by_tenant_at.unwrap();

        let err = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::ContractAlreadySigned(id) if *id == contract.id,
        ));

        // The recorded timestamp must survive the failed attempt.
        let stored = stored_contract(&svc, contract.id).await;
        assert_eq!(stored.signed_by_tenant_at, Some(first_signature));
    }

    #[tokio::test]
    async fn stranger_cannot_sign_either_role() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let stranger = user(&svc, "stranger@example.com").await;
        let contract = draft(&svc, &landlord, tenant.id).await;

        for role in [contract::Role::Tenant, contract::Role::Landlord] {
            let err = svc
                .execute(SignContract {
                    contract_id: contract.id,
                    role,
                    initiator_id: stranger.id,
                })
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                E::UserNotSigner(id) if *id == stranger.id,
            ));
        }
    }

    #[tokio::test]
    async fn active_contract_is_not_signable() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = draft(&svc, &landlord, tenant.id).await;

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

        let err = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::ContractNotSignable(id) if *id == contract.id,
        ));
    }

    #[tokio::test]
    async fn email_tenant_is_linked_on_signature() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let contract = draft(
            &svc,
            &landlord,
            user::Email::new("pending@example.com").unwrap(),
        )
        .await;
        assert!(matches!(contract.tenant, contract::Party::Email(_)));

        let tenant = user(&svc, "pending@example.com").await;
        let contract = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap();
        assert_eq!(contract.tenant, contract::Party::User(tenant.id));
    }

    #[tokio::test]
    async fn mismatched_email_party_cannot_sign() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let contract = draft(
            &svc,
            &landlord,
            user::Email::new("pending@example.com").unwrap(),
        )
        .await;

        let other = user(&svc, "other@example.com").await;
        let err = svc
            .execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: other.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::UserNotSigner(id) if *id == other.id,
        ));

        // The contract stays unsigned and unlinked.
        let stored = stored_contract(&svc, contract.id).await;
        assert!(stored.signed_by_tenant_at.is_none());
        assert!(matches!(stored.tenant, contract::Party::Email(_)));
    }

    #[tokio::test]
    async fn concurrent_countersignatures_have_a_single_winner() {
        let svc = service();
        let landlord = user(&svc, "landlord@example.com").await;
        let tenant = user(&svc, "tenant@example.com").await;
        let contract = draft(&svc, &landlord, tenant.id).await;

        drop(
            svc.execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap(),
        );

        let countersign = || {
            svc.execute(SignContract {
                contract_id: contract.id,
                role: contract::Role::Landlord,
                initiator_id: landlord.id,
            })
        };
        let (first, second) =
            futures::future::join(countersign(), countersign()).await;

        let (winner, loser) = match (first, second) {
            (Ok(c), Err(e)) | (Err(e), Ok(c)) => (c, e),
            (Ok(_), Ok(_)) => panic!("both countersignatures succeeded"),
            (Err(_), Err(_)) => panic!("both countersignatures failed"),
        };
        assert_eq!(winner.status, contract::Status::Active);
        assert!(matches!(
            loser.as_ref(),
            E::ContractNotSignable(id) if *id == contract.id,
        ));
    }

    #[tokio::test]
    async fn missing_contract_is_reported() {
        let svc = service();
        let tenant = user(&svc, "tenant@example.com").await;
        let missing = contract::Id::new();

        let err = svc
            .execute(SignContract {
                contract_id: missing,
                role: contract::Role::Tenant,
                initiator_id: tenant.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::ContractNotExists(id) if *id == missing,
        ));
    }

    async fn stored_contract(
        svc: &Service<InMemory>,
        id: contract::Id,
    ) -> Contract {
        use common::operations::{By, Select};
        use crate::infra::Database as _;

        svc.database()
            .execute(Select(By::<Option<Contract>, _>::new(id)))
            .await
            .unwrap()
            .unwrap()
    }
}
