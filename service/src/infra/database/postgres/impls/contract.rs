//! [`Contract`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    money,
    operations::{By, Delete, Insert, Lock, Select, Update},
    Money,
};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{contract, user, Contract},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C, IDs> Database<Select<By<HashMap<contract::Id, Contract>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[contract::Id]>,
{
    type Ok = HashMap<contract::Id, Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<contract::Id, Contract>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[contract::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        const SQL: &str = "\
            SELECT id, \
                   property_id, landlord_id, \
                   tenant_id, tenant_email, \
                   rent, rent_currency, \
                   deposit, deposit_currency, \
                   payment_day, clauses, status, \
                   signed_by_tenant_at, signed_by_landlord_at, \
                   created_at, archived_at \
            FROM contracts \
            WHERE id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
            LIMIT $2::INT4";
        Ok(self
            .query(SQL, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                let tenant = row
                    .get::<_, Option<user::Id>>("tenant_id")
                    .map_or_else(
                        || contract::Party::Email(row.get("tenant_email")),
                        contract::Party::User,
                    );
                let contract = Contract {
                    id,
                    property_id: row.get("property_id"),
                    landlord_id: row.get("landlord_id"),
                    tenant,
                    rent: Money {
                        amount: row.get("rent"),
                        currency: row.get("rent_currency"),
                    },
                    deposit: row.get::<_, Option<_>>("deposit").map(
                        |amount| Money {
                            amount,
                            currency: row.get("deposit_currency"),
                        },
                    ),
                    payment_day: row.get("payment_day"),
                    clauses: row.get("clauses"),
                    status: row.get("status"),
                    signed_by_tenant_at: row.get("signed_by_tenant_at"),
                    signed_by_landlord_at: row.get("signed_by_landlord_at"),
                    created_at: row.get("created_at"),
                    archived_at: row.get("archived_at"),
                };
                (id, contract)
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Contract>, contract::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<contract::Id, Contract>, [contract::Id; 1]>>,
        Ok = HashMap<contract::Id, Contract>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Contract>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Insert<Contract>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Contract>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(contract): Insert<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(contract))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Contract>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(contract): Update<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        let Contract {
            id,
            property_id,
            landlord_id,
            tenant,
            rent,
            deposit,
            payment_day,
            clauses,
            status,
            signed_by_tenant_at,
            signed_by_landlord_at,
            created_at,
            archived_at,
        } = contract;

        let (tenant_id, tenant_email): (
            Option<user::Id>,
            Option<user::Email>,
        ) = match tenant {
            contract::Party::User(id) => (Some(id), None),
            contract::Party::Email(email) => (None, Some(email)),
        };
        let (deposit, deposit_currency): (
            Option<Decimal>,
            Option<money::Currency>,
        ) = (deposit.map(|d| d.amount), deposit.map(|d| d.currency));

        const SQL: &str = "\
            INSERT INTO contracts (\
                id, \
                property_id, landlord_id, \
                tenant_id, tenant_email, \
                rent, rent_currency, \
                deposit, deposit_currency, \
                payment_day, clauses, status, \
                signed_by_tenant_at, signed_by_landlord_at, \
                created_at, archived_at\
            ) VALUES (\
                $1::UUID, \
                $2::UUID, $3::UUID, \
                $4::UUID, $5::VARCHAR, \
                $6::NUMERIC, $7::INT2, \
                $8::NUMERIC, $9::INT2, \
                $10::INT2, $11::VARCHAR, $12::INT2, \
                $13::TIMESTAMPTZ, $14::TIMESTAMPTZ, \
                $15::TIMESTAMPTZ, $16::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET property_id = EXCLUDED.property_id, \
                landlord_id = EXCLUDED.landlord_id, \
                tenant_id = EXCLUDED.tenant_id, \
                tenant_email = EXCLUDED.tenant_email, \
                rent = EXCLUDED.rent, \
                rent_currency = EXCLUDED.rent_currency, \
                deposit = EXCLUDED.deposit, \
                deposit_currency = EXCLUDED.deposit_currency, \
                payment_day = EXCLUDED.payment_day, \
                clauses = EXCLUDED.clauses, \
                status = EXCLUDED.status, \
                signed_by_tenant_at = EXCLUDED.signed_by_tenant_at, \
                signed_by_landlord_at = EXCLUDED.signed_by_landlord_at, \
                created_at = EXCLUDED.created_at, \
                archived_at = EXCLUDED.archived_at";
        self.exec(
            SQL,
            &[
                &id,
                &property_id,
                &landlord_id,
                &tenant_id,
                &tenant_email,
                &rent.amount,
                &rent.currency,
                &deposit,
                &deposit_currency,
                &payment_day,
                &clauses,
                &status,
                &signed_by_tenant_at,
                &signed_by_landlord_at,
                &created_at,
                &archived_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Contract, contract::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Contract, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: contract::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO contracts_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO NOTHING";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<Contract, contract::ArchivalDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Contract, contract::ArchivalDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let deadline: contract::ArchivalDateTime = by.into_inner();

        const SQL: &str = "\
            DELETE FROM contracts \
            WHERE status = $1::INT2 \
              AND archived_at IS NOT NULL \
              AND archived_at <= $2::TIMESTAMPTZ";
        self.exec(SQL, &[&contract::Status::Archived, &deadline])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
