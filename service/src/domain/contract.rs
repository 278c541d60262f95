//! [`Contract`] definitions.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use common::DateTime;

use crate::domain::{property, user, User};
#[cfg(doc)]
use crate::domain::Property;

/// Rental agreement between a landlord and a tenant about a [`Property`].
#[derive(Clone, Debug)]
pub struct Contract {
    /// ID of this [`Contract`].
    pub id: Id,

    /// ID of the [`Property`] being rented out.
    pub property_id: property::Id,

    /// ID of the [`User`] renting out the [`Property`].
    pub landlord_id: user::Id,

    /// [`Party`] renting the [`Property`].
    pub tenant: Party,

    /// Monthly rent to be paid by the tenant.
    pub rent: Money,

    /// Deposit to be paid at the beginning of the rent, if any.
    pub deposit: Option<Money>,

    /// [`PaymentDay`] the rent is due each month.
    pub payment_day: PaymentDay,

    /// Legal [`Clauses`] of this [`Contract`].
    pub clauses: Clauses,

    /// [`Status`] of this [`Contract`].
    pub status: Status,

    /// [`DateTime`] when the tenant signed this [`Contract`], if they did.
    pub signed_by_tenant_at: Option<SignatureDateTime>,

    /// [`DateTime`] when the landlord signed this [`Contract`], if they did.
    pub signed_by_landlord_at: Option<SignatureDateTime>,

    /// [`DateTime`] when this [`Contract`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Contract`] was archived, if it was.
    pub archived_at: Option<ArchivalDateTime>,
}

impl Contract {
    /// Returns whether this [`Contract`] may still collect signatures.
    #[must_use]
    pub fn is_signable(&self) -> bool {
        self.status == Status::Draft
    }

    /// Returns whether both required signatures are recorded.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.signed_by_tenant_at.is_some()
            && self.signed_by_landlord_at.is_some()
    }

    /// Returns the [`DateTime`] when the provided [`Role`] signed this
    /// [`Contract`], if they did.
    #[must_use]
    pub fn signed_at(&self, role: Role) -> Option<SignatureDateTime> {
        match role {
            Role::Tenant => self.signed_by_tenant_at,
            Role::Landlord => self.signed_by_landlord_at,
        }
    }
}

/// ID of a [`Contract`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Tenant party of a [`Contract`].
///
/// Before the tenant has an account on the platform, the [`Contract`] refers
/// to them by [`user::Email`] only. Once linked, the [`user::Id`] takes
/// precedence and email matching no longer applies.
#[derive(Clone, Debug, Eq, From, PartialEq)]
pub enum Party {
    /// Tenant with a linked [`User`] account.
    User(user::Id),

    /// Tenant known by email only, prior to account linkage.
    Email(user::Email),
}

impl Party {
    /// Checks whether the provided [`User`] is this [`Party`].
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        match self {
            Self::User(id) => *id == user.id,
            Self::Email(email) => *email == user.email,
        }
    }
}

/// Day of month (1..=28) a [`Contract`]'s rent is due.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct PaymentDay(u8);

impl PaymentDay {
    /// Creates a new [`PaymentDay`] if the given `day` is valid.
    ///
    /// Days past the 28th are rejected, so the due date exists in every
    /// month.
    #[must_use]
    pub fn new(day: u8) -> Option<Self> {
        ((1..=28).contains(&day)).then_some(Self(day))
    }
}

impl TryFrom<u8> for PaymentDay {
    type Error = &'static str;

    fn try_from(day: u8) -> Result<Self, Self::Error> {
        Self::new(day).ok_or("invalid `PaymentDay`")
    }
}

#[cfg(feature = "postgres")]
impl postgres_types::ToSql for PaymentDay {
    postgres_types::accepts!(INT2);
    postgres_types::to_sql_checked!();

    fn to_sql(
        &self,
        ty: &postgres_types::Type,
        w: &mut postgres_types::private::BytesMut,
    ) -> Result<
        postgres_types::IsNull,
        Box<dyn std::error::Error + Sync + Send>,
    > {
        i16::from(self.0).to_sql(ty, w)
    }
}

#[cfg(feature = "postgres")]
impl postgres_types::FromSql<'_> for PaymentDay {
    postgres_types::accepts!(INT2);

    fn from_sql(
        ty: &postgres_types::Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let day = u8::try_from(i16::from_sql(ty, raw)?)?;
        Self::new(day).ok_or_else(|| "invalid `PaymentDay` value".into())
    }
}

/// Legal clauses of a [`Contract`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Clauses(String);

impl Clauses {
    /// Creates a new [`Clauses`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `clauses` are not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(clauses: impl Into<String>) -> Self {
        Self(clauses.into())
    }

    /// Creates a new [`Clauses`] if the given `clauses` are valid.
    #[must_use]
    pub fn new(clauses: impl Into<String>) -> Option<Self> {
        let clauses = clauses.into();
        Self::check(&clauses).then_some(Self(clauses))
    }

    /// Checks whether the given `clauses` are valid [`Clauses`].
    fn check(clauses: impl AsRef<str>) -> bool {
        let clauses = clauses.as_ref();
        clauses.trim() == clauses
            && !clauses.is_empty()
            && clauses.len() <= 16384
    }
}

impl FromStr for Clauses {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Clauses`")
    }
}

define_kind! {
    #[doc = "Status of a [`Contract`]."]
    enum Status {
        #[doc = "The [`Contract`] is collecting signatures."]
        Draft = 1,

        #[doc = "The [`Contract`] is signed by both parties and in force."]
        Active = 2,

        #[doc = "The [`Contract`] has run its course."]
        Finished = 3,

        #[doc = "The [`Contract`] was cancelled before completion."]
        Cancelled = 4,

        #[doc = "The [`Contract`] is archived and awaits retention cleanup."]
        Archived = 5,
    }
}

define_kind! {
    #[doc = "Signer role on a [`Contract`]."]
    enum Role {
        #[doc = "The tenant party of a [`Contract`]."]
        Tenant = 1,

        #[doc = "The landlord party of a [`Contract`]."]
        Landlord = 2,
    }
}

/// Marker type indicating [`Contract`] signing.
#[derive(Clone, Copy, Debug)]
pub struct Signing;

/// Marker type indicating [`Contract`] archival.
#[derive(Clone, Copy, Debug)]
pub struct Archival;

/// [`DateTime`] when a [`Contract`] was signed by one of its parties.
pub type SignatureDateTime = DateTimeOf<(Contract, Signing)>;

/// [`DateTime`] when a [`Contract`] was created.
pub type CreationDateTime = DateTimeOf<(Contract, unit::Creation)>;

/// [`DateTime`] when a [`Contract`] was archived.
pub type ArchivalDateTime = DateTimeOf<(Contract, Archival)>;

#[cfg(test)]
mod spec {
    use super::PaymentDay;

    #[test]
    fn payment_day_bounds() {
        assert!(PaymentDay::new(0).is_none());
        assert!(PaymentDay::new(1).is_some());
        assert!(PaymentDay::new(28).is_some());
        assert!(PaymentDay::new(29).is_none());
        assert!(PaymentDay::new(31).is_none());
    }
}
