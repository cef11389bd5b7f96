//! Domain library for the payment service.
//!
//! Holds the Deposit entity and its transfer shape, the ports (traits) for the
//! entity store and the search index, and the error type shared by adapters.
//! Keep adapters and IO concerns out of this crate.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A Deposit as persisted in the entity store and mirrored into the search index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    /// Assigned by the store on first insert; `None` only before persistence.
    pub id: Option<i64>,
    pub booking_code: Option<String>,
    /// Reference to a user owned by another service. Not validated here.
    pub user_id: Option<i64>,
    pub currency_code: Option<String>,
}

impl Deposit {
    pub fn booking_code<S: Into<String>>(mut self, booking_code: S) -> Self {
        self.booking_code = Some(booking_code.into());
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn currency_code<S: Into<String>>(mut self, currency_code: S) -> Self {
        self.currency_code = Some(currency_code.into());
        self
    }

    /// Whether both records denote the same persisted deposit.
    ///
    /// Records without an id are never the same deposit as anything else.
    pub fn same_identity(&self, other: &Deposit) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

impl Display for Deposit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_record(
            f,
            "Deposit",
            self.id,
            &self.booking_code,
            self.user_id,
            &self.currency_code,
        )
    }
}

/// External (wire) representation of a Deposit.
///
/// Field-for-field identical to [`Deposit`]; kept separate so the HTTP surface
/// can reject unknown fields without constraining the stored shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DepositDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub booking_code: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl DepositDto {
    /// Same identity semantics as [`Deposit::same_identity`].
    pub fn same_identity(&self, other: &DepositDto) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

impl Display for DepositDto {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_record(
            f,
            "DepositDTO",
            self.id,
            &self.booking_code,
            self.user_id,
            &self.currency_code,
        )
    }
}

fn write_record(
    f: &mut Formatter<'_>,
    name: &str,
    id: Option<i64>,
    booking_code: &Option<String>,
    user_id: Option<i64>,
    currency_code: &Option<String>,
) -> std::fmt::Result {
    fn num(v: Option<i64>) -> String {
        v.map_or_else(|| "null".to_string(), |n| n.to_string())
    }
    fn text(v: &Option<String>) -> &str {
        v.as_deref().unwrap_or("null")
    }
    write!(
        f,
        "{}{{id={}, bookingCode='{}', userId={}, currencyCode='{}'}}",
        name,
        num(id),
        text(booking_code),
        num(user_id),
        text(currency_code)
    )
}

/// Entity store port: the system of record for deposits.
pub trait DepositRepository: Send + Sync {
    /// Insert when `deposit.id` is `None`, otherwise replace every field of the
    /// existing row. Returns the stored record with its id populated.
    fn save(&self, deposit: Deposit) -> Result<Deposit, CoreError>;
    /// All rows in ascending id order.
    fn find_all(&self) -> Result<Vec<Deposit>, CoreError>;
    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError>;
    /// Remove the row; removing an absent row is not an error.
    fn delete(&self, id: i64) -> Result<(), CoreError>;
    fn count(&self) -> Result<usize, CoreError>;
}

/// Search index port: a secondary, eventually-consistent copy of the store.
pub trait DepositSearchRepository: Send + Sync {
    /// Index (insert or overwrite) a persisted deposit. The deposit must carry an id.
    fn index(&self, deposit: &Deposit) -> Result<(), CoreError>;
    fn remove(&self, id: i64) -> Result<(), CoreError>;
    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError>;
    fn exists(&self, id: i64) -> Result<bool, CoreError> {
        Ok(self.find_one(id)?.is_some())
    }
    /// Run a query-string query (see [`query`]) against the indexed documents.
    fn search(&self, query: &str) -> Result<Vec<Deposit>, CoreError>;
    fn delete_all(&self) -> Result<(), CoreError>;
}

/// Core domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("a new deposit cannot already have an id")]
    IdExists,
    #[error("not found")]
    NotFound,
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("repository error: {0}")]
    Repository(String),
    #[error("search index error: {0}")]
    Index(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - deposit domain library loaded", pkg, ver)
}

pub mod adapters;
pub mod mapper;
pub mod query;
pub mod service;
pub mod validate;
