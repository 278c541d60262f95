//! HTTP API definitions.

pub mod contract;
pub mod property;
pub mod user;

use std::{fmt, str::FromStr};

use crate::Error;

/// Parses the provided `value` into a validated domain type.
///
/// # Errors
///
/// Errors if the `value` is not a valid representation of `T`.
fn parse<T>(value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| Error::invalid_argument(&e))
}
