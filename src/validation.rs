/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Field level input validation.
//!
//! Incoming payloads are deserialized into loosely typed request structs and then converted
//! into the value objects of this module. Every failed conversion is collected into
//! [FieldErrors], which renders as `{"field": ["message", ...]}`.

use crate::prelude::*;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use validator::ValidateEmail;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    /// Records the error of a failed conversion and hands back the successful value.
    pub fn check<T>(&mut self, field: &str, result: std::result::Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    /// Like [FieldErrors::check] but for fields which have to be present.
    pub fn require<T>(
        &mut self,
        field: &str,
        result: Option<std::result::Result<T, String>>,
    ) -> Option<T> {
        self.field(field, result, true)
    }

    /// Checks a field which may be omitted unless `required` is set.
    pub fn field<T>(
        &mut self,
        field: &str,
        result: Option<std::result::Result<T, String>>,
        required: bool,
    ) -> Option<T> {
        match result {
            Some(result) => self.check(field, result),
            None if required => {
                self.add(field, REQUIRED);
                None
            }
            None => None,
        }
    }

    pub fn finish(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApplicationError::Validation(self))
        }
    }
}

impl From<FieldErrors> for ApplicationError {
    fn from(errors: FieldErrors) -> Self {
        ApplicationError::Validation(errors)
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn text(value: &str, max_length: usize) -> std::result::Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BLANK.to_owned());
    }
    if value.chars().count() > max_length {
        return Err(format!(
            "Ensure this field has no more than {max_length} characters."
        ));
    }

    Ok(value.to_owned())
}

macro_rules! bounded_text {
    ($(#[$meta:meta])* $ident:ident, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ident(String);

        impl $ident {
            pub fn parse(value: &str) -> std::result::Result<Self, String> {
                text(value, $max).map(Self)
            }
        }

        impl AsRef<str> for $ident {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<$ident> for String {
            fn from(value: $ident) -> Self {
                value.0
            }
        }
    };
}

bounded_text!(
    /// Name of a project, unique per owner.
    ProjectName,
    200
);
bounded_text!(TaskTitle, 200);
bounded_text!(
    /// Free-form color tag of a project.
    Color,
    50
);
bounded_text!(PersonName, 150);

impl Default for Color {
    fn default() -> Self {
        Self("blue".to_owned())
    }
}

/// Optional free text. Surrounding whitespace is dropped, blank values are allowed.
pub fn description(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(BLANK.to_owned());
        }
        if !value.validate_email() {
            return Err("Enter a valid email address.".to_owned());
        }

        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        let value = text(value, 150)?;
        if !value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.".to_owned());
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// A plain text password which satisfies the length policy.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 6;

    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        if value.is_empty() {
            return Err(BLANK.to_owned());
        }
        if value.chars().count() < Self::MIN_LENGTH {
            return Err(format!(
                "Ensure this field has at least {} characters.",
                Self::MIN_LENGTH
            ));
        }

        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

pub fn date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_owned()
    })
}

/// Parses one of the fixed choices of a field.
pub fn choice<T>(value: &str) -> std::result::Result<T, String>
where
    T: FromStr,
{
    T::from_str(value).map_err(|_| format!("\"{value}\" is not a valid choice."))
}

/// Reads a record reference, given either as a JSON number or a numeric string.
pub fn primary_key(value: &Value) -> std::result::Result<i64, String> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| format!("Incorrect type. Expected pk value, received {number}.")),
        Value::String(string) => string
            .trim()
            .parse::<i64>()
            .map_err(|_| "Incorrect type. Expected pk value, received str.".to_owned()),
        other => Err(format!(
            "Incorrect type. Expected pk value, received {}.",
            json_type(other)
        )),
    }
}

/// Reads an optional id filter from the query string, where `all` and blank mean no filter.
pub fn id_filter(field: &str, value: Option<&str>) -> Result<Option<i64>> {
    match value.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| FieldErrors::single(field, "Enter a whole number.").into()),
    }
}

/// Reads an optional choice filter from the query string.
pub fn choice_filter<T>(field: &str, value: Option<&str>) -> Result<Option<T>>
where
    T: FromStr,
{
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => choice(value)
            .map(Some)
            .map_err(|message| FieldErrors::single(field, message).into()),
    }
}

pub fn does_not_exist(id: impl Display) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
