//! API error handling.
//!
//! We define our own error to use for all resolvers. It has `From` impls to be
//! created from other common errors that occur (e.g. DB errors). This module
//! also offers a couple macros to easily create an error.
//!
//! The error contains information that helps API clients show a good error
//! message: a coarse "error kind", an optional machine readable "key" and,
//! for invalid input, optionally the name of the offending input field.

use juniper::{FieldError, IntoFieldError, ScalarValue, Object, Value};

use crate::prelude::*;


pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) kind: ApiErrorKind,
    pub(crate) key: Option<&'static str>,
    pub(crate) field: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// The arguments passed to an endpoint are invalid somehow.
    InvalidInput,

    /// The API request is not sufficiently authorized.
    NotAuthorized,

    /// Some server error out of control of the API user.
    InternalServerError,
}

impl ApiErrorKind {
    pub(crate) fn kind_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    fn message_prefix(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input",
            Self::NotAuthorized => "Not authorized",
            Self::InternalServerError => "Internal server error",
        }
    }
}

impl ApiError {
    /// Sets the input field this error is about.
    pub(crate) fn on_field(self, field: &'static str) -> Self {
        Self { field: Some(field), ..self }
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(src: tokio_postgres::Error) -> Self {
        // Logging the error here is not ideal but probably totally fine for us.
        // At this point, it's very very likely that the error is sent back to
        // the user. And this is the last time we can get detailed information
        // about it.
        error!("DB Error when executing query: {src}");
        debug!("Detailed error: {src:#?}");

        Self {
            msg: "DB error".into(),
            kind: ApiErrorKind::InternalServerError,
            key: None,
            field: None,
        }
    }
}

impl<S: ScalarValue> IntoFieldError<S> for ApiError {
    fn into_field_error(self) -> FieldError<S> {
        let msg = format!("{}: {}", self.kind.message_prefix(), self.msg);

        let mut ext = Object::with_capacity(3);
        ext.add_field("kind", Value::scalar(self.kind.kind_str().to_owned()));
        if let Some(key) = self.key {
            ext.add_field("key", Value::scalar(key.to_owned()));
        }
        if let Some(field) = self.field {
            ext.add_field("field", Value::scalar(field.to_owned()));
        }

        FieldError::new(msg, Value::Object(ext))
    }
}


// ===== Helper macros to easily create errors ==================================================

/// Creates an `ApiError` with a `format!` like syntax. `key` and `field`
/// can be given (in that order) before the format string.
macro_rules! api_err {
    ($kind:ident, key = $key:literal, field = $field:literal, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
            key: Some($key),
            field: Some($field),
        }
    };
    ($kind:ident, key = $key:literal, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
            key: Some($key),
            field: None,
        }
    };
    ($kind:ident, field = $field:literal, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
            key: None,
            field: Some($field),
        }
    };
    ($kind:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
            key: None,
            field: None,
        }
    };
}

macro_rules! invalid_input {
    ($($t:tt)+) => { $crate::api::err::api_err!(InvalidInput, $($t)*) };
}

macro_rules! not_authorized {
    ($($t:tt)+) => { $crate::api::err::api_err!(NotAuthorized, $($t)*) };
}

macro_rules! internal_server_error {
    ($($t:tt)+) => { $crate::api::err::api_err!(InternalServerError, $($t)*) };
}

pub(crate) use api_err;
pub(crate) use invalid_input;
pub(crate) use not_authorized;
pub(crate) use internal_server_error;


// ===== Helper macro to inspect DbError ==================================================

/// Helps you map some special DB errors to specific API errors (instead of a
/// generic "internal server error"). Usage:
///
/// ```ignore
/// // `result` needs to be `Result<T, tokio_postgres::error::Error>`.
/// map_db_err!(result, {
///     if constraint == "unique_page_slug" => invalid_input!(field = "slug", "bad slug"),
///     if /* field */ == /* value */ => /* expression returning ApiError */,
///     // ...
/// })
/// ```
///
/// The macro returns `Result<T, ApiError>`.
macro_rules! map_db_err {
    ($result:expr, { $(
        if $field:ident == $value:expr => $then:expr
    ),* $(,)? }) => {
        match $result {
            Ok(v) => Ok(v),
            Err(e) => {
                if let Some(db_error) = e.as_db_error() {
                    let new_err: $crate::api::err::ApiError = if false { unreachable!() }
                    $(
                        else if db_error.$field()
                            == $crate::api::err::map_db_err!(@wrap $field $value)
                        { $then.into() }
                    )*
                    else { e.into() };
                    Err(new_err)
                } else {
                    Err(e.into())
                }
            }
        }
    };
    (@wrap constraint $value:expr) => { Some($value) };
    (@wrap code $value:expr) => { &$value };
}

pub(crate) use map_db_err;

/// Maps violations of the common constraint types (unique, foreign key,
/// check) to `INVALID_INPUT` errors. For unique constraints, `unique_fields`
/// names the input field for each constraint name.
pub(crate) fn constraint_violation(
    e: tokio_postgres::Error,
    unique_fields: &[(&str, &'static str)],
) -> ApiError {
    use tokio_postgres::error::SqlState;

    let Some(db_error) = e.as_db_error() else {
        return e.into();
    };
    let constraint = db_error.constraint().unwrap_or_default();

    if *db_error.code() == SqlState::UNIQUE_VIOLATION {
        let field = unique_fields.iter()
            .find(|(name, _)| *name == constraint)
            .map(|(_, field)| *field);
        ApiError {
            msg: format!("value already in use ({constraint})"),
            kind: ApiErrorKind::InvalidInput,
            key: Some("unique"),
            field,
        }
    } else if *db_error.code() == SqlState::CHECK_VIOLATION {
        ApiError {
            msg: format!("value violates constraint '{constraint}'"),
            kind: ApiErrorKind::InvalidInput,
            key: Some("invalid"),
            field: None,
        }
    } else if *db_error.code() == SqlState::FOREIGN_KEY_VIOLATION {
        ApiError {
            msg: "referenced object does not exist".into(),
            kind: ApiErrorKind::InvalidInput,
            key: Some("not-found"),
            field: None,
        }
    } else {
        e.into()
    }
}


#[cfg(test)]
mod tests {
    use juniper::{DefaultScalarValue, IntoFieldError, graphql_value};

    #[test]
    fn extensions() {
        let err: juniper::FieldError<DefaultScalarValue> = invalid_input!(
            key = "unique",
            field = "slug",
            "slug '{}' taken",
            "about",
        ).into_field_error();
        assert_eq!(err.message(), "Invalid input: slug 'about' taken");
        assert_eq!(err.extensions(), &graphql_value!({
            "kind": "INVALID_INPUT",
            "key": "unique",
            "field": "slug",
        }));

        let err: juniper::FieldError<DefaultScalarValue>
            = not_authorized!("nope").into_field_error();
        assert_eq!(err.extensions(), &graphql_value!({ "kind": "NOT_AUTHORIZED" }));
    }

    #[test]
    fn field_can_be_added_later() {
        let err = internal_server_error!("x").on_field("input");
        assert_eq!(err.field, Some("input"));
        assert_eq!(err.kind.kind_str(), "INTERNAL_SERVER_ERROR");
    }
}
