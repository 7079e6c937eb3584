//! JSON request bodies with optional strict and required-field checks.
//!
//! Field tables are declared once per type with [`json_fields!`](crate::json_fields)
//! and checked against the decoded document before it is deserialized.

use crate::{errors::Error, Context};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// One entry of a type's JSON field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key as it appears in the JSON document.
    pub name: &'static str,
    pub required: bool,
}

/// Types with a static JSON field table, usually implemented through
/// [`json_fields!`](crate::json_fields).
pub trait JsonFields {
    const FIELDS: &'static [FieldSpec];
}

/// Arrays of objects share the element's table.
impl<T: JsonFields> JsonFields for Vec<T> {
    const FIELDS: &'static [FieldSpec] = T::FIELDS;
}

/// Implements [`JsonFields`] for a type.
///
/// Fields followed by `=> required` must be present and not `null` when
/// [`JsonOptions::validate`] is set.
///
/// ```
/// use maker_route::{json_fields, JsonFields};
///
/// #[derive(serde::Deserialize)]
/// struct Login {
///     name: String,
///     password: String,
///     remember: Option<bool>,
/// }
///
/// json_fields!(Login { "name" => required, "password" => required, "remember" });
///
/// assert_eq!(Login::FIELDS.len(), 3);
/// assert!(Login::FIELDS[0].required);
/// assert!(!Login::FIELDS[2].required);
/// ```
#[macro_export]
macro_rules! json_fields {
    (@required required) => { true };
    (@required) => { false };

    ($ty:ty { $($name:literal $(=> $req:ident)?),* $(,)? }) => {
        impl $crate::JsonFields for $ty {
            const FIELDS: &'static [$crate::FieldSpec] = &[$(
                $crate::FieldSpec {
                    name: $name,
                    required: $crate::json_fields!(@required $($req)?),
                },
            )*];
        }
    };
}

/// Checks applied by [`Context::parse_json`] before deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonOptions {
    /// Reject keys missing from the field table.
    pub disallow_unknown_fields: bool,

    /// Require every field marked `required`. For an array body only the
    /// first element is checked.
    pub validate: bool,
}

impl JsonOptions {
    /// Both checks enabled.
    #[inline]
    pub const fn strict() -> Self {
        Self {
            disallow_unknown_fields: true,
            validate: true,
        }
    }
}

impl Context {
    /// Deserializes the body with no extra checks.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self.body();
        if body.is_empty() {
            return Err(Error::EmptyBody);
        }

        Ok(serde_json::from_slice(body)?)
    }

    /// Deserializes the body into `T`, an object or an array of objects,
    /// applying `options` against `T::FIELDS`.
    ///
    /// ```
    /// use maker_route::{json_fields, Context, Error, JsonOptions, Method, Request};
    ///
    /// #[derive(Debug, serde::Deserialize)]
    /// struct User {
    ///     name: String,
    ///     email: Option<String>,
    /// }
    /// json_fields!(User { "name", "email" => required });
    ///
    /// let ctx = Context::new(Request::new(Method::Post, "/user").with_body(r#"{"name":"jerry"}"#));
    ///
    /// let user: User = ctx.parse_json(JsonOptions::default()).unwrap();
    /// assert_eq!(user.name, "jerry");
    ///
    /// let err = ctx.parse_json::<User>(JsonOptions::strict()).unwrap_err();
    /// assert!(matches!(err, Error::MissingField("email")));
    /// ```
    pub fn parse_json<T>(&self, options: JsonOptions) -> Result<T, Error>
    where
        T: DeserializeOwned + JsonFields,
    {
        if !options.disallow_unknown_fields && !options.validate {
            return self.bind_json();
        }

        let body = self.body();
        if body.is_empty() {
            return Err(Error::EmptyBody);
        }

        let value: Value = serde_json::from_slice(body)?;
        check::<T>(&value, options)?;

        Ok(serde_json::from_value(value)?)
    }
}

fn check<T: JsonFields>(value: &Value, options: JsonOptions) -> Result<(), Error> {
    match value {
        Value::Object(object) => {
            if options.disallow_unknown_fields {
                known_only(object, T::FIELDS)?;
            }
            if options.validate {
                required(object, T::FIELDS)?;
            }
        }
        Value::Array(items) => {
            if options.disallow_unknown_fields {
                for item in items {
                    known_only(item.as_object().ok_or(Error::UnexpectedShape)?, T::FIELDS)?;
                }
            }
            if options.validate {
                if let Some(first) = items.first() {
                    required(first.as_object().ok_or(Error::UnexpectedShape)?, T::FIELDS)?;
                }
            }
        }
        _ => return Err(Error::UnexpectedShape),
    }

    Ok(())
}

#[inline]
fn known_only(object: &Map<String, Value>, fields: &[FieldSpec]) -> Result<(), Error> {
    match object.keys().find(|key| !fields.iter().any(|f| f.name == *key)) {
        Some(unknown) => Err(Error::UnknownField(unknown.clone())),
        None => Ok(()),
    }
}

#[inline]
fn required(object: &Map<String, Value>, fields: &[FieldSpec]) -> Result<(), Error> {
    let missing = fields
        .iter()
        .filter(|f| f.required)
        .find(|f| object.get(f.name).map_or(true, Value::is_null));

    match missing {
        Some(field) => Err(Error::MissingField(field.name)),
        None => Ok(()),
    }
}
