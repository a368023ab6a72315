#![warn(missing_docs)]

//! # pvault-schema
//!
//! Minimal structural validation combinators for JSON values that cross a
//! trust boundary. Any page script able to reach the sandbox channel can send
//! arbitrary payloads, so every inbound message is checked against a closed
//! allow-list schema before a single field of it is read.
//!
//! The closed-world [`object`] combinator is the load-bearing piece: an object
//! with *any* undeclared key is rejected outright. Unknown keys are never
//! silently passed through, which defeats payloads that smuggle extra keys
//! like `__proto__` through the wire format.
//!
//! Validation is a pure predicate: [`Validator::parse`] returns `bool` and
//! never panics or errors. Callers drop rejected messages and notify the peer
//! with a generic error that does not echo the rejected payload.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

/// A composable predicate over a JSON value.
///
/// Validators are cheap to clone (the predicate is behind an `Arc`) and are
/// typically built once per message direction and reused for every message.
#[derive(Clone)]
pub struct Validator {
    parse_fn: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
    accepts_missing: bool,
}

impl Validator {
    /// Check `value` against this validator.
    pub fn parse(&self, value: &Value) -> bool {
        (self.parse_fn)(value)
    }

    /// Whether an [`object`] key validated by this validator may be absent.
    ///
    /// JSON has no `undefined`; optionality of an object key means the key may
    /// be missing from the map entirely.
    pub fn is_optional(&self) -> bool {
        self.accepts_missing
    }

    /// Mark this validator as accepting a missing object key.
    pub fn optional(self) -> Validator {
        Validator {
            parse_fn: self.parse_fn,
            accepts_missing: true,
        }
    }

    /// Intersect this validator with membership in a fixed literal set.
    pub fn enum_of<V, I>(self, values: I) -> Validator
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let allowed: Vec<Value> = values.into_iter().map(Into::into).collect();
        and(self, from_fn(move |value| allowed.contains(value)))
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("accepts_missing", &self.accepts_missing)
            .finish_non_exhaustive()
    }
}

/// Build a validator from a plain predicate.
pub fn from_fn(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Validator {
    Validator {
        parse_fn: Arc::new(f),
        accepts_missing: false,
    }
}

/// Matches exactly one literal value (string, number or boolean).
pub fn literal(literal_value: impl Into<Value>) -> Validator {
    let expected = literal_value.into();
    from_fn(move |value| *value == expected)
}

/// Matches any JSON string.
pub fn string() -> Validator {
    from_fn(|value| value.is_string())
}

/// Matches any JSON number.
pub fn number() -> Validator {
    from_fn(|value| value.is_number())
}

/// Matches any JSON boolean.
pub fn boolean() -> Validator {
    from_fn(|value| value.is_boolean())
}

/// Matches an array whose every element satisfies `item`.
pub fn array(item: Validator) -> Validator {
    from_fn(move |value| match value {
        Value::Array(items) => items.iter().all(|item_value| item.parse(item_value)),
        _ => false,
    })
}

/// Matches an object against a closed-world schema.
///
/// Every key present in the value must be declared in the schema and satisfy
/// its validator, and every declared key must either be present or be marked
/// [`Validator::optional`]. Undeclared keys reject the whole object.
pub fn object<'a, I>(schema: I) -> Validator
where
    I: IntoIterator<Item = (&'a str, Validator)>,
{
    let schema: BTreeMap<String, Validator> = schema
        .into_iter()
        .map(|(key, validator)| (key.to_owned(), validator))
        .collect();
    from_fn(move |value| match value {
        Value::Object(map) => {
            map.iter().all(|(key, field_value)| {
                schema
                    .get(key)
                    .is_some_and(|validator| validator.parse(field_value))
            }) && schema
                .iter()
                .all(|(key, validator)| map.contains_key(key) || validator.is_optional())
        }
        _ => false,
    })
}

/// Matches an open-world map: every key satisfies `key` and every value
/// satisfies `value`. Unknown keys are permitted as long as they validate.
pub fn record(key: Validator, value: Validator) -> Validator {
    from_fn(move |candidate| match candidate {
        Value::Object(map) => map.iter().all(|(map_key, map_value)| {
            key.parse(&Value::String(map_key.clone())) && value.parse(map_value)
        }),
        _ => false,
    })
}

/// Matches any JSON value. Used for payload positions that are forwarded
/// opaquely (e.g. action inputs) and never destructured by the receiver.
pub fn any() -> Validator {
    from_fn(|_| true)
}

/// Matches when either validator matches.
pub fn or(first: Validator, second: Validator) -> Validator {
    let accepts_missing = first.accepts_missing || second.accepts_missing;
    let mut combined = from_fn(move |value| first.parse(value) || second.parse(value));
    combined.accepts_missing = accepts_missing;
    combined
}

/// Matches when both validators match.
pub fn and(first: Validator, second: Validator) -> Validator {
    from_fn(move |value| first.parse(value) && second.parse(value))
}

/// First-match union over any number of validators.
pub fn one_of<I>(validators: I) -> Validator
where
    I: IntoIterator<Item = Validator>,
{
    let validators: Vec<Validator> = validators.into_iter().collect();
    from_fn(move |value| validators.iter().any(|validator| validator.parse(value)))
}
