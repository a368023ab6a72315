#![warn(missing_docs)]

//! # pvault-path
//!
//! A safe mini-language for addressing nested values inside vault-returned
//! JSON, used when projecting objects into a display configuration.
//!
//! Grammar: a path is a sequence of segments, each either `.identifier`
//! (identifier = `[A-Za-z_$][A-Za-z0-9_$]*`), `["quoted key"]` (arbitrary
//! string, backslash escapes, may contain dots and unicode) or `[index]`
//! (unsigned base-10 integer, no leading zeros). Example:
//! `a.b[2]["c.d"]`.
//!
//! Lookup is own-property only at every step. JSON maps own nothing
//! implicitly, so names like `length`, `toString` or `__proto__` resolve only
//! when the source object literally carries a same-named key — there is no
//! prototype chain to fall back to, and no name is special-cased.

use serde_json::Value;
use thiserror::Error;

/// Errors from parsing or resolving a path expression.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    /// The path string was empty.
    #[error("empty path")]
    EmptyPath,

    /// The path started with a dot.
    #[error("path cannot start with a dot")]
    LeadingDot,

    /// The path ended in the middle of a segment.
    #[error("unexpected end of path")]
    UnexpectedEnd,

    /// A segment had an empty key.
    #[error("empty key")]
    EmptyKey,

    /// A dotted segment was not a valid identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A quoted key ended with a dangling backslash.
    #[error("invalid escape sequence")]
    InvalidEscape,

    /// A quoted key was not closed before the end of the path.
    #[error("unterminated quoted key")]
    UnterminatedQuote,

    /// A bracket segment was missing its closing bracket.
    #[error("expected closing bracket")]
    ExpectedClosingBracket,

    /// An unquoted bracket key was not an unsigned integer, or a bracketed
    /// unquoted key was applied to an object.
    #[error("invalid key in bracket notation")]
    InvalidBracketKey,

    /// Resolution reached a value that is neither an object nor an array.
    #[error("cannot access property on non-object")]
    NonObject,

    /// An array was accessed with anything but an unquoted bracket index.
    #[error("invalid array access")]
    InvalidArrayAccess,

    /// The array index was out of range.
    #[error("array index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// The object did not own the requested key.
    #[error("property {0} does not exist")]
    MissingProperty(String),
}

/// One parsed path segment, consumed left-to-right against a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The key or index text.
    pub key: String,
    /// Whether the segment was a quoted bracket key.
    pub is_quoted: bool,
    /// Whether the segment used bracket notation.
    pub has_brackets: bool,
}

/// Follow `path` into `value`.
///
/// With no path, returns `value` unchanged (including null and primitives).
/// With a path, tokenizes then reduces one step per token.
pub fn follow_path<'a>(value: &'a Value, path: Option<&str>) -> Result<&'a Value, PathError> {
    let Some(path) = path else {
        return Ok(value);
    };

    let tokens = parse_path(path)?;
    if tokens.is_empty() {
        return Err(PathError::EmptyPath);
    }

    tokens
        .iter()
        .try_fold(value, |current, token| access_property(current, token))
}

/// Parse a path expression into tokens.
pub fn parse_path(path: &str) -> Result<Vec<Token>, PathError> {
    Parser {
        chars: path.chars().collect(),
        index: 0,
    }
    .parse()
}

struct Parser {
    chars: Vec<char>,
    index: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Vec<Token>, PathError> {
        let mut tokens = Vec::new();

        if self.chars.is_empty() {
            return Ok(tokens);
        }
        if self.chars[0] == '.' {
            return Err(PathError::LeadingDot);
        }

        while self.index < self.chars.len() {
            let mut has_brackets = false;
            let mut is_quoted = false;
            let key;

            match self.chars[self.index] {
                '.' => {
                    self.index += 1;
                    if self.index >= self.chars.len() {
                        return Err(PathError::UnexpectedEnd);
                    }
                    key = self.parse_key()?;
                }
                '[' => {
                    has_brackets = true;
                    self.index += 1;
                    if self.index >= self.chars.len() {
                        return Err(PathError::UnexpectedEnd);
                    }
                    if self.chars[self.index] == '"' || self.chars[self.index] == '\'' {
                        is_quoted = true;
                        key = self.parse_quoted_key()?;
                    } else {
                        key = self.parse_unquoted_key()?;
                    }
                }
                _ => key = self.parse_key()?,
            }

            tokens.push(Token {
                key,
                is_quoted,
                has_brackets,
            });
        }

        Ok(tokens)
    }

    fn parse_key(&mut self) -> Result<String, PathError> {
        let mut key = String::new();
        while self.index < self.chars.len()
            && self.chars[self.index] != '.'
            && self.chars[self.index] != '['
        {
            key.push(self.chars[self.index]);
            self.index += 1;
        }
        if key.is_empty() {
            return Err(PathError::EmptyKey);
        }
        if !is_identifier(&key) {
            return Err(PathError::InvalidIdentifier(key));
        }
        Ok(key)
    }

    fn parse_quoted_key(&mut self) -> Result<String, PathError> {
        let quote_char = self.chars[self.index];
        self.index += 1;
        let mut key = String::new();
        while self.index < self.chars.len() {
            if self.chars[self.index] == '\\' {
                self.index += 1;
                if self.index >= self.chars.len() {
                    return Err(PathError::InvalidEscape);
                }
                key.push(self.chars[self.index]);
                self.index += 1;
            } else if self.chars[self.index] == quote_char {
                self.index += 1;
                if self.index >= self.chars.len() || self.chars[self.index] != ']' {
                    return Err(PathError::ExpectedClosingBracket);
                }
                self.index += 1;
                return Ok(key);
            } else {
                key.push(self.chars[self.index]);
                self.index += 1;
            }
        }
        Err(PathError::UnterminatedQuote)
    }

    fn parse_unquoted_key(&mut self) -> Result<String, PathError> {
        let mut key = String::new();
        while self.index < self.chars.len() && self.chars[self.index] != ']' {
            key.push(self.chars[self.index]);
            self.index += 1;
        }
        if self.index >= self.chars.len() || self.chars[self.index] != ']' {
            return Err(PathError::ExpectedClosingBracket);
        }
        self.index += 1;
        if key.is_empty() {
            return Err(PathError::EmptyKey);
        }
        // Unquoted bracket keys must be array indices
        if !is_index(&key) {
            return Err(PathError::InvalidBracketKey);
        }
        Ok(key)
    }
}

/// `[A-Za-z_$][A-Za-z0-9_$]*`
fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// `^(0|[1-9][0-9]*)$` — no leading zeros, no sign, no fraction.
fn is_index(key: &str) -> bool {
    match key.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        digits => digits.iter().all(|b| b.is_ascii_digit()),
    }
}

/// Traverse one step deeper using `token`.
fn access_property<'a>(current: &'a Value, token: &Token) -> Result<&'a Value, PathError> {
    match current {
        Value::Array(items) => {
            // Arrays accept only unquoted numeric indices in bracket notation
            if !token.has_brackets || token.is_quoted {
                return Err(PathError::InvalidArrayAccess);
            }
            let index: usize = token
                .key
                .parse()
                .map_err(|_| PathError::InvalidBracketKey)?;
            items.get(index).ok_or(PathError::IndexOutOfBounds(index))
        }
        Value::Object(map) => {
            if token.has_brackets && !token.is_quoted {
                return Err(PathError::InvalidBracketKey);
            }
            map.get(&token.key)
                .ok_or_else(|| PathError::MissingProperty(token.key.clone()))
        }
        _ => Err(PathError::NonObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn follow(value: &Value, path: &str) -> Result<Value, PathError> {
        follow_path(value, Some(path)).cloned()
    }

    #[test]
    fn no_path_returns_value_as_is() {
        assert_eq!(follow_path(&json!(42), None).unwrap(), &json!(42));
        assert_eq!(
            follow_path(&json!({"foo": 42}), None).unwrap(),
            &json!({"foo": 42})
        );
        assert_eq!(follow_path(&json!([42]), None).unwrap(), &json!([42]));
        assert_eq!(follow_path(&json!(null), None).unwrap(), &json!(null));
    }

    #[test]
    fn empty_path_is_an_error() {
        assert_eq!(follow(&json!(42), ""), Err(PathError::EmptyPath));
        assert_eq!(follow(&json!({"foo": 42}), ""), Err(PathError::EmptyPath));
        assert_eq!(follow(&json!([42]), ""), Err(PathError::EmptyPath));
    }

    #[test]
    fn object_properties() {
        let value = json!({"a": 1, "b": 2});
        assert_eq!(follow(&value, "a").unwrap(), json!(1));
        assert_eq!(follow(&value, "b").unwrap(), json!(2));
    }

    #[test]
    fn nested_properties() {
        let value = json!({"a": {"b": {"c": 1, "d": 2}}});
        assert_eq!(follow(&value, "a.b.d").unwrap(), json!(2));
    }

    #[test]
    fn missing_properties() {
        assert!(matches!(
            follow(&json!({"a": {"b": 1}}), "a.c"),
            Err(PathError::MissingProperty(_))
        ));
        assert!(matches!(
            follow(&json!({"a": 1}), "b"),
            Err(PathError::MissingProperty(_))
        ));
    }

    #[test]
    fn array_elements() {
        assert_eq!(follow(&json!([10, 20, 30]), "[1]").unwrap(), json!(20));
        assert_eq!(follow(&json!(["foo", 42, {}]), "[0]").unwrap(), json!("foo"));
        assert_eq!(
            follow(&json!({"a": [{"b": 42}, {"c": ["foo", "bar"]}]}), "a[1].c[0]").unwrap(),
            json!("foo")
        );
    }

    #[test]
    fn array_index_out_of_bounds() {
        assert_eq!(
            follow(&json!([1, 2, 3]), "[3]"),
            Err(PathError::IndexOutOfBounds(3))
        );
    }

    #[test]
    fn array_rejects_dotted_and_quoted_access() {
        assert_eq!(
            follow(&json!([1, 2, 3]), "length"),
            Err(PathError::InvalidArrayAccess)
        );
        assert_eq!(
            follow(&json!([1, 2, 3]), r#"["1"]"#),
            Err(PathError::InvalidArrayAccess)
        );
    }

    #[test]
    fn bracket_keys_with_special_characters() {
        assert_eq!(follow(&json!({"[a]": 10}), r#"["[a]"]"#).unwrap(), json!(10));
        assert_eq!(
            follow(
                &json!({"key with spaces": {"@!$": 42}}),
                r#"["key with spaces"]["@!$"]"#
            )
            .unwrap(),
            json!(42)
        );
        assert_eq!(follow(&json!({"a.b": 1}), r#"["a.b"]"#).unwrap(), json!(1));
        assert_eq!(follow(&json!({"🦄": "unicorn"}), r#"["🦄"]"#).unwrap(), json!("unicorn"));
    }

    #[test]
    fn escaped_quotes_and_backslashes() {
        assert_eq!(
            follow(&json!({"quo\"te": 1}), r#"["quo\"te"]"#).unwrap(),
            json!(1)
        );
        assert_eq!(
            follow(&json!({"back\\slash": 2}), r#"["back\\slash"]"#).unwrap(),
            json!(2)
        );
        assert_eq!(follow(&json!({"sq'": 3}), "['sq\\'']").unwrap(), json!(3));
    }

    #[test]
    fn single_quoted_keys() {
        assert_eq!(follow(&json!({"a b": 1}), "['a b']").unwrap(), json!(1));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(follow(&json!({"a": 1}), ".a"), Err(PathError::LeadingDot));
        assert_eq!(follow(&json!(42), "."), Err(PathError::LeadingDot));
        assert_eq!(
            follow(&json!({"a": {"b": 1}}), "a..b"),
            Err(PathError::EmptyKey)
        );
        assert_eq!(follow(&json!({"a": 1}), "a."), Err(PathError::UnexpectedEnd));
        assert_eq!(follow(&json!([1]), "["), Err(PathError::UnexpectedEnd));
        assert_eq!(
            follow(&json!([1]), "[0"),
            Err(PathError::ExpectedClosingBracket)
        );
        assert_eq!(
            follow(&json!({"a": 1}), r#"["a"#),
            Err(PathError::UnterminatedQuote)
        );
        assert_eq!(
            follow(&json!({"a": 1}), r#"["a"x"#),
            Err(PathError::ExpectedClosingBracket)
        );
        assert_eq!(follow(&json!([1]), "[]"), Err(PathError::EmptyKey));
    }

    #[test]
    fn dot_notation_must_be_an_identifier() {
        // numeric array index with a dot accessor is a parse error
        assert!(matches!(
            follow(&json!({"a": [1]}), "a.10"),
            Err(PathError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            follow(&json!({"a": 1}), "a.b-c"),
            Err(PathError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn unquoted_bracket_keys_must_be_integers() {
        assert_eq!(follow(&json!([1]), "[01]"), Err(PathError::InvalidBracketKey));
        assert_eq!(follow(&json!([1]), "[-1]"), Err(PathError::InvalidBracketKey));
        assert_eq!(follow(&json!([1]), "[1.5]"), Err(PathError::InvalidBracketKey));
        assert_eq!(follow(&json!([1]), "[a]"), Err(PathError::InvalidBracketKey));
    }

    #[test]
    fn unquoted_bracket_integer_on_object_fails() {
        // {"10": …} must be addressed as ["10"], not [10]
        assert_eq!(
            follow(&json!({"10": "x"}), "[10]"),
            Err(PathError::InvalidBracketKey)
        );
        assert_eq!(follow(&json!({"10": "x"}), r#"["10"]"#).unwrap(), json!("x"));
    }

    #[test]
    fn primitives_are_not_traversable() {
        assert_eq!(follow(&json!(42), "a"), Err(PathError::NonObject));
        assert_eq!(follow(&json!(42), "toString"), Err(PathError::NonObject));
        assert_eq!(follow(&json!("str"), "a"), Err(PathError::NonObject));
        assert_eq!(follow(&json!(null), "a"), Err(PathError::NonObject));
        assert_eq!(follow(&json!({"a": 1}), "a.b"), Err(PathError::NonObject));
    }

    #[test]
    fn inherited_names_fail_unless_shadowed() {
        // JSON maps own nothing implicitly
        assert!(matches!(
            follow(&json!({"foo": "x"}), "__proto__"),
            Err(PathError::MissingProperty(_))
        ));
        assert!(matches!(
            follow(&json!({"foo": "x"}), "constructor"),
            Err(PathError::MissingProperty(_))
        ));
        assert!(matches!(
            follow(&json!({"foo": "x"}), "toString"),
            Err(PathError::MissingProperty(_))
        ));
    }

    #[test]
    fn own_dunder_keys_resolve_like_any_other_key() {
        let value: Value = serde_json::from_str(r#"{"__proto__": "foo"}"#).unwrap();
        assert_eq!(follow(&value, "__proto__").unwrap(), json!("foo"));

        let value: Value =
            serde_json::from_str(r#"{"a": {"__proto__": {"polluted": true}}}"#).unwrap();
        assert_eq!(
            follow(&value, "a.__proto__").unwrap(),
            json!({"polluted": true})
        );

        let value: Value = serde_json::from_str(r#"{"constructor": {"prototype": 1}}"#).unwrap();
        assert_eq!(follow(&value, "constructor.prototype").unwrap(), json!(1));
    }

    #[test]
    fn walk_generated_paths_round_trip() {
        // any path generated by walking the value's own structure resolves to
        // the sub-value reached by that walk
        let root = json!({
            "a": {"b": [10, {"c.d": {"e": "deep"}}, [1, 2]]},
            "weird key": {"$ok": true},
        });

        let cases = [
            ("a", json!({"b": [10, {"c.d": {"e": "deep"}}, [1, 2]]})),
            ("a.b", json!([10, {"c.d": {"e": "deep"}}, [1, 2]])),
            ("a.b[0]", json!(10)),
            (r#"a.b[1]["c.d"]"#, json!({"e": "deep"})),
            (r#"a.b[1]["c.d"].e"#, json!("deep")),
            ("a.b[2][1]", json!(2)),
            (r#"["weird key"].$ok"#, json!(true)),
        ];
        for (path, expected) in cases {
            assert_eq!(follow(&root, path).unwrap(), expected, "path {path}");
        }
    }
}
