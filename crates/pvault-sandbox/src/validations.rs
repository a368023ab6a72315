//! Per-data-type value validation for collected fields.
//!
//! The table is keyed by the collection's `dataTypeName`. A validator
//! returns `None` for a valid value and a short user-facing message
//! otherwise. Types with no entry are accepted as-is.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use url::Url;

static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-([0-9a-f]{4}-){3}[0-9a-f]{12}$").unwrap()
});
static CC_EXPIRATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/([0-9]{2}|[0-9]{4})$").unwrap());
static CVV: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{3,4}$").unwrap());
static BAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{5,17}$").unwrap());
static US_ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}([ -][0-9]{4})?$").unwrap());
static SSN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{3}[ -]?(0[1-9]|[1-9][0-9])[ -]?([1-9][0-9]{3}|[0-9][1-9][0-9]{2}|[0-9]{2}[1-9][0-9]|[0-9]{3}[1-9])$",
    )
    .unwrap()
});
static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]?[0-9]{7,14}$").unwrap());
static US_BANK_ROUTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([0-9]{9})|([0-9]{4}/[0-9]{4})|(([0-9]{2})-([0-9]{4})/([0-9]{4})))$").unwrap()
});
static CC_NUMBER_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13,19}$").unwrap());
static DOUBLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"( {2}|-{2})").unwrap());

/// Validates `value` under the rule registered for `data_type_name`.
pub fn validate(data_type_name: &str, value: &str) -> Option<String> {
    let failed = match data_type_name {
        "OBJECT_ID" => (!OBJECT_ID.is_match(value)).then_some("Invalid Object ID"),
        "URL" => Url::parse(value).is_err().then_some("Invalid URL"),
        "PHONE_NUMBER" => (!is_valid_phone_number(value)).then_some("Invalid phone number"),
        "ZIP_CODE_US" => (!US_ZIP_CODE.is_match(value)).then_some("Invalid zip code"),
        "SSN" => (value.len() != 11 || !SSN.is_match(value)).then_some("Invalid SSN"),
        "BAN" => (!BAN.is_match(value)).then_some("Invalid BAN"),
        "TIMESTAMP" => (!is_valid_timestamp(value)).then_some("Invalid timestamp"),
        "DATE" | "DATE_OF_BIRTH" => (!is_valid_date(value)).then_some("Invalid date"),
        "CC_NUMBER" => (!is_valid_card_number(value)).then_some("Invalid card number"),
        "CC_EXPIRATION_STRING" => {
            (!CC_EXPIRATION.is_match(value)).then_some("Invalid card expiration")
        }
        "CC_CVV" => (!CVV.is_match(value)).then_some("Invalid CVV"),
        "US_BANK_ROUTING" => {
            (!US_BANK_ROUTING.is_match(value)).then_some("Invalid routing number")
        }
        "US_BANK_ACCOUNT_NUMBER" => value.is_empty().then_some("Invalid account number"),
        "TENANT_ID" => value.contains(',').then_some("Invalid tenant ID"),
        // STRING, LONGTEXT, NAME, GENDER, ADDRESS, CC_HOLDER_NAME, BLOB,
        // EMAIL and everything unrecognized pass through unvalidated.
        _ => None,
    };
    failed.map(str::to_owned)
}

fn is_valid_phone_number(value: &str) -> bool {
    let normalized = value.replace('-', "");
    PHONE_NUMBER.is_match(&normalized)
}

fn is_valid_timestamp(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok() || is_valid_date(value)
}

fn is_valid_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .is_ok_and(|date| date.format("%Y-%m-%d").to_string() == value)
}

fn is_valid_card_number(value: &str) -> bool {
    // doubled separators are rejected before normalization strips them
    if DOUBLE_SEPARATOR.is_match(value) {
        return false;
    }
    let normalized: String = value.chars().filter(|ch| *ch != ' ' && *ch != '-').collect();
    if !CC_NUMBER_DIGITS.is_match(&normalized) {
        return false;
    }
    luhn_check(&normalized)
}

fn luhn_check(card_number: &str) -> bool {
    let digits: Vec<u32> = card_number
        .chars()
        .filter_map(|ch| ch.to_digit(10))
        .collect();
    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(position, digit)| {
            if position % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                *digit
            }
        })
        .sum();
    checksum % 10 == 0
}
