//! Transaction ID formula
//!
//! `{PREFIX}{yyMMddHHmmss}{IDENT}{D}` where `IDENT` is the first five
//! characters of the identifier as given (ASCII upper-cased, right-padded
//! with `0`) and `D` is the byte sum of everything before it, mod 10.
//!
//! Same inputs always give the same id. Two requests with the same
//! identifier prefix in the same second collide; callers that need
//! uniqueness must supply distinct identifiers.

use chrono::{DateTime, Utc};

const IDENT_LEN: usize = 5;

/// Build a transaction id
pub fn generate(prefix: &str, at: DateTime<Utc>, identifier: &str) -> String {
    let mut ident: String = identifier
        .chars()
        .take(IDENT_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    for _ in ident.chars().count()..IDENT_LEN {
        ident.push('0');
    }

    let body = format!("{}{}{}", prefix, at.format("%y%m%d%H%M%S"), ident);
    let check = body.bytes().map(u32::from).sum::<u32>() % 10;

    format!("{}{}", body, check)
}
