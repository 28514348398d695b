//! Human-readable sequential codes such as `CERT-202610-0001`.
//!
//! The sequence restarts every calendar month (UTC). Numbers are handed out by
//! bumping a `code_counters` row inside the caller's transaction, so two
//! concurrent issuances can never read the same value and a rolled-back insert
//! gives its number back.

use anyhow::Context;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Certificate,
    Transcript,
}

impl CodeKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CodeKind::Certificate => "CERT",
            CodeKind::Transcript => "TRANS",
        }
    }
}

/// `YYYYMM` of the given instant.
pub fn period_of(now: OffsetDateTime) -> String {
    format!("{:04}{:02}", now.year(), u8::from(now.month()))
}

/// Four digits is a minimum width; the sequence keeps counting past 9999.
pub fn format_code(kind: CodeKind, period: &str, sequence: i32) -> String {
    format!("{}-{}-{:04}", kind.prefix(), period, sequence)
}

/// Reserves the next code for `now`'s month within `tx`.
pub async fn allocate_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: CodeKind,
    now: OffsetDateTime,
) -> anyhow::Result<String> {
    let period = period_of(now);
    let sequence: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO code_counters (prefix, period, value)
        VALUES ($1, $2, 1)
        ON CONFLICT (prefix, period)
        DO UPDATE SET value = code_counters.value + 1
        RETURNING value
        "#,
    )
    .bind(kind.prefix())
    .bind(&period)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("allocate {} sequence for {}", kind.prefix(), period))?;

    Ok(format_code(kind, &period, sequence))
}

/// Checks the `PREFIX-YYYYMM-NNNN` shape.
pub fn is_well_formed(kind: CodeKind, code: &str) -> bool {
    let Some(rest) = code
        .strip_prefix(kind.prefix())
        .and_then(|r| r.strip_prefix('-'))
    else {
        return false;
    };
    let Some((period, sequence)) = rest.split_once('-') else {
        return false;
    };
    period.len() == 6
        && period.bytes().all(|b| b.is_ascii_digit())
        && sequence.len() >= 4
        && sequence.bytes().all(|b| b.is_ascii_digit())
}
