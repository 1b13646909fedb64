//! # Error Classifier
//!
//! Maps a raw database error — a vendor error code plus an optional SQLSTATE —
//! to one of a small set of [`ErrorClass`] values the rest of the engine acts
//! on. This is a pure function: no I/O, no locks, no error type of its own.
//!
//! ## Lookup order
//!
//! Three tables are consulted in order, and the first hit wins:
//!
//! 1. Exact `(vendor_code, sqlstate)` match.
//! 2. `sqlstate`-only match.
//! 3. A fixed set of SQLSTATEs that always force [`ErrorClass::Fatal`].
//!
//! A `None` SQLSTATE (driver gave none) classifies as [`ErrorClass::Retry`] —
//! conservative, since we cannot tell a transient condition from a permanent
//! one without it.
//!
//! Anything that matches none of the tables falls back to
//! [`ErrorClass::Unknown`], which the worker treats as retryable up to a cap.

#[cfg(test)]
mod tests;

/// The outcome bucket a database error is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Same transaction, same parameters, retry after a short jittered backoff.
    Retry,
    /// Drop this transaction instance; the worker should choose a fresh one.
    RetryDifferent,
    /// The transaction body deliberately rolled back as part of the benchmark spec.
    UserAbort,
    /// Not to be retried; the worker tears down and reconnects the session.
    Fatal,
    /// No rule matched; treated as [`ErrorClass::Retry`] up to a cap.
    Unknown,
}

/// A raw database error as reported by the driver layer.
///
/// `vendor_code` is the vendor-specific numeric error code (may be negative,
/// e.g. DB2). `sqlstate` is the five-character standardized status code, when
/// the driver supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawError<'a> {
    pub vendor_code: i64,
    pub sqlstate: Option<&'a str>,
}

impl<'a> RawError<'a> {
    pub fn new(vendor_code: i64, sqlstate: Option<&'a str>) -> Self {
        Self {
            vendor_code,
            sqlstate,
        }
    }
}

/// Exact `(vendor_code, sqlstate)` matches, consulted first.
///
/// Ordered by vendor for readability; lookup is linear since the table is
/// small and fixed at compile time.
const EXACT_TABLE: &[(i64, &str, ErrorClass)] = &[
    // MySQL
    (1213, "40001", ErrorClass::Retry), // deadlock found when trying to get lock
    (1205, "41000", ErrorClass::Retry), // lock wait timeout exceeded
    // SQL Server
    (1205, "40001", ErrorClass::Retry), // deadlock victim
    // Oracle
    (8177, "72000", ErrorClass::Retry), // can't serialize access for this transaction
    // DB2
    (-911, "40001", ErrorClass::Retry), // deadlock or timeout, rollback
    (0, "57014", ErrorClass::RetryDifferent),
    (-952, "57014", ErrorClass::RetryDifferent), // processing interrupted (query cancelled)
];

/// SQLSTATE-only matches, consulted after the exact table misses.
const SQLSTATE_TABLE: &[(&str, ErrorClass)] = &[
    ("40001", ErrorClass::Retry),         // serialization failure (PostgreSQL et al.)
    ("53200", ErrorClass::Fatal),         // PostgreSQL: out of memory
    ("XX000", ErrorClass::Fatal),         // PostgreSQL: internal error
    ("57014", ErrorClass::RetryDifferent),
    ("02000", ErrorClass::RetryDifferent), // no data
];

/// Classifies a raw database error into an [`ErrorClass`].
///
/// Deterministic: the same input always yields the same output, and the
/// lookup order above is fixed, so repeated calls across threads or runs
/// never disagree.
pub fn classify(err: RawError<'_>) -> ErrorClass {
    let Some(sqlstate) = err.sqlstate else {
        return ErrorClass::Retry;
    };

    for &(code, state, class) in EXACT_TABLE {
        if code == err.vendor_code && state.eq_ignore_ascii_case(sqlstate) {
            return class;
        }
    }

    for &(state, class) in SQLSTATE_TABLE {
        if state.eq_ignore_ascii_case(sqlstate) {
            return class;
        }
    }

    ErrorClass::Unknown
}
