use super::*;

/// # Scenario
/// MySQL lock-wait timeout is classified as retryable.
#[test]
fn mysql_lock_timeout_retries() {
    assert_eq!(
        classify(RawError::new(1205, Some("41000"))),
        ErrorClass::Retry
    );
}

/// # Scenario
/// MySQL deadlock is classified as retryable.
#[test]
fn mysql_deadlock_retries() {
    assert_eq!(
        classify(RawError::new(1213, Some("40001"))),
        ErrorClass::Retry
    );
}

/// # Scenario
/// SQL Server's 1205/40001 pair collides numerically with MySQL's lock
/// timeout code but is a distinct deadlock entry — still RETRY.
#[test]
fn sqlserver_deadlock_retries() {
    assert_eq!(
        classify(RawError::new(1205, Some("40001"))),
        ErrorClass::Retry
    );
}

/// # Scenario
/// Oracle serialization failure is classified as retryable.
#[test]
fn oracle_serialization_retries() {
    assert_eq!(
        classify(RawError::new(8177, Some("72000"))),
        ErrorClass::Retry
    );
}

/// # Scenario
/// DB2 deadlock/timeout rollback is classified as retryable.
#[test]
fn db2_deadlock_retries() {
    assert_eq!(
        classify(RawError::new(-911, Some("40001"))),
        ErrorClass::Retry
    );
}

/// # Scenario
/// DB2 query cancellation drops the instance and picks a fresh transaction.
#[test]
fn db2_query_cancelled_retries_different() {
    assert_eq!(
        classify(RawError::new(-952, Some("57014"))),
        ErrorClass::RetryDifferent
    );
    assert_eq!(
        classify(RawError::new(0, Some("57014"))),
        ErrorClass::RetryDifferent
    );
}

/// # Scenario
/// PostgreSQL serialization failure (no exact vendor-code entry) falls
/// through to the SQLSTATE-only table.
#[test]
fn postgres_serialization_retries() {
    assert_eq!(
        classify(RawError::new(0, Some("40001"))),
        ErrorClass::Retry
    );
}

/// # Scenario
/// PostgreSQL out-of-memory and internal-error SQLSTATEs are fatal
/// regardless of vendor code.
#[test]
fn postgres_oom_and_internal_error_are_fatal() {
    assert_eq!(classify(RawError::new(0, Some("53200"))), ErrorClass::Fatal);
    assert_eq!(
        classify(RawError::new(12345, Some("XX000"))),
        ErrorClass::Fatal
    );
}

/// # Scenario
/// "No data" (02000) drops the instance rather than retrying it verbatim.
#[test]
fn no_data_retries_different() {
    assert_eq!(
        classify(RawError::new(0, Some("02000"))),
        ErrorClass::RetryDifferent
    );
}

/// # Scenario
/// A missing SQLSTATE is conservatively treated as retryable.
#[test]
fn null_sqlstate_retries() {
    assert_eq!(classify(RawError::new(42, None)), ErrorClass::Retry);
}

/// # Scenario
/// An error matching neither table classifies as Unknown.
#[test]
fn unrecognized_error_is_unknown() {
    assert_eq!(
        classify(RawError::new(99999, Some("99999"))),
        ErrorClass::Unknown
    );
}

/// # Scenario
/// Classification is a pure function: repeated calls with the same input
/// always agree, across many iterations (determinism law).
#[test]
fn classification_is_deterministic() {
    let cases = [
        RawError::new(1213, Some("40001")),
        RawError::new(0, Some("53200")),
        RawError::new(1, None),
        RawError::new(7, Some("00000")),
    ];

    for case in cases {
        let first = classify(case);
        for _ in 0..100 {
            assert_eq!(classify(case), first);
        }
    }
}

/// # Scenario
/// SQLSTATEs are matched case-insensitively (drivers are inconsistent
/// about casing).
#[test]
fn sqlstate_match_is_case_insensitive() {
    assert_eq!(
        classify(RawError::new(0, Some("xx000"))),
        ErrorClass::Fatal
    );
}
