//! Shared helpers for backend integration tests.
//!
//! Integration tests compile as separate crates, so helpers used by more than
//! one suite live here and are pulled in with `mod support;`.

pub mod pg_embed;

pub use pg_embed::test_cluster;

/// Decide what to do when the embedded cluster cannot start.
///
/// With `SKIP_TEST_CLUSTER` set to `1`, `true` or `yes` the failure is logged
/// and `None` returned so the caller can bail out; otherwise the test panics.
pub fn skip_without_cluster<T>(reason: impl std::fmt::Display) -> Option<T> {
    let skip = std::env::var("SKIP_TEST_CLUSTER")
        .is_ok_and(|value| ["1", "true", "yes"].contains(&value.to_lowercase().as_str()));
    assert!(
        skip,
        "embedded PostgreSQL unavailable: {reason}. Set SKIP_TEST_CLUSTER=1 to skip."
    );
    eprintln!("SKIP-TEST-CLUSTER: {reason}");
    None
}
