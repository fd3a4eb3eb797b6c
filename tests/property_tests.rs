//! Property-based tests for the lock protocol and its types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs and operation sequences.

use std::time::Duration;

use proptest::prelude::*;

use relock::core::channel::{channel_name, CHANNEL_PREFIX};
use relock::core::types::{LockKey, OwnerToken};
use relock::lock::retry::{LimitRetry, LinearBackoff, RetryStrategy};
use relock::lock::{LockClient, LockOptions, ReleaseOutcome};
use relock::store::memory::MemoryStore;

const TTL: Duration = Duration::from_secs(30);

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Strategy for generating valid lock keys.
fn valid_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:_{}./ -]{1,40}"
}

/// One step against a single key: which owner, and acquire or release.
#[derive(Debug, Clone, Copy)]
enum Step {
    Acquire(usize),
    Release(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..3usize).prop_map(Step::Acquire),
        (0..3usize).prop_map(Step::Release),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// N reentrant acquisitions need exactly N releases.
    #[test]
    fn reentrancy_depth_matches_releases(depth in 1usize..12) {
        let rt = runtime();
        rt.block_on(async {
            let store = MemoryStore::new();
            let client = LockClient::with_store(store.clone());
            let key = LockKey::new("depth").unwrap();
            let owner = OwnerToken::generate();

            let mut locks = Vec::new();
            for _ in 0..depth {
                locks.push(
                    client
                        .try_lock_as(&owner, &key, Duration::ZERO, TTL, LockOptions::new())
                        .await
                        .unwrap(),
                );
            }
            assert_eq!(store.hold_count("depth", owner.as_str()), Some(depth as i64));

            for (i, lock) in locks.iter().enumerate() {
                let expected = if i + 1 == depth {
                    ReleaseOutcome::Released
                } else {
                    ReleaseOutcome::StillHeld
                };
                assert_eq!(lock.unlock().await.unwrap(), expected);
            }

            assert!(!store.exists("depth"));
            assert_eq!(store.published().len(), 1);
            assert_eq!(locks[0].unlock().await.unwrap(), ReleaseOutcome::NotHeld);
        });
    }

    /// Any interleaving of owners keeps at most one holder, and every
    /// outcome matches a simple counter model.
    #[test]
    fn mutual_exclusion_holds(steps in prop::collection::vec(step(), 1..40)) {
        let rt = runtime();
        rt.block_on(async {
            let store = MemoryStore::new();
            let client = LockClient::with_store(store.clone());
            let key = LockKey::new("mutex").unwrap();
            let owners: Vec<_> = (0..3).map(|_| OwnerToken::generate()).collect();

            // (holder index, count)
            let mut model: Option<(usize, i64)> = None;
            let mut publishes = 0;

            for step in steps {
                match step {
                    Step::Acquire(i) => {
                        let result = client
                            .try_lock_as(&owners[i], &key, Duration::ZERO, TTL, LockOptions::new())
                            .await;
                        match model {
                            None => {
                                assert!(result.is_ok());
                                model = Some((i, 1));
                            }
                            Some((holder, count)) if holder == i => {
                                assert!(result.is_ok());
                                model = Some((holder, count + 1));
                            }
                            Some(_) => assert!(result.unwrap_err().is_not_obtained()),
                        }
                    }
                    Step::Release(i) => {
                        let outcome = client
                            .adopt(key.clone(), owners[i].clone(), TTL)
                            .unlock()
                            .await
                            .unwrap();
                        match model {
                            Some((holder, 1)) if holder == i => {
                                assert_eq!(outcome, ReleaseOutcome::Released);
                                model = None;
                                publishes += 1;
                            }
                            Some((holder, count)) if holder == i => {
                                assert_eq!(outcome, ReleaseOutcome::StillHeld);
                                model = Some((holder, count - 1));
                            }
                            _ => assert_eq!(outcome, ReleaseOutcome::NotHeld),
                        }
                    }
                }

                assert!(store.field_count("mutex") <= 1);
                assert_eq!(store.exists("mutex"), model.is_some());
                if let Some((holder, count)) = model {
                    assert_eq!(store.hold_count("mutex", owners[holder].as_str()), Some(count));
                }
            }
            assert_eq!(store.published().len(), publishes);
        });
    }

    /// LimitRetry hands out exactly `max` backoffs, then stops for good.
    #[test]
    fn limit_retry_stops_after_cap(max in 0usize..50, ms in 1u64..10_000, extra in 1usize..10) {
        let backoff = Duration::from_millis(ms);
        let mut retry = LimitRetry::new(LinearBackoff::new(backoff), max);

        for _ in 0..max {
            prop_assert_eq!(retry.next_backoff(), Some(backoff));
        }
        for _ in 0..extra {
            prop_assert_eq!(retry.next_backoff(), None);
        }
        prop_assert_eq!(retry.attempts(), max);
    }

    /// Nested caps take the tighter one.
    #[test]
    fn nested_limits_compose(outer in 0usize..20, inner in 0usize..20) {
        let mut retry = LimitRetry::new(
            LimitRetry::new(LinearBackoff::new(Duration::from_millis(5)), inner),
            outer,
        );
        let given = std::iter::from_fn(|| retry.next_backoff()).take(100).count();
        prop_assert_eq!(given, outer.min(inner));
    }

    /// The channel name wraps the key verbatim.
    #[test]
    fn channel_name_wraps_key(name in valid_key()) {
        let key = LockKey::new(name.clone()).unwrap();
        let channel = channel_name(&key);

        prop_assert_eq!(channel, format!("{}:{{{}}}", CHANNEL_PREFIX, name));
    }

    /// Keys with control characters are rejected.
    #[test]
    fn control_characters_rejected(prefix in "[a-z]{0,5}", c in prop::char::range('\u{0}', '\u{1f}')) {
        let name = format!("{}{}", prefix, c);
        prop_assert!(LockKey::new(name).is_err());
    }

    /// Owner tokens round-trip through serde.
    #[test]
    fn owner_token_serde_roundtrip(token in "[a-zA-Z0-9-]{1,64}") {
        let owner = OwnerToken::new(token).unwrap();
        let json = serde_json::to_string(&owner).unwrap();
        let parsed: OwnerToken = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(owner, parsed);
    }
}
