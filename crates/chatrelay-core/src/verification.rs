//! One-time email verification codes.
//!
//! A [`CodeStore`] is a single-writer-per-key TTL map `email → (code,
//! expires_at)`. Issuing overwrites any outstanding code for the email,
//! expired entries are evicted when read, and a code can be consumed at most
//! once. [`InMemoryCodeStore`] keeps the map in process; a shared store
//! (Redis and friends) can implement the same trait for multi-instance
//! deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// How long an issued code stays valid.
pub fn code_ttl() -> Duration {
    Duration::minutes(10)
}

/// A uniformly random 6-digit code (`100000..=999999`).
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[async_trait]
pub trait CodeStore: Send + Sync + 'static {
    /// Store `code` for `email`, replacing any previous one.
    async fn issue(&self, email: &str, code: &str, expires_at: DateTime<Utc>);

    /// `true` iff an unexpired code equal to `code` is outstanding. Does not
    /// consume it; an expired entry is evicted.
    async fn check(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool;

    /// Check and remove in one step; `true` at most once per issued code.
    async fn consume(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool;
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Process-local [`CodeStore`].
#[derive(Debug, Default)]
pub struct InMemoryCodeStore {
    codes: Mutex<HashMap<String, PendingCode>>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry; returns how many were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut map) = self.codes.lock() else {
            return 0;
        };
        let before = map.len();
        map.retain(|_, pending| now < pending.expires_at);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.codes.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared check logic; optionally removes the entry on a match.
    fn check_inner(&self, email: &str, code: &str, now: DateTime<Utc>, remove_on_match: bool) -> bool {
        let Ok(mut map) = self.codes.lock() else {
            return false;
        };
        let Some(pending) = map.get(email) else {
            return false;
        };
        if now >= pending.expires_at {
            map.remove(email);
            return false;
        }
        if pending.code != code {
            return false;
        }
        if remove_on_match {
            map.remove(email);
        }
        true
    }
}

#[async_trait]
impl CodeStore for InMemoryCodeStore {
    async fn issue(&self, email: &str, code: &str, expires_at: DateTime<Utc>) {
        if let Ok(mut map) = self.codes.lock() {
            map.insert(
                email.to_owned(),
                PendingCode { code: code.to_owned(), expires_at },
            );
        }
    }

    async fn check(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool {
        self.check_inner(email, code, now, false)
    }

    async fn consume(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool {
        self.check_inner(email, code, now, true)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    const EMAIL: &str = "someone@qq.com";

    #[test]
    fn generated_codes_have_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[tokio::test]
    async fn code_is_valid_until_expiry() {
        let store = InMemoryCodeStore::new();
        let t = Utc::now();
        store.issue(EMAIL, "123456", t + code_ttl()).await;

        assert!(store.check(EMAIL, "123456", t).await);
        assert!(store.check(EMAIL, "123456", t + code_ttl() - Duration::seconds(1)).await);
        assert!(!store.check(EMAIL, "123456", t + code_ttl()).await);
        // The expired entry was evicted on read.
        assert!(store.is_empty());
        assert!(!store.check(EMAIL, "123456", t).await);
    }

    #[tokio::test]
    async fn code_must_match_exactly() {
        let store = InMemoryCodeStore::new();
        let t = Utc::now();
        store.issue(EMAIL, "123456", t + code_ttl()).await;

        assert!(!store.check(EMAIL, "123457", t).await);
        assert!(!store.check(EMAIL, " 123456", t).await);
        assert!(!store.check("other@qq.com", "123456", t).await);
        // A mismatch does not burn the code.
        assert!(store.consume(EMAIL, "123456", t).await);
    }

    #[tokio::test]
    async fn consumed_code_is_gone_for_good() {
        let store = InMemoryCodeStore::new();
        let t = Utc::now();
        store.issue(EMAIL, "654321", t + code_ttl()).await;

        assert!(store.consume(EMAIL, "654321", t).await);
        assert!(!store.consume(EMAIL, "654321", t).await);
        assert!(!store.check(EMAIL, "654321", t).await);
    }

    #[tokio::test]
    async fn reissue_overwrites_previous_code() {
        let store = InMemoryCodeStore::new();
        let t = Utc::now();
        store.issue(EMAIL, "111111", t + code_ttl()).await;
        store.issue(EMAIL, "222222", t + code_ttl()).await;

        assert!(!store.check(EMAIL, "111111", t).await);
        assert!(store.check(EMAIL, "222222", t).await);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_codes() {
        let store = InMemoryCodeStore::new();
        let t = Utc::now();
        store.issue("a@qq.com", "111111", t + code_ttl()).await;
        store.issue("b@qq.com", "222222", t - Duration::seconds(1)).await;

        assert_eq!(store.purge_expired(t), 1);
        assert_eq!(store.len(), 1);
        assert!(store.consume("a@qq.com", "111111", t).await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn consuming_a_stale_code_keeps_the_reissued_one() {
        let store = InMemoryCodeStore::new();
        let t = Utc::now();
        store.issue(EMAIL, "111111", t + code_ttl()).await;
        assert!(store.check(EMAIL, "111111", t).await);
        store.issue(EMAIL, "222222", t + code_ttl()).await;

        assert!(!store.consume(EMAIL, "111111", t).await);
        assert!(store.check(EMAIL, "222222", t).await);
    }
}
