//! Rate limiter for login attempts
//!
//! Protects the login endpoint against brute force:
//! - 5 failed attempts per account per 15 minutes
//! - 10 requests per IP address per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const ACCOUNT_WINDOW_MINUTES: i64 = 15;
const ACCOUNT_MAX_FAILURES: usize = 5;
const IP_WINDOW_MINUTES: i64 = 1;
const IP_MAX_REQUESTS: usize = 10;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by account identifier
    account_failures: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    /// Request timestamps by IP address
    ip_requests: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    /// Create a new rate limiter
    pub fn new() -> Self {
        Self {
            account_failures: RwLock::new(HashMap::new()),
            ip_requests: RwLock::new(HashMap::new()),
        }
    }

    /// Check if an account is locked out by failed attempts
    pub async fn is_account_limited(&self, account: &str) -> bool {
        let mut failures = self.account_failures.write().await;
        let cutoff = Utc::now() - Duration::minutes(ACCOUNT_WINDOW_MINUTES);

        let entries = failures.entry(account.to_lowercase()).or_default();
        entries.retain(|time| *time > cutoff);

        entries.len() >= ACCOUNT_MAX_FAILURES
    }

    /// Record a failed login attempt for an account
    pub async fn record_failure(&self, account: &str) {
        let mut failures = self.account_failures.write().await;
        failures
            .entry(account.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Clear failed attempts for an account (on successful login)
    pub async fn clear_failures(&self, account: &str) {
        let mut failures = self.account_failures.write().await;
        failures.remove(&account.to_lowercase());
    }

    /// Check if an IP has exceeded its request allowance
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut requests = self.ip_requests.write().await;
        let cutoff = Utc::now() - Duration::minutes(IP_WINDOW_MINUTES);

        let entries = requests.entry(ip).or_default();
        entries.retain(|time| *time > cutoff);

        entries.len() >= IP_MAX_REQUESTS
    }

    /// Record a login request from an IP
    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut requests = self.ip_requests.write().await;
        requests.entry(ip).or_default().push(Utc::now());
    }

    /// Drop stale entries; called periodically from a background task
    pub async fn sweep(&self) {
        let account_cutoff = Utc::now() - Duration::minutes(ACCOUNT_WINDOW_MINUTES);
        let ip_cutoff = Utc::now() - Duration::minutes(IP_WINDOW_MINUTES);

        {
            let mut failures = self.account_failures.write().await;
            failures.retain(|_, times| {
                times.retain(|time| *time > account_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut requests = self.ip_requests.write().await;
            requests.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_account_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_account_limited("vermeer").await);
            limiter.record_failure("vermeer").await;
        }
        limiter.record_failure("vermeer").await;

        assert!(limiter.is_account_limited("vermeer").await);

        limiter.clear_failures("vermeer").await;
        assert!(!limiter.is_account_limited("vermeer").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;

        assert!(limiter.is_ip_limited(ip).await);
    }

    #[tokio::test]
    async fn test_account_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..5 {
            limiter.record_failure("Vermeer").await;
        }
        assert!(limiter.is_account_limited("VERMEER").await);
    }

    #[tokio::test]
    async fn test_sweep_drops_empty_entries() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failure("vermeer").await;
        limiter.sweep().await;
        // Entry remains live inside the window
        assert!(!limiter.is_account_limited("vermeer").await);
    }
}
