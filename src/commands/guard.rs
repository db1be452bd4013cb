//! Outbound fetch guard and invocation rate limiting.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Instant;

use url::Url;

use super::CommandError;

/// Returns `true` for loopback, private, link-local and CGN addresses.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            // 127.0.0.0/8
            octets[0] == 127
            // 10.0.0.0/8
            || octets[0] == 10
            // 172.16.0.0/12
            || (octets[0] == 172 && (octets[1] & 0xF0) == 16)
            // 192.168.0.0/16
            || (octets[0] == 192 && octets[1] == 168)
            // 169.254.0.0/16
            || (octets[0] == 169 && octets[1] == 254)
            // 100.64.0.0/10
            || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
            || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()
            || v6.is_unspecified()
            // fc00::/7
            || (segments[0] & 0xFE00) == 0xFC00
            // fe80::/10
            || (segments[0] & 0xFFC0) == 0xFE80
            || v6
                .to_ipv4_mapped()
                .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Refuse URLs that are not http(s) or that resolve to a private address.
///
/// # Errors
///
/// Returns [`CommandError::Blocked`] naming the reason.
pub async fn check_public_url(url: &Url) -> Result<(), CommandError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CommandError::Blocked(format!(
            "unsupported scheme {}",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| CommandError::Blocked("URL has no host".to_owned()))?;
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| CommandError::Blocked(format!("DNS resolution failed: {e}")))?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(CommandError::Blocked(format!(
                "{host} resolves to private address {}",
                addr.ip()
            )));
        }
    }
    Ok(())
}

/// Sliding-window rate limiter.
///
/// Uses a sync [`Mutex`] since the critical section has no awaits.
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<VecDeque<Instant>>,
    max_count: u32,
    window_secs: u64,
}

impl RateLimiter {
    /// Allow `max_count` events per `window_secs`.
    pub fn new(window_secs: u64, max_count: u32) -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            max_count,
            window_secs,
        }
    }

    /// Check whether another event is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::RateLimited`] when the window is full.
    pub fn check(&self) -> Result<(), CommandError> {
        let mut window = self
            .window
            .lock()
            .map_err(|e| CommandError::RateLimited(format!("limiter lock poisoned: {e}")))?;

        let cutoff = Instant::now()
            .checked_sub(std::time::Duration::from_secs(self.window_secs))
            .unwrap_or_else(Instant::now);
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }

        let count = u32::try_from(window.len()).unwrap_or(u32::MAX);
        if count >= self.max_count {
            return Err(CommandError::RateLimited(format!(
                "{count} commands in the last {}s (limit {})",
                self.window_secs, self.max_count
            )));
        }
        Ok(())
    }

    /// Record an event.
    pub fn record(&self) {
        if let Ok(mut window) = self.window.lock() {
            window.push_back(Instant::now());
        }
    }
}
