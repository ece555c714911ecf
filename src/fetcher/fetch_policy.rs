use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::FetchError;
use crate::fetcher::transport::FetchResponse;
use crate::models::FetchOutcome;
use crate::processor::source_adapter::{PageShape, SourceAdapter};

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Statuses that mean the host refuses to serve us, as opposed to a hiccup.
const DENIAL_STATUSES: [u16; 4] = [401, 403, 407, 451];

/// Pacing, retry and block-detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicyConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_base_ms: u64,
    pub max_attempts: u32,
    pub request_timeout_secs: u64,
    pub user_agents: Vec<String>,
    pub block_markers: Vec<String>,
}

impl Default for FetchPolicyConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            backoff_base_ms: 1000,
            max_attempts: 3,
            request_timeout_secs: 15,
            user_agents: vec![
                FALLBACK_USER_AGENT.to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0".to_string(),
            ],
            block_markers: vec![
                "captcha".to_string(),
                "access denied".to_string(),
                "unusual traffic".to_string(),
                "are you a robot".to_string(),
                "verify you are human".to_string(),
            ],
        }
    }
}

/// Per-host request policy. One instance per source so pacing and
/// user-agent rotation never leak across hosts.
pub struct FetchPolicy {
    config: FetchPolicyConfig,
    rng: Mutex<StdRng>,
    ua_cursor: AtomicUsize,
}

impl FetchPolicy {
    pub fn new(config: FetchPolicyConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic jitter and rotation start, for tests and reproducible runs.
    pub fn with_seed(config: FetchPolicyConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: FetchPolicyConfig, mut rng: StdRng) -> Self {
        let start = if config.user_agents.is_empty() {
            0
        } else {
            rng.gen_range(0..config.user_agents.len())
        };

        Self {
            config,
            rng: Mutex::new(rng),
            ua_cursor: AtomicUsize::new(start),
        }
    }

    pub fn config(&self) -> &FetchPolicyConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Delay before `attempt` (1-based): jittered base delay plus
    /// exponential backoff from the second attempt on.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let min = self.config.min_delay_ms;
        let max = self.config.max_delay_ms.max(min);

        let jitter = if max > min {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(min..=max)
        } else {
            min
        };

        let backoff = if attempt >= 2 {
            let exponent = (attempt - 2).min(16);
            self.config.backoff_base_ms.saturating_mul(1u64 << exponent)
        } else {
            0
        };

        Duration::from_millis(jitter.saturating_add(backoff))
    }

    /// Round-robin through the pool; advances on every call.
    pub fn next_user_agent(&self) -> String {
        if self.config.user_agents.is_empty() {
            return FALLBACK_USER_AGENT.to_string();
        }
        let index = self.ua_cursor.fetch_add(1, Ordering::Relaxed) % self.config.user_agents.len();
        self.config.user_agents[index].clone()
    }

    pub fn should_retry(&self, outcome: FetchOutcome, attempt: u32) -> bool {
        attempt < self.max_attempts() && is_retryable(outcome)
    }

    /// Whether the body carries one of the configured bot-check markers.
    pub fn has_block_marker(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.config
            .block_markers
            .iter()
            .any(|marker| body.contains(&marker.to_lowercase()))
    }

    pub fn classify(
        &self,
        result: &Result<FetchResponse, FetchError>,
        adapter: &SourceAdapter,
    ) -> FetchOutcome {
        self.inspect(result, adapter).0
    }

    /// Classifies a transport result. The status code is judged before the
    /// body: denial codes are blocks, any other non-2xx is a status failure.
    /// A 2xx body is blocked when it shows a bot-check marker or none of the
    /// adapter's page markers. The page is parsed at most once and its shape
    /// is returned on success.
    pub fn inspect(
        &self,
        result: &Result<FetchResponse, FetchError>,
        adapter: &SourceAdapter,
    ) -> (FetchOutcome, Option<PageShape>) {
        let response = match result {
            Ok(response) => response,
            Err(FetchError::Timeout) => return (FetchOutcome::Timeout, None),
            Err(FetchError::ConnectionRefused(_)) => return (FetchOutcome::Connection, None),
            Err(FetchError::HttpStatus(status)) => return (status_outcome(*status), None),
        };

        if !(200..300).contains(&response.status) {
            return (status_outcome(response.status), None);
        }
        if self.has_block_marker(&response.body) {
            return (FetchOutcome::Blocked, None);
        }

        let shape = adapter.page_shape(&response.body);
        if shape.has_marker {
            (FetchOutcome::Success, Some(shape))
        } else {
            (FetchOutcome::Blocked, None)
        }
    }
}

fn status_outcome(status: u16) -> FetchOutcome {
    if DENIAL_STATUSES.contains(&status) {
        FetchOutcome::Blocked
    } else {
        FetchOutcome::Status(status)
    }
}

fn is_retryable(outcome: FetchOutcome) -> bool {
    match outcome {
        FetchOutcome::Timeout | FetchOutcome::Connection => true,
        FetchOutcome::Status(status) => status == 429 || (500..600).contains(&status),
        FetchOutcome::Success | FetchOutcome::Blocked => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;
    use rstest::rstest;

    fn policy() -> FetchPolicy {
        FetchPolicy::with_seed(FetchPolicyConfig::default(), 7)
    }

    fn response(status: u16, body: &str) -> FetchResponse {
        FetchResponse {
            url: "https://www.dhgate.com/wholesale/safety+equipment.html".to_string(),
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_base_delay_within_bounds() {
        let policy = policy();
        for _ in 0..50 {
            let delay = policy.next_delay(1);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_backoff_grows_with_attempts() {
        let config = FetchPolicyConfig {
            min_delay_ms: 100,
            max_delay_ms: 100,
            ..FetchPolicyConfig::default()
        };
        let policy = FetchPolicy::with_seed(config, 1);

        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
        assert_eq!(policy.next_delay(2), Duration::from_millis(1100));
        assert_eq!(policy.next_delay(3), Duration::from_millis(2100));
        assert_eq!(policy.next_delay(4), Duration::from_millis(4100));
    }

    #[test]
    fn test_user_agent_rotates_every_call() {
        let policy = policy();
        let pool = policy.config().user_agents.len();

        let seen: Vec<String> = (0..pool).map(|_| policy.next_user_agent()).collect();
        for window in seen.windows(2) {
            assert_ne!(window[0], window[1]);
        }
        assert_eq!(policy.next_user_agent(), seen[0]);
    }

    #[rstest]
    #[case(FetchOutcome::Timeout, 1, true)]
    #[case(FetchOutcome::Connection, 2, true)]
    #[case(FetchOutcome::Status(429), 1, true)]
    #[case(FetchOutcome::Status(503), 1, true)]
    #[case(FetchOutcome::Status(503), 3, false)]
    #[case(FetchOutcome::Status(404), 1, false)]
    #[case(FetchOutcome::Blocked, 1, false)]
    #[case(FetchOutcome::Success, 1, false)]
    fn test_should_retry(#[case] outcome: FetchOutcome, #[case] attempt: u32, #[case] expected: bool) {
        assert_eq!(policy().should_retry(outcome, attempt), expected);
    }

    #[test]
    fn test_classify_outcomes() {
        let policy = policy();
        let adapter = SourceAdapter::builtin(SourceId::DhGate).unwrap();

        let good = response(200, r#"<html><body><div id="proList"><div class="gitem">x</div></div></body></html>"#);
        let captcha = response(200, r#"<html><body><div id="proList"></div>Please complete the CAPTCHA</body></html>"#);
        let unexpected = response(200, "<html><body><p>Welcome</p></body></html>");

        let unavailable = response(503, r#"<html><body><div id="proList"><div class="gitem">x</div></div></body></html>"#);
        let denied = response(403, r#"<html><body><div id="proList"></div></body></html>"#);

        let (outcome, shape) = policy.inspect(&Ok(good), &adapter);
        assert_eq!(outcome, FetchOutcome::Success);
        assert_eq!(shape.unwrap().listings.len(), 1);
        assert_eq!(policy.classify(&Ok(unavailable), &adapter), FetchOutcome::Status(503));
        assert_eq!(policy.classify(&Ok(denied), &adapter), FetchOutcome::Blocked);
        assert_eq!(policy.classify(&Ok(captcha), &adapter), FetchOutcome::Blocked);
        assert_eq!(policy.classify(&Ok(unexpected), &adapter), FetchOutcome::Blocked);
        assert_eq!(
            policy.classify(&Err(FetchError::HttpStatus(403)), &adapter),
            FetchOutcome::Blocked
        );
        assert_eq!(
            policy.classify(&Err(FetchError::HttpStatus(502)), &adapter),
            FetchOutcome::Status(502)
        );
        assert_eq!(
            policy.classify(&Err(FetchError::Timeout), &adapter),
            FetchOutcome::Timeout
        );
        assert_eq!(
            policy.classify(&Err(FetchError::ConnectionRefused("reset".to_string())), &adapter),
            FetchOutcome::Connection
        );
    }
}
