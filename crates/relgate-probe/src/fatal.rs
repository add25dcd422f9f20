//! Fatal error patterns.
//!
//! A fixed set of error-message shapes that indicate a non-recoverable
//! dependency failure. Once one is seen there is no point continuing
//! to probe a known-broken target.

use regex::RegexSet;

/// Matcher over the fixed fatal-pattern set.
#[derive(Debug)]
pub struct FatalPatterns {
    set: RegexSet,
}

impl Default for FatalPatterns {
    fn default() -> Self {
        // Name resolution, unreachable/refused endpoints, missing
        // capability routes, open circuit breakers, broken TLS.
        let set = RegexSet::new([
            r"(?i)enotfound|getaddrinfo|no such host|name resolution fail",
            r"(?i)econnrefused|connection refused",
            r"(?i)http 404|no such (capability|endpoint)|capability not found",
            r"(?i)circuit[_\s-]?open|circuit breaker (is )?open",
            r"(?i)tls handshake",
        ])
        .expect("fatal patterns are statically valid");
        Self { set }
    }
}

impl FatalPatterns {
    /// Whether an error message matches any fatal pattern.
    pub fn is_fatal(&self, message: &str) -> bool {
        self.set.is_match(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_fatal_shapes() {
        let patterns = FatalPatterns::default();
        assert!(patterns.is_fatal("circuit_open"));
        assert!(patterns.is_fatal("upstream circuit breaker open"));
        assert!(patterns.is_fatal("getaddrinfo ENOTFOUND svc.internal"));
        assert!(patterns.is_fatal("connect ECONNREFUSED 10.0.0.1:8080"));
        assert!(patterns.is_fatal("HTTP 404"));
        assert!(patterns.is_fatal("no such capability: probe"));
        assert!(patterns.is_fatal("TLS handshake eof"));
    }

    #[test]
    fn recoverable_errors_do_not_match() {
        let patterns = FatalPatterns::default();
        assert!(!patterns.is_fatal("HTTP 503"));
        assert!(!patterns.is_fatal("timeout after 2000ms"));
        assert!(!patterns.is_fatal("connection reset by peer"));
    }
}
