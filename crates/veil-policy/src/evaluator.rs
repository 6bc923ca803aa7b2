use std::sync::Arc;

use crate::registry::PassThroughRegistry;

/// Answers "should this connection bypass interception?" on the
/// connection-accept hot path. No I/O; the only cost is cloning the
/// current rule snapshot and scanning it in insertion order.
#[derive(Debug, Clone)]
pub struct PassThroughEvaluator {
    registry: Arc<PassThroughRegistry>,
}

impl PassThroughEvaluator {
    pub fn new(registry: Arc<PassThroughRegistry>) -> Self {
        Self { registry }
    }

    /// First-match-wins over enabled rules; the default is to intercept.
    ///
    /// Insertion order is the precedence order: an early broad rule
    /// shadows later narrower ones, so operators must order rules from
    /// most to least specific.
    pub fn should_pass_through(&self, host: &str, port: u16) -> bool {
        let rules = self.registry.snapshot();
        for rule in rules.iter() {
            if rule.enabled() && rule.pattern().matches(host, port) {
                tracing::debug!(
                    rule = rule.source(),
                    host,
                    port,
                    "pass-through rule matched, skipping interception"
                );
                return true;
            }
        }
        false
    }

    /// Same decision for a pre-joined `host[:port]` authority string.
    pub fn should_pass_through_authority(&self, authority: &str) -> bool {
        let (host, port) = split_authority(authority);
        match port {
            Some(port) => self.should_pass_through(host, port),
            None => {
                let rules = self.registry.snapshot();
                rules
                    .iter()
                    .any(|rule| rule.enabled() && rule.pattern().matches_parts(host, None))
            }
        }
    }
}

fn split_authority(authority: &str) -> (&str, Option<u16>) {
    let authority = authority.trim();
    if let Some(rest) = authority.strip_prefix('[') {
        if let Some(closing) = rest.find(']') {
            let host = &rest[..closing];
            let port = rest[closing + 1..]
                .strip_prefix(':')
                .and_then(|raw| raw.parse::<u16>().ok());
            return (host, port);
        }
        return (authority, None);
    }
    match authority.rsplit_once(':') {
        Some((host, raw)) if !host.contains(':') => match raw.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (authority, None),
        },
        _ => (authority, None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{split_authority, PassThroughEvaluator};
    use crate::registry::PassThroughRegistry;

    fn evaluator(registry: &Arc<PassThroughRegistry>) -> PassThroughEvaluator {
        PassThroughEvaluator::new(Arc::clone(registry))
    }

    #[test]
    fn no_rules_means_intercept() {
        let registry = Arc::new(PassThroughRegistry::new());
        assert!(!evaluator(&registry).should_pass_through("api.example.com", 443));
    }

    #[test]
    fn enabled_matching_rule_passes_through() {
        let registry = Arc::new(PassThroughRegistry::new());
        registry.add("*.internal.example.com", true).expect("add");
        let evaluator = evaluator(&registry);

        assert!(evaluator.should_pass_through("app.internal.example.com", 8443));
        assert!(evaluator.should_pass_through_authority("app.internal.example.com:8443"));
        assert!(!evaluator.should_pass_through("external.com", 443));
    }

    #[test]
    fn disabled_rule_does_not_match() {
        let registry = Arc::new(PassThroughRegistry::new());
        registry.add("api.example.com", true).expect("add");
        let evaluator = evaluator(&registry);
        assert!(evaluator.should_pass_through("api.example.com", 443));

        assert!(registry.set_enabled("api.example.com", false));
        assert!(!evaluator.should_pass_through("api.example.com", 443));
    }

    #[test]
    fn first_match_wins_and_survives_removal_of_the_broad_rule() {
        let registry = Arc::new(PassThroughRegistry::new());
        registry.add("*.example.com", true).expect("add broad");
        registry.add("app.example.com:443", true).expect("add narrow");
        let evaluator = evaluator(&registry);

        assert!(evaluator.should_pass_through("app.example.com", 443));

        assert!(registry.remove("*.example.com"));
        assert!(evaluator.should_pass_through("app.example.com", 443));
        assert!(!evaluator.should_pass_through("app.example.com", 8443));
    }

    #[test]
    fn portless_authority_only_matches_portless_rules() {
        let registry = Arc::new(PassThroughRegistry::new());
        registry.add("pinned.example.com:443", true).expect("add");
        registry.add("open.example.com", true).expect("add");
        let evaluator = evaluator(&registry);

        assert!(!evaluator.should_pass_through_authority("pinned.example.com"));
        assert!(evaluator.should_pass_through_authority("open.example.com"));
    }

    #[test]
    fn split_authority_handles_bracketed_ipv6() {
        assert_eq!(split_authority("[2001:db8::1]:443"), ("2001:db8::1", Some(443)));
        assert_eq!(split_authority("[::1]"), ("::1", None));
        assert_eq!(split_authority("host:443"), ("host", Some(443)));
        assert_eq!(split_authority("host"), ("host", None));
    }
}
