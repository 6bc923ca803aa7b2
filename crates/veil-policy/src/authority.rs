use crate::errors::PolicyError;

/// Compiled matcher for a `host` or `host:port` authority specification.
///
/// The host part may contain `*` wildcards, each matching any run of host
/// characters. Matching is case-insensitive. A pattern without an explicit
/// port matches any port on a matching host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityPattern {
    host_pattern: String,
    port: Option<u16>,
    ipv6_literal: bool,
}

impl AuthorityPattern {
    pub fn compile(spec: &str) -> Result<AuthorityPattern, PolicyError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::InvalidPattern(
                "authority pattern must not be empty".to_string(),
            ));
        }

        let (host, port, ipv6_literal) = split_spec(trimmed)?;
        let host = host.to_ascii_lowercase();
        if ipv6_literal {
            validate_ipv6_host(&host, trimmed)?;
        } else {
            validate_host_pattern(&host, trimmed)?;
        }

        Ok(AuthorityPattern {
            host_pattern: host,
            port,
            ipv6_literal,
        })
    }

    /// Canonical source text used as the rule identity in the registry.
    pub fn normalized(&self) -> String {
        let host = if self.ipv6_literal {
            format!("[{}]", self.host_pattern)
        } else {
            self.host_pattern.clone()
        };
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    pub fn matches(&self, host: &str, port: u16) -> bool {
        if let Some(expected) = self.port {
            if expected != port {
                return false;
            }
        }
        self.matches_host(host)
    }

    /// Matches an authority that may lack an explicit port. Without a port
    /// to compare, a pattern that pins one cannot match.
    pub fn matches_parts(&self, host: &str, port: Option<u16>) -> bool {
        match (self.port, port) {
            (Some(expected), Some(actual)) if expected != actual => false,
            (Some(_), None) => false,
            _ => self.matches_host(host),
        }
    }

    fn matches_host(&self, host: &str) -> bool {
        let host = host
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        wildcard_host_matches(&self.host_pattern, &host)
    }
}

/// Splits `host`, `host:port`, `[v6]`, or `[v6]:port`. Returns the host
/// without brackets, the optional port, and whether the host was a
/// bracketed IPv6 literal.
fn split_spec(spec: &str) -> Result<(&str, Option<u16>, bool), PolicyError> {
    if let Some(rest) = spec.strip_prefix('[') {
        let Some(closing) = rest.find(']') else {
            return Err(PolicyError::InvalidPattern(format!(
                "unclosed '[' in authority pattern '{spec}'"
            )));
        };
        let host = &rest[..closing];
        if host.is_empty() {
            return Err(PolicyError::InvalidPattern(format!(
                "empty IPv6 literal in authority pattern '{spec}'"
            )));
        }
        let suffix = &rest[closing + 1..];
        if suffix.is_empty() {
            return Ok((host, None, true));
        }
        let Some(port_raw) = suffix.strip_prefix(':') else {
            return Err(PolicyError::InvalidPattern(format!(
                "unexpected text after ']' in authority pattern '{spec}'"
            )));
        };
        return Ok((host, Some(parse_port(port_raw, spec)?), true));
    }

    let Some((host, port_raw)) = spec.rsplit_once(':') else {
        return Ok((spec, None, false));
    };
    if host.contains(':') {
        return Err(PolicyError::InvalidPattern(format!(
            "IPv6 authorities must use bracket form [::1]:443, got '{spec}'"
        )));
    }
    if host.is_empty() {
        return Err(PolicyError::InvalidPattern(format!(
            "authority host must not be empty: '{spec}'"
        )));
    }
    Ok((host, Some(parse_port(port_raw, spec)?), false))
}

fn parse_port(raw: &str, spec: &str) -> Result<u16, PolicyError> {
    let port = raw.parse::<u16>().map_err(|error| {
        PolicyError::InvalidPattern(format!("invalid port in authority pattern '{spec}': {error}"))
    })?;
    if port == 0 {
        return Err(PolicyError::InvalidPattern(format!(
            "authority port must be greater than zero: '{spec}'"
        )));
    }
    Ok(port)
}

fn validate_host_pattern(host: &str, spec: &str) -> Result<(), PolicyError> {
    if host.is_empty() {
        return Err(PolicyError::InvalidPattern(format!(
            "authority host must not be empty: '{spec}'"
        )));
    }
    for ch in host.chars() {
        if !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '_' | '*')) {
            return Err(PolicyError::InvalidPattern(format!(
                "illegal character '{ch}' in authority pattern '{spec}'"
            )));
        }
    }
    Ok(())
}

fn validate_ipv6_host(host: &str, spec: &str) -> Result<(), PolicyError> {
    if host.contains('*') {
        return Err(PolicyError::InvalidPattern(format!(
            "wildcards are not supported in IPv6 authority patterns: '{spec}'"
        )));
    }
    for ch in host.chars() {
        if !(ch.is_ascii_hexdigit() || matches!(ch, ':' | '.')) {
            return Err(PolicyError::InvalidPattern(format!(
                "illegal character '{ch}' in IPv6 authority pattern '{spec}'"
            )));
        }
    }
    Ok(())
}

/// Glob match with `*` as the only metacharacter. Iterative with single
/// star backtracking, so pathological patterns stay linear-ish.
fn wildcard_host_matches(pattern: &str, host: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == host;
    }

    let pattern = pattern.as_bytes();
    let host = host.as_bytes();
    let mut p = 0usize;
    let mut h = 0usize;
    let mut last_star: Option<usize> = None;
    let mut resume_h = 0usize;

    while h < host.len() {
        if p < pattern.len() && pattern[p] == host[h] {
            p += 1;
            h += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            last_star = Some(p);
            resume_h = h;
            p += 1;
        } else if let Some(star) = last_star {
            p = star + 1;
            resume_h += 1;
            h = resume_h;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&byte| byte == b'*')
}
