//! HTTP client construction

use crate::config::HttpClientConfig;
use crate::error::EngineResult;
use reqwest::redirect::Policy;

/// Per-request transport policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientPolicy {
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub cookie_reuse: bool,
}

impl ClientPolicy {
    /// Request flags layered over the configured defaults
    pub fn resolve(defaults: &HttpClientConfig, redirects: bool, max_redirects: usize, cookie_reuse: bool) -> Self {
        let max_redirects = if max_redirects == 0 {
            defaults.effective_max_redirects()
        } else {
            max_redirects
        };
        Self {
            follow_redirects: redirects || defaults.follow_redirects,
            max_redirects,
            cookie_reuse: cookie_reuse || defaults.cookie_reuse,
        }
    }
}

/// Build the client a compiled request keeps for its lifetime
pub fn build_client(defaults: &HttpClientConfig, policy: ClientPolicy) -> EngineResult<reqwest::Client> {
    let redirect = if policy.follow_redirects {
        Policy::limited(policy.max_redirects)
    } else {
        Policy::none()
    };

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(defaults.accept_invalid_certs)
        .timeout(defaults.timeout())
        .redirect(redirect)
        .cookie_store(policy.cookie_reuse)
        .build()?;
    Ok(client)
}
