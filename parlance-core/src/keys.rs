//! Credential store key scheme.
//!
//! Every secret lives under a namespaced string key so unrelated
//! applications sharing the platform keychain cannot collide. The scheme
//! is part of the external interface: other processes (the OAuth browser
//! flow, migration tooling) address the same slots.

/// Application namespace prefix.
pub const NAMESPACE: &str = "parlance";

/// Key for a provider's API key.
pub fn api_key(provider_id: &str) -> String {
    format!("{NAMESPACE}.provider.{provider_id}.apikey")
}

/// Key for a provider's OAuth access token.
pub fn oauth_access(provider_id: &str) -> String {
    format!("{NAMESPACE}.provider.{provider_id}.oauth.access")
}

/// Key for a provider's OAuth refresh token.
pub fn oauth_refresh(provider_id: &str) -> String {
    format!("{NAMESPACE}.provider.{provider_id}.oauth.refresh")
}

/// Key for a provider's OAuth token expiry (RFC 3339).
pub fn oauth_expiry(provider_id: &str) -> String {
    format!("{NAMESPACE}.provider.{provider_id}.oauth.expiry")
}

/// Key for a provider's rotation key list (JSON).
pub fn rotation(provider_id: &str) -> String {
    format!("{NAMESPACE}.provider.{provider_id}.keyring")
}

/// Every key slot a provider can occupy, for delete-all sweeps.
pub fn all_for(provider_id: &str) -> Vec<String> {
    vec![
        api_key(provider_id),
        oauth_access(provider_id),
        oauth_refresh(provider_id),
        oauth_expiry(provider_id),
        rotation(provider_id),
    ]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(api_key("work"), "parlance.provider.work.apikey");
        assert_eq!(oauth_access("work"), "parlance.provider.work.oauth.access");
        assert_eq!(rotation("work"), "parlance.provider.work.keyring");
    }

    #[test]
    fn test_all_for_covers_every_slot() {
        let keys = all_for("p");
        assert_eq!(keys.len(), 5);
        assert!(keys.iter().all(|k| k.starts_with("parlance.provider.p.")));
    }
}
