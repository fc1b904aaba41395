//! Per-tenant credential cache.
//!
//! A credential is built locally from the app code and secret (no token
//! endpoint round-trip) and cached for the lifetime of the cache object.
//! Entries never expire or refresh.

use dashmap::DashMap;
use serde_json::json;

/// Header carrying the signed credential payload.
pub const AUTH_HEADER: &str = "x-bkapi-authorization";

/// Username attached to every credential unless configured otherwise.
pub const DEFAULT_USERNAME: &str = "bk_chat";

/// Opaque credential payload sent as the [`AUTH_HEADER`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    header_value: String,
}

impl Credential {
    /// Build the signed header payload. Pure function of its inputs.
    pub fn sign(app_code: &str, app_secret: &str, username: &str) -> Self {
        let payload = json!({
            "bk_app_code": app_code,
            "bk_app_secret": app_secret,
            "bk_username": username,
        });
        Self {
            header_value: payload.to_string(),
        }
    }

    pub fn header_name(&self) -> &'static str {
        AUTH_HEADER
    }

    pub fn header_value(&self) -> &str {
        &self.header_value
    }
}

/// Process-wide credential cache keyed by tenant (app code).
///
/// Concurrent first lookups for the same tenant may both compute the
/// credential; the last insert wins and both values are identical.
#[derive(Debug, Default)]
pub struct CredentialCache {
    entries: DashMap<String, Credential>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant: &str) -> Option<Credential> {
        self.entries.get(tenant).map(|c| c.value().clone())
    }

    /// Return the cached credential for `tenant`, computing it with `make`
    /// only when absent.
    pub fn get_or_insert_with<F>(&self, tenant: &str, make: F) -> Credential
    where
        F: FnOnce() -> Credential,
    {
        if let Some(existing) = self.get(tenant) {
            return existing;
        }
        let credential = make();
        self.entries.insert(tenant.to_string(), credential.clone());
        credential
    }

    /// Resolve the credential for an app, signing it on first use.
    pub fn resolve(&self, app_code: &str, app_secret: &str, username: &str) -> Credential {
        self.get_or_insert_with(app_code, || {
            Credential::sign(app_code, app_secret, username)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
