//! Product-scoped facades sharing one credential cache.

use std::sync::Arc;

use super::action::Product;
use super::client::ApiGateway;
use super::cmdb::Cmdb;
use super::credential::CredentialCache;
use super::error::ApiError;
use super::monitor::Monitor;
use crate::config::ApiSettings;

/// Both facades, each rooted at its own product endpoint.
#[derive(Debug, Clone)]
pub struct MonitorService {
    pub monitor: Monitor,
    pub cmdb: Cmdb,
}

impl MonitorService {
    pub fn new(settings: &ApiSettings, credentials: Arc<CredentialCache>) -> Result<Self, ApiError> {
        let gateway = |product: Product| {
            ApiGateway::with_config(
                settings.root_for(product),
                &settings.app_code,
                &settings.app_secret,
                &settings.username,
                settings.timeout,
                credentials.clone(),
            )
        };

        Ok(Self {
            monitor: Monitor::new(gateway(Product::Monitor)?),
            cmdb: Cmdb::new(gateway(Product::Cmdb)?),
        })
    }
}
