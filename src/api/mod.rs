//! Monitoring platform API: generic gateway plus typed facades.

pub mod action;
pub mod client;
pub mod cmdb;
pub mod credential;
pub mod error;
pub mod monitor;
pub mod service;

pub use action::{Action, CallParams, HttpMethod, Product};
pub use client::ApiGateway;
pub use cmdb::{BusinessRecord, BusinessSearch, Cmdb};
pub use credential::{Credential, CredentialCache};
pub use error::ApiError;
pub use monitor::Monitor;
pub use service::MonitorService;
