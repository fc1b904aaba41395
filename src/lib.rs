#![forbid(unsafe_code)]

//! # metric-harness
//!
//! Tools an agent uses to turn monitoring data into an analysis report.
//!
//! `gather_data` lists a business's metrics and queries one of them, saving
//! every returned series as CSV plus a visualization config. `drawer` hands
//! that config to an external chart renderer, which writes per-series
//! insights and charts. `report` reads it all back, asks a language model for
//! a narrative and renders it into an HTML document.
//!
//! All monitoring platform calls go through one action-based gateway
//! ([`api::ApiGateway`]) that signs requests with a per-app credential cached
//! for the life of the process.

pub mod api;
pub mod artifact;
pub mod config;
pub mod llm;
pub mod tool;

pub use api::{ApiError, ApiGateway, CredentialCache, MonitorService};
pub use artifact::{ConfigEntry, VisualizationConfig};
pub use config::Settings;
pub use llm::{ChatCompletions, ChatGateway};
pub use tool::{Drawer, GatherData, ReportTool, Tool, ToolResult};
