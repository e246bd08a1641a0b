//! Keel Core Library
//!
//! Shared functionality for the Keel personal finance coach:
//! - Encrypted database access and migrations
//! - CSV transaction import with dedup
//! - Recurring charge detection and manual bills
//! - 30-day cash-flow forecasting with uncertainty bands
//! - Recommendation ranking over a static action catalog
//! - Templated explanations tied to the evidence behind them

pub mod db;
pub mod detect;
pub mod error;
pub mod explain;
pub mod forecast;
pub mod import;
pub mod models;
pub mod recommend;

pub use db::{AuditRecord, Database, InsertOutcome};
pub use detect::{add_manual_bill, DetectionConfig, PatternDetector};
pub use error::{Error, Result};
pub use explain::TemplateInputs;
pub use forecast::{Forecast, ForecastEngine};
pub use import::{import_csv, ImportSummary};
pub use recommend::{RankedAction, RecommendationEngine};
