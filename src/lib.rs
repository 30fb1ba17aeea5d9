pub mod config;
pub mod deployment;
pub mod dispatcher;
pub mod error;
pub mod github;
pub mod governor;
pub mod lead_time;
pub mod metrics;
pub mod querier;
pub mod rating;
pub mod report;
pub mod team;
pub mod window;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use querier::MetricsQuerier;
pub use report::Report;
