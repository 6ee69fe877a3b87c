pub mod api;
pub mod config;
pub mod correlate;
pub mod db;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod extract;
pub mod orchestration;
pub mod render;

pub use config::Config;
pub use correlate::Correlator;
pub use db::{init_db, Repository};
pub use dispatch::{
    DispatchGateway, HttpPostClient, MockPostClient, PostClient, ReservoirLimiter, RetryScheduler,
};
pub use domain::{
    DispatchAttempt, DispatchOutcome, FieldMap, FieldValue, Mapping, SignalRecord, SignalStatus,
    Webhook,
};
pub use error::AppError;
pub use extract::{CompiledPattern, PatternCache};
pub use orchestration::Pipeline;
