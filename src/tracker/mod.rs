mod cache;
mod dispatcher;
mod error;
mod evaluator;
mod geo;
mod stats;
mod sweeper;
mod throttle;
pub(crate) mod types;

pub use cache::DeviceCache;
pub use dispatcher::IngestDispatcher;
pub use evaluator::LandingEvaluator;
pub use geo::Position;
pub use stats::{StatsSnapshot, TrackerStats};
pub use sweeper::EvictionSweeper;
pub use types::{CheckReport, EvaluationOutcome, RawTelemetry, TrackedDevice, TrackerPolicy};
