//! Click capture and aggregation
//!
//! Everything between a resolved redirect and a rendered dashboard lives
//! here: visitor fingerprinting, user-agent classification, best-effort
//! geolocation, the transactional click recorder, and the aggregation
//! engine that turns the event log into dashboard statistics.

pub mod country_names;
pub mod engine;
pub mod fingerprint;
pub mod geo;
pub mod models;
pub mod recorder;
pub mod user_agent;

pub use engine::AggregationEngine;
pub use geo::{CountryResolver, DisabledCountryResolver, HttpCountryResolver};
pub use models::{Granularity, Window};
pub use recorder::{ClickContext, ClickRecorder};
pub use user_agent::{DeviceCategory, UserAgentInfo};
