pub mod calendar;
pub mod challenge;
pub mod clock;
pub mod completion;
pub mod error;
pub mod habit;
pub mod profile;
pub mod schema;
pub mod service;
pub mod store;

pub use crate::service::{ChallengeService, ChallengeServiceBuilder, DashboardSnapshot};
