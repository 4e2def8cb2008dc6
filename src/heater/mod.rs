mod service;

pub use service::{ApplyOutcome, HeaterService, ServiceError};
