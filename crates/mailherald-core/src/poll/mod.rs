//! Per-account poll status tracking.

mod model;
mod repository;

pub use model::PollStatus;
pub use repository::PollStatusRepository;
