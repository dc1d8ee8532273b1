/// Participant record.
pub mod participant;

pub use participant::{sort_newest_first, Participant, VettingStatus};
