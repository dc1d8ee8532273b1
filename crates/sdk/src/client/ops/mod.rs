/// Operations for the participant screens.
pub mod participant;

pub use self::participant::ParticipantOps;
