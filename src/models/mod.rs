pub mod profile;
pub mod requirement;
pub mod timestamp;
pub mod utterance;

pub use profile::*;
pub use requirement::*;
pub use timestamp::*;
pub use utterance::*;
