pub mod input;
pub mod lock;
pub mod manifest;
pub mod output;
pub mod profile;
pub mod snapshot;

pub use input::*;
pub use lock::*;
pub use manifest::*;
pub use output::*;
pub use profile::*;
pub use snapshot::*;
