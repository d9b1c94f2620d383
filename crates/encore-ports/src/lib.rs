pub mod audio;
pub mod catalog;
pub mod instrument;
pub mod notes;
pub mod types;

pub use audio::*;
pub use catalog::*;
pub use instrument::*;
pub use notes::*;
pub use types::*;
