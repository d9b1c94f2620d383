pub mod instrument;
pub mod model;
pub mod normalize;
pub mod notation;
pub mod pitch;

pub use instrument::*;
pub use model::*;
pub use normalize::*;
pub use notation::*;
pub use pitch::*;
