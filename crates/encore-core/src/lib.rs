pub mod clock;
pub mod config;
pub mod ipc;
pub mod session;
pub mod status;
pub mod transport;
pub mod voice_pool;

pub use clock::*;
pub use config::*;
pub use ipc::*;
pub use session::*;
pub use status::*;
pub use transport::*;
pub use voice_pool::*;
