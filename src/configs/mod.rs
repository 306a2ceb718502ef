pub mod base;
pub mod loader;
pub mod logging;
pub mod player;
pub mod reaper;
pub mod server;

pub use base::*;
pub use loader::*;
pub use logging::*;
pub use player::*;
pub use reaper::*;
pub use server::*;
