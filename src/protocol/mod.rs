pub mod events;
pub mod info;
pub mod requests;
pub mod tracks;

pub use events::*;
pub use info::*;
pub use requests::*;
pub use tracks::*;
