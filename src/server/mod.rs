pub mod app_state;
pub mod dispatch;
pub mod play;
pub mod reaper;
pub mod registry;

pub use app_state::{AppState, Components};
pub use dispatch::{BroadcastSink, NotificationDispatcher, NotificationSink, Notifier};
pub use play::PlayHandler;
pub use reaper::{ActivityReaper, Observation, Strikes};
pub use registry::SessionRegistry;
