pub mod common;
pub mod configs;
pub mod playback;
pub mod player;
pub mod protocol;
pub mod server;
pub mod sources;
pub mod transport;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;
