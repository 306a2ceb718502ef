pub mod guilds;
pub mod info;
