pub mod chat;
pub mod config;
pub mod delivery;
pub mod game;
pub mod player;
pub mod role;
