pub mod channel_router;
pub mod delivery;
pub mod game_service;
pub mod registry;
pub mod resolution;
pub mod role_service;
