pub mod broadcast;
pub mod connections;
pub mod game_service;
pub mod registry;
