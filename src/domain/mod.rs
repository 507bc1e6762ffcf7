pub mod error;
pub mod events;
pub mod game;
pub mod models;
pub mod position;
pub mod rating;
pub mod rules;
pub mod services;
