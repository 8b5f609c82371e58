pub mod models;
pub mod board;
pub mod evaluator;
pub mod turn;
pub mod presentation;
pub mod scheduler;
pub mod simulator;
pub mod arena;
pub mod bot_strategy;
pub mod bot_profiles;
