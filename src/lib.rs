pub mod engine;
pub mod net;
pub mod terminal;
