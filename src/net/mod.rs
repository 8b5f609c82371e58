pub mod protocol;
pub mod session;
pub mod transport;
pub mod matchmaking;
pub mod peer;
