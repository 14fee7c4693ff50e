//! Price Feed Gateway (spec §4.1): the single place the rest of the engine
//! asks "what is this symbol worth right now".

pub mod gateway;

pub use gateway::PriceFeedGateway;
