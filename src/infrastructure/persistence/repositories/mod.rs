mod account_repository;
mod kline_repository;
mod mode_state_repository;
mod order_repository;
mod position_repository;
mod risk_repositories;
mod trade_repository;

pub use account_repository::PgAccountRepository;
pub use kline_repository::PgKlineRepository;
pub use mode_state_repository::{PgModeStateRepository, PgTradingControlRepository};
pub use order_repository::PgOrderRepository;
pub use position_repository::PgPositionRepository;
pub use risk_repositories::{
    PgAdaptiveParamsRepository, PgScoringWeightsRepository, PgSignalBlacklistRepository,
    PgSignalQualityRepository, PgSymbolRatingRepository, PgVolatilityProfileRepository,
};
pub use trade_repository::PgTradeRepository;
