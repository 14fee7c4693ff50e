//! Risk domain: the adaptive tables the brain and optimizer read/write
//! (symbol rating, blacklist, quality stats, scoring weights, adaptive
//! parameters, volatility profile, trading control) plus the emergency
//! intervention state (spec §3, §4.9).

pub mod blacklist;
pub mod emergency;
pub mod params;
pub mod quality;
pub mod rating;
pub mod trading_control;
pub mod volatility_profile;
pub mod weights;

pub use blacklist::SignalBlacklistEntry;
pub use emergency::{EmergencyBlocks, EmergencyLayerState};
pub use params::AdaptiveParams;
pub use quality::SignalQualityStats;
pub use rating::{RatingLevel, SymbolRating};
pub use trading_control::TradingControl;
pub use volatility_profile::VolatilityProfile;
pub use weights::{ScoringWeight, ScoringWeights};
