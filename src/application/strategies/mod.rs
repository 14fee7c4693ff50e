//! Strategy modules (spec §2 "Strategy Modules" row). The trend-following
//! generator is `application::brain::decision_brain`, which fuses candidate
//! generation and the filter chain into one unit; this module holds the
//! distinct mean-reversion/range generator (row (b)).
//!
//! The rest of this subtree, as copied, depends on a `traits` submodule that
//! was never present in the source it was copied from and does not compile.
//! None of it has a counterpart in the specification (equities-style
//! SMA/VWAP/SMC/ML/order-flow strategies), so it is left undeclared here and
//! removed in the final trim pass rather than repaired. See DESIGN.md.
pub mod mean_reversion;
