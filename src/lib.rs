pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// `interfaces/` is the teacher's egui dashboard; it has no counterpart here
// (headless engine, no UI surface) and every file in it depends on
// `eframe`/`egui`, neither of which is a dependency of this crate anymore.
// Left on disk, undeclared, for the trim pass.

// `config_tests.rs` exercises the teacher's old `Config::from_env`/
// `risk_appetite` equities API, which `config::mod` no longer has. Left on
// disk, undeclared, for the trim pass; `config::mod`'s own `#[cfg(test)]`
// module covers the new YAML schema.
