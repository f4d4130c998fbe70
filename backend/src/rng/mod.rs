//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the generator and the step engine MUST go
//! through this module, always via an explicitly passed `RngManager`.

mod xorshift;

pub use xorshift::RngManager;
