//! Randomized source generator for calling-convention testing.
//!
//! Given a seed, emit a complete self-checking Go program made of caller/
//! checker function pairs with randomly shaped signatures. The caller of
//! each pair constructs parameter values from a deterministic value stream
//! and checks the returned values; the checker verifies every parameter
//! leaf and constructs the returns from the same stream. Running the
//! program either prints `finished N tests` or reports exactly where a
//! value was mangled in transit. When the two halves are built by
//! different compilers or optimization levels, a mangled value points
//! straight at an ABI bug.
//!
//! The crate exposes one entry point, [`generate`], driven by a [`Config`]
//! carrying the seed, sizes, masks, and the probability [`Tunables`].

pub mod driver;
pub mod error;
pub mod fivemat;
pub mod generator;
pub mod parm;
pub mod rng;
pub mod tunables;

pub use driver::{generate, Config};
pub use error::GenerateError;
pub use tunables::Tunables;
