//! The secret-ballot tallying engine.
//!
//! Ballots flow through the pieces in this order: the [`KeyManager`] hands
//! out the election's public key, the [`TallyAccumulator`] folds each
//! admitted ciphertext into a running encrypted sum, the [`Tally`] state
//! machine decides when the election closes, and the [`ResultDecoder`]
//! turns the final sum into a published [`ElectionResult`].

mod accumulator;
mod decoder;
mod keys;
mod locks;
mod machine;

pub use accumulator::TallyAccumulator;
pub use decoder::{ElectionResult, ResultDecoder};
pub use keys::{ElectionKey, KeyManager};
pub use machine::Tally;
