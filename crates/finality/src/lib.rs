//! Finality voting on host blocks.
//!
//! Finality providers commit to EOTS randomness ahead of time, vote on host blocks with it, and
//! are tracked for liveness. A block is finalized once the providers behind more than two thirds
//! of the voting power at its height voted for it. Voting twice at one height reveals the
//! provider's key through [`evidence::Evidence`].

pub mod commitment;
pub mod errors;
pub mod evidence;
pub mod liveness;
pub mod merkle;
pub mod tally;
pub mod vote;

pub use commitment::{MsgCommitPubRand, PubRandCommit};
pub use errors::{FinalityError, FinalityResult};
pub use evidence::{detect_and_extract, Evidence};
pub use liveness::SigningInfo;
pub use merkle::PubRandProof;
pub use tally::IndexedBlock;
pub use vote::{verify_finality_vote, FinalityVote, MsgAddFinalitySig, VoteOutcome, VoteState};
