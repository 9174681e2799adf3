//! Covenant committee adaptor signatures.
//!
//! Each committee member pre-signs the slashing transactions of a delegation with an adaptor
//! signature encrypted under the finality provider's key. The signatures can only be completed
//! once that key is known, i.e., once the provider has been caught equivocating. Conversely, a
//! completed signature that shows up on-chain reveals the provider's key.

pub mod adaptor;
pub mod codec;
pub mod committee;
pub mod errors;
pub mod quorum;

pub use adaptor::{
    decrypt, encrypt_sign, encryption_point, recover_decryption_key, verify_adaptor_sig,
    AdaptorSignature,
};
pub use committee::CovenantCommittee;
pub use errors::{CovenantError, CovenantResult};
pub use quorum::{count_valid_quorum, valid_members};
