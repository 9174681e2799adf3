//! The slashing transaction.
//!
//! A slashing tx spends a staking or unbonding output through its slashing leaf. It pays the
//! slashed portion to the slashing script and returns the rest, minus the fee, to the staker
//! behind the unbonding timelock.

use std::collections::BTreeMap;

use bitcoin::{
    absolute::LockTime, taproot::ControlBlock, Amount, OutPoint, ScriptBuf, Transaction, TxOut,
    Witness,
};
use btc_staking_covenant::{decrypt, recover_decryption_key, AdaptorSignature};
use btc_staking_params::StakingParams;
use btc_staking_primitives::{
    scripts::prelude::{create_tx, create_tx_ins, create_tx_outs},
    secp::EvenSecretKey,
};
use secp256k1::{schnorr, Message, XOnlyPublicKey, SECP256K1};
use tracing::{debug, warn};

use crate::{
    connectors::{change::SlashingChangeConnector, Connector, SlashableConnector},
    errors::{TxGraphError, TxGraphResult},
    keys::StakingKeys,
    transactions::{leaf_sighash, multisig_witness, select_quorum, verify_schnorr_sig},
};

/// A slashing tx together with what is needed to sign and finalize it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashingTx {
    tx: Transaction,
    prevout: TxOut,
    leaf_script: ScriptBuf,
    control_block: ControlBlock,
    keys: StakingKeys,
}

impl SlashingTx {
    /// Index of the output that receives the slashed funds.
    pub const SLASHING_VOUT: u32 = 0;
    /// Index of the change output.
    pub const CHANGE_VOUT: u32 = 1;

    /// Derives the slashing tx of the output `connector` describes at `funding_outpoint`.
    ///
    /// # Errors
    ///
    /// If the output cannot cover the slashed amount, the fee and a non-zero change.
    pub fn new<C: SlashableConnector>(
        connector: &C,
        funding_outpoint: OutPoint,
        params: &StakingParams,
    ) -> TxGraphResult<Self> {
        let value = connector.value();
        let slashed = params.slashing_rate.slashed_amount(value);
        let required = slashed
            .checked_add(params.slashing_tx_fee)
            .ok_or(TxGraphError::InsufficientValue {
                value,
                required: Amount::MAX,
            })?;

        let change = match value.checked_sub(required) {
            Some(change) if change > Amount::ZERO => change,
            _ => return Err(TxGraphError::InsufficientValue { value, required }),
        };

        let keys = connector.keys().clone();
        let change_connector = SlashingChangeConnector::new(
            connector.network(),
            *keys.staker_pk(),
            params.unbonding_time,
            change,
        );

        let tx = create_tx(
            create_tx_ins([funding_outpoint]),
            create_tx_outs([
                (params.slashing_pk_script.clone(), slashed),
                (change_connector.script_pubkey(), change),
            ]),
        );

        let (leaf_script, control_block) = connector.leaf(C::SLASHING_LEAF);

        Ok(Self {
            tx,
            prevout: connector.tx_out(),
            leaf_script,
            control_block,
            keys,
        })
    }

    /// Verifies `candidate` against the derived tx and adopts it.
    ///
    /// The candidate may differ from the derived tx only in fields that do not affect where the
    /// funds go, such as its version and input sequence.
    pub fn from_tx<C: SlashableConnector>(
        candidate: Transaction,
        connector: &C,
        funding_outpoint: OutPoint,
        params: &StakingParams,
    ) -> TxGraphResult<Self> {
        let mut slashing_tx = Self::new(connector, funding_outpoint, params)?;
        slashing_tx.verify(&candidate)?;
        slashing_tx.tx = candidate;

        Ok(slashing_tx)
    }

    /// Checks that `candidate` spends the same output into the same outputs as this tx.
    pub fn verify(&self, candidate: &Transaction) -> TxGraphResult<()> {
        if candidate.input.len() != 1 {
            return Err(TxGraphError::WrongInputCount {
                expected: 1,
                actual: candidate.input.len(),
            });
        }

        let expected_input = self.tx.input[0].previous_output;
        if candidate.input[0].previous_output != expected_input {
            return Err(TxGraphError::WrongInput {
                expected: expected_input,
                actual: candidate.input[0].previous_output,
            });
        }

        if candidate.lock_time != LockTime::ZERO {
            return Err(TxGraphError::NonZeroLockTime);
        }

        if candidate.output.len() != self.tx.output.len() {
            return Err(TxGraphError::WrongOutputCount {
                expected: self.tx.output.len(),
                actual: candidate.output.len(),
            });
        }

        for (vout, (actual, expected)) in candidate.output.iter().zip(&self.tx.output).enumerate() {
            let vout = vout as u32;
            if actual.script_pubkey != expected.script_pubkey {
                return Err(TxGraphError::ScriptMismatch { vout });
            }
            if actual.value != expected.value {
                return Err(TxGraphError::WrongAmount {
                    vout,
                    expected: expected.value,
                    actual: actual.value,
                });
            }
        }

        Ok(())
    }

    /// Returns the unsigned tx.
    pub const fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Returns the output being slashed.
    pub const fn prevout(&self) -> &TxOut {
        &self.prevout
    }

    /// Computes the sighash every party signs.
    pub fn sighash(&self) -> TxGraphResult<Message> {
        leaf_sighash(&self.tx, &self.prevout, &self.leaf_script)
    }

    /// Checks a signature by `pk` over this tx.
    pub fn verify_signature(&self, pk: &XOnlyPublicKey, sig: &schnorr::Signature) -> TxGraphResult<()> {
        verify_schnorr_sig(pk, &self.sighash()?, sig)
    }

    /// Assembles the slashing-path witness and returns the signed tx.
    ///
    /// Surplus covenant signatures beyond the quorum are dropped.
    pub fn finalize(
        self,
        staker_sig: schnorr::Signature,
        fp_pk: &XOnlyPublicKey,
        fp_sig: schnorr::Signature,
        covenant_sigs: &BTreeMap<XOnlyPublicKey, schnorr::Signature>,
    ) -> TxGraphResult<Transaction> {
        if !self.keys.fp_pks().contains(fp_pk) {
            return Err(TxGraphError::UnknownProvider(*fp_pk));
        }

        let sighash = self.sighash()?;
        verify_schnorr_sig(self.keys.staker_pk(), &sighash, &staker_sig)?;
        verify_schnorr_sig(fp_pk, &sighash, &fp_sig)?;

        let covenant = self.keys.covenant();
        let covenant_sigs = select_quorum(covenant.members(), covenant.quorum(), covenant_sigs)?;

        let mut witness = multisig_witness(covenant.members(), &covenant_sigs);
        witness.extend(multisig_witness(
            self.keys.fp_pks(),
            &BTreeMap::from([(*fp_pk, fp_sig)]),
        ));
        witness.push(staker_sig.serialize().to_vec());
        witness.push(self.leaf_script.to_bytes());
        witness.push(self.control_block.serialize());

        let mut tx = self.tx;
        tx.input[0].witness = Witness::from_slice(&witness);

        Ok(tx)
    }

    /// Signs as the provider and completes the covenant adaptor signatures with its extracted
    /// key, then assembles the witness.
    ///
    /// `covenant_adaptor_sigs` must be the signatures encrypted under this provider's key.
    /// Signatures from non-members or that do not complete correctly are skipped.
    pub fn finalize_with_provider_key(
        self,
        staker_sig: schnorr::Signature,
        fp_sk: &EvenSecretKey,
        covenant_adaptor_sigs: &BTreeMap<XOnlyPublicKey, AdaptorSignature>,
    ) -> TxGraphResult<Transaction> {
        let fp_pk = fp_sk.x_only_public_key();
        let sighash = self.sighash()?;

        let fp_sig = SECP256K1.sign_schnorr_no_aux_rand(&sighash, &fp_sk.keypair());

        let covenant = self.keys.covenant();
        let covenant_sigs = covenant_adaptor_sigs
            .iter()
            .filter(|(member, _)| covenant.contains(member))
            .filter_map(|(member, adaptor_sig)| {
                let sig = decrypt(adaptor_sig, fp_sk)
                    .inspect_err(|e| warn!(%member, %e, "could not complete covenant signature"))
                    .ok()?;

                verify_schnorr_sig(member, &sighash, &sig)
                    .inspect_err(|_| warn!(%member, "completed covenant signature is invalid"))
                    .ok()?;

                Some((*member, sig))
            })
            .collect::<BTreeMap<_, _>>();

        debug!(%fp_pk, num_covenant_sigs = covenant_sigs.len(), "finalizing slashing tx");

        self.finalize(staker_sig, &fp_pk, fp_sig, &covenant_sigs)
    }

    /// Extracts the provider's secret key from a signed version of this tx.
    ///
    /// A covenant signature in the witness is the completion of that member's adaptor signature,
    /// which reveals the key it was encrypted under.
    pub fn reveal_provider_key(
        &self,
        signed: &Transaction,
        fp_pk: &XOnlyPublicKey,
        covenant_adaptor_sigs: &BTreeMap<XOnlyPublicKey, AdaptorSignature>,
    ) -> TxGraphResult<EvenSecretKey> {
        if signed.compute_txid() != self.tx.compute_txid() {
            return Err(TxGraphError::TxMismatch);
        }

        let members = self.keys.covenant().members();
        let witness = &signed.input[0].witness;
        let expected_len = members.len() + self.keys.fp_pks().len() + 3;
        if witness.len() != expected_len {
            return Err(TxGraphError::MalformedWitness(format!(
                "expected {expected_len} items, found {}",
                witness.len()
            )));
        }

        for (i, member) in members.iter().enumerate() {
            let Some(adaptor_sig) = covenant_adaptor_sigs.get(member) else {
                continue;
            };

            // covenant items are in reverse key order at the bottom of the stack
            let item = witness.nth(members.len() - 1 - i).unwrap_or_default();
            if item.is_empty() {
                continue;
            }

            let Ok(sig) = schnorr::Signature::from_slice(item) else {
                continue;
            };

            if let Ok(fp_sk) = recover_decryption_key(adaptor_sig, &sig, fp_pk) {
                return Ok(fp_sk);
            }
        }

        Err(TxGraphError::MalformedWitness(
            "no covenant signature reveals the provider key".to_string(),
        ))
    }
}
