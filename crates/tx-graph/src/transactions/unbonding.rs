//! The unbonding transaction.

use std::collections::BTreeMap;

use bitcoin::{
    absolute::LockTime, taproot::ControlBlock, Amount, OutPoint, ScriptBuf, Transaction, TxOut,
    Witness,
};
use btc_staking_params::StakingParams;
use btc_staking_primitives::scripts::prelude::{create_tx, create_tx_ins};
use secp256k1::{schnorr, Message, XOnlyPublicKey};

use crate::{
    connectors::{staking::StakingConnector, unbonding::UnbondingConnector, Connector, SlashableConnector},
    errors::{TxGraphError, TxGraphResult},
    transactions::{leaf_sighash, multisig_witness, select_quorum, verify_schnorr_sig},
};

/// Moves a stake from the staking output into the unbonding output, paying the unbonding fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbondingTx {
    tx: Transaction,
    prevout: TxOut,
    leaf_script: ScriptBuf,
    control_block: ControlBlock,
    connector: UnbondingConnector,
    staking: StakingConnector,
}

impl UnbondingTx {
    /// Index of the unbonding output.
    pub const UNBONDING_VOUT: u32 = 0;

    /// Derives the unbonding tx of the staking output at `staking_outpoint`.
    ///
    /// # Errors
    ///
    /// If the stake cannot cover the unbonding fee.
    pub fn new(
        staking: &StakingConnector,
        staking_outpoint: OutPoint,
        params: &StakingParams,
    ) -> TxGraphResult<Self> {
        let value = staking.value();
        let unbonding_value = match value.checked_sub(params.unbonding_fee) {
            Some(v) if v > Amount::ZERO => v,
            _ => {
                return Err(TxGraphError::InsufficientValue {
                    value,
                    required: params.unbonding_fee,
                })
            }
        };

        let connector = UnbondingConnector::new(
            staking.network(),
            staking.keys().clone(),
            params.unbonding_time,
            unbonding_value,
        );

        let tx = create_tx(create_tx_ins([staking_outpoint]), vec![connector.tx_out()]);
        let (leaf_script, control_block) = staking.leaf(StakingConnector::UNBONDING_LEAF);

        Ok(Self {
            tx,
            prevout: staking.tx_out(),
            leaf_script,
            control_block,
            connector,
            staking: staking.clone(),
        })
    }

    /// Verifies `candidate` against the derived tx and adopts it.
    pub fn from_tx(
        candidate: Transaction,
        staking: &StakingConnector,
        staking_outpoint: OutPoint,
        params: &StakingParams,
    ) -> TxGraphResult<Self> {
        let mut unbonding_tx = Self::new(staking, staking_outpoint, params)?;
        unbonding_tx.verify(&candidate)?;
        unbonding_tx.tx = candidate;

        Ok(unbonding_tx)
    }

    /// Checks that `candidate` spends the staking output into the derived unbonding output.
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

        if candidate.output.len() != 1 {
            return Err(TxGraphError::WrongOutputCount {
                expected: 1,
                actual: candidate.output.len(),
            });
        }

        let expected = self.connector.tx_out();
        let actual = &candidate.output[0];
        if actual.script_pubkey != expected.script_pubkey {
            return Err(TxGraphError::ScriptMismatch { vout: 0 });
        }
        if actual.value != expected.value {
            return Err(TxGraphError::WrongAmount {
                vout: 0,
                expected: expected.value,
                actual: actual.value,
            });
        }

        Ok(())
    }

    /// Returns the unsigned tx.
    pub const fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Returns the outpoint of the unbonding output.
    pub fn unbonding_outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.tx.compute_txid(),
            vout: Self::UNBONDING_VOUT,
        }
    }

    /// Returns the unbonding output's connector.
    pub const fn connector(&self) -> &UnbondingConnector {
        &self.connector
    }

    /// Returns the staking output's connector.
    pub const fn staking(&self) -> &StakingConnector {
        &self.staking
    }

    /// Computes the sighash of the unbonding path.
    pub fn sighash(&self) -> TxGraphResult<Message> {
        leaf_sighash(&self.tx, &self.prevout, &self.leaf_script)
    }

    /// Checks a signature by `pk` over this tx.
    pub fn verify_signature(&self, pk: &XOnlyPublicKey, sig: &schnorr::Signature) -> TxGraphResult<()> {
        verify_schnorr_sig(pk, &self.sighash()?, sig)
    }

    /// Assembles the unbonding-path witness and returns the signed tx.
    pub fn finalize(
        self,
        staker_sig: schnorr::Signature,
        covenant_sigs: &BTreeMap<XOnlyPublicKey, schnorr::Signature>,
    ) -> TxGraphResult<Transaction> {
        let keys = self.staking.keys();
        let sighash = self.sighash()?;
        verify_schnorr_sig(keys.staker_pk(), &sighash, &staker_sig)?;
        for (member, sig) in covenant_sigs {
            verify_schnorr_sig(member, &sighash, sig)?;
        }

        let covenant = keys.covenant();
        let covenant_sigs = select_quorum(covenant.members(), covenant.quorum(), covenant_sigs)?;

        let mut witness = multisig_witness(covenant.members(), &covenant_sigs);
        witness.push(staker_sig.serialize().to_vec());
        witness.push(self.leaf_script.to_bytes());
        witness.push(self.control_block.serialize());

        let mut tx = self.tx;
        tx.input[0].witness = Witness::from_slice(&witness);

        Ok(tx)
    }
}
