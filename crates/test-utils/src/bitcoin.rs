//! Module to generate arbitrary bitcoin values for testing.
use std::collections::HashSet;

use bitcoin::{
    absolute::LockTime,
    block,
    hashes::Hash,
    key::rand::{rngs::OsRng, Rng},
    script::Builder,
    secp256k1::{Keypair, SecretKey, XOnlyPublicKey, SECP256K1},
    transaction, Amount, Block, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence,
    Transaction, TxIn, TxMerkleNode, TxOut, Txid, Witness,
};
use btc_staking_primitives::secp::EvenSecretKey;
use secp256k1::PublicKey;

/// Compact target of regtest blocks; about half of all hashes satisfy it.
pub const REGTEST_BITS: u32 = 0x207f_ffff;

/// Generates a random transaction ID.
pub fn generate_txid() -> Txid {
    let mut txid = [0u8; 32];
    OsRng.fill(&mut txid);

    Txid::from_slice(&txid).expect("should be able to generate arbitrary txid")
}

/// Generates a random outpoint.
pub fn generate_outpoint() -> OutPoint {
    let vout: u32 = OsRng.gen_range(0..8);

    OutPoint {
        txid: generate_txid(),
        vout,
    }
}

/// Generates a random secret key whose x-only public key is even.
pub fn generate_even_secret_key() -> EvenSecretKey {
    SecretKey::new(&mut OsRng).into()
}

/// Generates a random keypair that is guaranteed to be of even parity.
pub fn generate_keypair() -> Keypair {
    let sk = generate_even_secret_key();

    Keypair::from_secret_key(SECP256K1, &sk)
}

/// Generate `count` distinct (public key, private key) pairs as two separate [`Vec`].
pub fn generate_keypairs(count: usize) -> (Vec<PublicKey>, Vec<SecretKey>) {
    let mut secret_keys: Vec<SecretKey> = Vec::with_capacity(count);
    let mut pubkeys: Vec<PublicKey> = Vec::with_capacity(count);

    let mut pubkeys_set: HashSet<PublicKey> = HashSet::new();

    while pubkeys_set.len() != count {
        let sk = SecretKey::new(&mut OsRng);
        let keypair = Keypair::from_secret_key(SECP256K1, &sk);
        let pubkey = PublicKey::from_keypair(&keypair);

        if pubkeys_set.insert(pubkey) {
            secret_keys.push(sk);
            pubkeys.push(pubkey);
        }
    }

    (pubkeys, secret_keys)
}

/// Generates `count` distinct even secret keys along with their x-only public keys.
pub fn generate_xonly_keys(count: usize) -> (Vec<XOnlyPublicKey>, Vec<EvenSecretKey>) {
    let (_, secret_keys) = generate_keypairs(count);

    secret_keys
        .into_iter()
        .map(|sk| {
            let even: EvenSecretKey = sk.into();
            (even.x_only_public_key(), even)
        })
        .unzip()
}

/// Generates a random x-only public key.
pub fn generate_xonly_pubkey() -> XOnlyPublicKey {
    generate_even_secret_key().x_only_public_key()
}

/// Generates a random transaction.
pub fn generate_tx(num_inputs: usize, num_outputs: usize) -> Transaction {
    let inputs = (0..num_inputs)
        .map(|_| TxIn {
            previous_output: generate_outpoint(),
            witness: Witness::new(),
            sequence: Sequence(0),
            script_sig: ScriptBuf::new(),
        })
        .collect();

    let outputs = (0..num_outputs)
        .map(|_| {
            let value: u32 = OsRng.gen();

            TxOut {
                value: Amount::from_sat(value as u64),
                script_pubkey: ScriptBuf::new(),
            }
        })
        .collect();

    Transaction {
        version: transaction::Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    }
}

/// Creates a coinbase transaction that commits to `height` as per BIP34.
pub fn generate_coinbase(height: u64) -> Transaction {
    let height_script = Builder::new().push_int(height as i64).into_script();

    Transaction {
        version: transaction::Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: height_script,
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![],
    }
}

/// Grinds the nonce of a regtest header on top of `prev` until its hash meets its target.
///
/// `salt` is folded into the timestamp so that siblings mined on the same parent differ.
pub fn mine_header(prev: BlockHash, merkle_root: TxMerkleNode, salt: u32) -> block::Header {
    let mut header = block::Header {
        version: block::Version::TWO,
        prev_blockhash: prev,
        merkle_root,
        time: 1_700_000_000 + salt,
        bits: CompactTarget::from_consensus(REGTEST_BITS),
        nonce: 0,
    };

    while header.validate_pow(header.target()).is_err() {
        header.nonce += 1;
    }

    header
}

/// Mines a chain of `len` empty regtest headers on top of `prev`.
pub fn mine_chain(prev: BlockHash, len: usize, salt: u32) -> Vec<block::Header> {
    let mut headers = Vec::with_capacity(len);
    let mut parent = prev;

    for i in 0..len {
        let header = mine_header(parent, TxMerkleNode::all_zeros(), salt.wrapping_add(i as u32));
        parent = header.block_hash();
        headers.push(header);
    }

    headers
}

/// Mines a regtest block on top of `prev` containing a coinbase followed by `txs`.
pub fn mine_block(prev: BlockHash, height: u64, txs: Vec<Transaction>, salt: u32) -> Block {
    let mut txdata = vec![generate_coinbase(height)];
    txdata.extend(txs);

    let mut block = Block {
        header: block::Header {
            version: block::Version::TWO,
            prev_blockhash: prev,
            merkle_root: TxMerkleNode::all_zeros(),
            time: 0,
            bits: CompactTarget::from_consensus(REGTEST_BITS),
            nonce: 0,
        },
        txdata,
    };

    let merkle_root = block
        .compute_merkle_root()
        .expect("block has at least the coinbase");
    block.header = mine_header(prev, merkle_root, salt);

    block
}

/// A header whose parent is the all-zero hash, suitable as the base of a test chain.
pub fn base_header() -> block::Header {
    mine_header(BlockHash::all_zeros(), TxMerkleNode::all_zeros(), 0)
}
