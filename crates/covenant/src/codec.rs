//! Serde adapters for collections of adaptor signatures.
//!
//! Signatures are encoded in their fixed 65-byte form (compressed `R` followed by `s`), which
//! survives non-self-describing formats such as bincode.

use std::collections::BTreeMap;

use musig2::{AdaptorSignature, BinaryEncoding};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct EncodedSig(#[serde(with = "hex::serde")] Vec<u8>);

impl From<&AdaptorSignature> for EncodedSig {
    fn from(sig: &AdaptorSignature) -> Self {
        Self(sig.to_bytes().to_vec())
    }
}

impl EncodedSig {
    fn decode<E: serde::de::Error>(&self) -> Result<AdaptorSignature, E> {
        AdaptorSignature::from_bytes(&self.0).map_err(E::custom)
    }
}

/// Adaptor signatures keyed by the provider key they are encrypted under.
pub mod by_provider {
    use super::*;

    /// Serializes the map with every signature in its binary form.
    pub fn serialize<S: Serializer>(
        sigs: &BTreeMap<XOnlyPublicKey, AdaptorSignature>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(sigs.iter().map(|(fp_pk, sig)| (fp_pk, EncodedSig::from(sig))))
    }

    /// Deserializes a map written by [`serialize`].
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<XOnlyPublicKey, AdaptorSignature>, D::Error> {
        BTreeMap::<XOnlyPublicKey, EncodedSig>::deserialize(deserializer)?
            .into_iter()
            .map(|(fp_pk, sig)| sig.decode().map(|sig| (fp_pk, sig)))
            .collect()
    }
}

/// Adaptor signatures paired with the provider key they are encrypted under, in submission
/// order.
pub mod provider_pairs {
    use super::*;

    /// Serializes the pairs with every signature in its binary form.
    pub fn serialize<S: Serializer>(
        sigs: &[(XOnlyPublicKey, AdaptorSignature)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(sigs.iter().map(|(fp_pk, sig)| (fp_pk, EncodedSig::from(sig))))
    }

    /// Deserializes pairs written by [`serialize`].
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(XOnlyPublicKey, AdaptorSignature)>, D::Error> {
        Vec::<(XOnlyPublicKey, EncodedSig)>::deserialize(deserializer)?
            .into_iter()
            .map(|(fp_pk, sig)| sig.decode().map(|sig| (fp_pk, sig)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use btc_staking_test_utils::prelude::*;
    use secp256k1::Message;

    use super::*;
    use crate::adaptor::encrypt_sign;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sigs {
        #[serde(with = "by_provider")]
        map: BTreeMap<XOnlyPublicKey, AdaptorSignature>,

        #[serde(with = "provider_pairs")]
        pairs: Vec<(XOnlyPublicKey, AdaptorSignature)>,
    }

    fn sigs(num_providers: usize) -> Sigs {
        let member = generate_even_secret_key();
        let sighash = Message::from_digest([7; 32]);

        let pairs = (0..num_providers)
            .map(|_| {
                let fp_pk = generate_xonly_pubkey();
                (fp_pk, encrypt_sign(&member, &sighash, &fp_pk, generate_nonce_seed()))
            })
            .collect::<Vec<_>>();

        Sigs {
            map: pairs.iter().cloned().collect(),
            pairs,
        }
    }

    #[test]
    fn test_signatures_survive_bincode() {
        let sigs = sigs(3);

        let raw = bincode::serialize(&sigs).expect("must encode");
        let decoded: Sigs = bincode::deserialize(&raw).expect("must decode");

        assert_eq!(decoded, sigs);
    }

    #[test]
    fn test_signatures_survive_json() {
        let sigs = sigs(2);

        let raw = serde_json::to_string(&sigs).expect("must encode");
        let decoded: Sigs = serde_json::from_str(&raw).expect("must decode");

        assert_eq!(decoded, sigs);
    }

    #[test]
    fn test_truncated_signature_is_rejected() {
        let sigs = sigs(1);
        let mut raw = serde_json::to_value(&sigs).expect("must encode");

        let encoded = raw["pairs"][0][1].as_str().expect("hex string").to_string();
        raw["pairs"][0][1] = serde_json::Value::String(encoded[..encoded.len() - 2].to_string());

        assert!(serde_json::from_value::<Sigs>(raw).is_err());
    }
}
