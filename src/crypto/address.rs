use std::collections::HashMap;

use bech32::{Bech32, Hrp};
use once_cell::race::OnceBox;
use sha2::Digest;

macro_rules! decl_known_chains {
    ($ident:ident, { $($chain_id:literal => $prefix:literal),*$(,)? }) => {
        /// Returns the bech32 prefix of a known chain id.
        pub fn $ident(chain_id: &str) -> Option<&'static str> {
            static KNOWN_CHAINS: OnceBox<HashMap<&'static str, &'static str>> = OnceBox::new();
            KNOWN_CHAINS
                .get_or_init(|| Box::new(HashMap::from([$(($chain_id, $prefix)),*])))
                .get(chain_id)
                .copied()
        }
    };
}

decl_known_chains! {
    bech32_prefix, {
        "cosmoshub-4" => "cosmos",
        "theta-testnet-001" => "cosmos",
        "neutron-1" => "neutron",
        "pion-1" => "neutron",
        "osmosis-1" => "osmo",
        "osmo-test-5" => "osmo",
        "juno-1" => "juno",
        "uni-6" => "juno",
        "testing" => "wasm",
    }
}

/// `RIPEMD160(SHA256(pubkey))`
pub fn account_id(public_key: &[u8]) -> [u8; 20] {
    let sha = sha2::Sha256::digest(public_key);
    let mut id = [0u8; 20];
    id.copy_from_slice(&ripemd160::Ripemd160::digest(&sha));
    id
}

pub fn encode_address(prefix: &str, public_key: &[u8]) -> Result<String, AddressError> {
    let hrp = Hrp::parse(prefix).map_err(|_| AddressError::InvalidPrefix)?;
    bech32::encode::<Bech32>(hrp, &account_id(public_key)).map_err(|_| AddressError::Encoding)
}

/// Splits an account address into its prefix and account id.
pub fn decode_address(address: &str) -> Result<(String, [u8; 20]), AddressError> {
    let (hrp, data) = bech32::decode(address).map_err(|_| AddressError::Encoding)?;
    let account_id = data
        .try_into()
        .map_err(|data: Vec<u8>| AddressError::InvalidLength(data.len()))?;
    Ok((hrp.to_string(), account_id))
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid bech32 prefix")]
    InvalidPrefix,
    #[error("invalid bech32 string")]
    Encoding,
    #[error("expected 20 bytes account id, got {0}")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_prefixes() {
        assert_eq!(bech32_prefix("cosmoshub-4"), Some("cosmos"));
        assert_eq!(bech32_prefix("pion-1"), Some("neutron"));
        assert_eq!(bech32_prefix("testing"), Some("wasm"));
        assert_eq!(bech32_prefix("unknown-1"), None);
    }

    #[test]
    fn address_roundtrip_keeps_account_id() {
        let public_key = [2u8; 33];
        let address = encode_address("neutron", &public_key).unwrap();
        assert!(address.starts_with("neutron1"));

        let (prefix, id) = decode_address(&address).unwrap();
        assert_eq!(prefix, "neutron");
        assert_eq!(id, account_id(&public_key));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            decode_address("neutron1invalid").unwrap_err(),
            AddressError::Encoding
        );
        assert_eq!(
            encode_address("", &[2u8; 33]).unwrap_err(),
            AddressError::InvalidPrefix
        );
    }
}
