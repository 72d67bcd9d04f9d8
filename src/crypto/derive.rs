use std::str::FromStr;

use k256::ecdsa::signature::Signer;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use tiny_hderive::bip32::ExtendedPrivKey;
use zeroize::Zeroizing;

use super::address::{self, AddressError};
use super::mnemonic::Mnemonic;

/// Cosmos SDK coin type path
pub const DEFAULT_PATH: &str = "m/44'/118'/0'/0/0";

const HARDENED_BIT: u32 = 1 << 31;

/// BIP-32 path in `m/44'/118'/0'/0/0` notation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath(String);

impl DerivationPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self(DEFAULT_PATH.to_owned())
    }
}

impl FromStr for DerivationPath {
    type Err = InvalidDerivationPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDerivationPath(s.to_owned());

        let mut segments = s.trim().split('/');
        if segments.next() != Some("m") {
            return Err(invalid());
        }

        for segment in segments {
            let index = segment.strip_suffix('\'').unwrap_or(segment);
            let canonical = matches!(
                index.parse::<u32>(),
                Ok(value) if value < HARDENED_BIT && value.to_string() == index
            );
            if !canonical {
                return Err(invalid());
            }
        }

        Ok(Self(s.trim().to_owned()))
    }
}

impl TryFrom<String> for DerivationPath {
    type Error = InvalidDerivationPath;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DerivationPath> for String {
    fn from(path: DerivationPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns phrases into chain accounts for one fixed path and chain.
#[derive(Clone, Debug)]
pub struct KeyDeriver {
    path: DerivationPath,
    chain_id: String,
    prefix: &'static str,
}

impl KeyDeriver {
    pub fn new(path: DerivationPath, chain_id: &str) -> Result<Self, DeriveError> {
        let prefix = address::bech32_prefix(chain_id)
            .ok_or_else(|| DeriveError::UnsupportedChain(chain_id.to_owned()))?;
        Ok(Self {
            path,
            chain_id: chain_id.to_owned(),
            prefix,
        })
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn derive(&self, mnemonic: &Mnemonic) -> Result<KeyPair, DeriveError> {
        self.derive_with_passphrase(mnemonic, "")
    }

    /// The passphrase is NFKD-normalized before stretching.
    pub fn derive_with_passphrase(
        &self,
        mnemonic: &Mnemonic,
        passphrase: &str,
    ) -> Result<KeyPair, DeriveError> {
        let seed = mnemonic_to_seed(mnemonic, passphrase);

        let derived = ExtendedPrivKey::derive(seed.as_bytes(), self.path.as_str())
            .map_err(|_| DeriveError::InvalidPath)?;
        let secret = Zeroizing::new(derived.secret());

        let signing_key = SigningKey::from_slice(&secret[..]).map_err(|_| DeriveError::InvalidKey)?;

        let encoded = k256::PublicKey::from(signing_key.verifying_key()).to_encoded_point(true);
        let public_key: [u8; 33] = encoded
            .as_bytes()
            .try_into()
            .map_err(|_| DeriveError::InvalidKey)?;

        let address = address::encode_address(self.prefix, &public_key)?;

        Ok(KeyPair {
            signing_key,
            public_key,
            address,
        })
    }
}

/// One-shot derivation for callers without a long-lived deriver.
pub fn derive(
    mnemonic: &Mnemonic,
    path: &DerivationPath,
    chain_id: &str,
) -> Result<KeyPair, DeriveError> {
    KeyDeriver::new(path.clone(), chain_id)?.derive(mnemonic)
}

/// PBKDF2-HMAC-SHA512 key stretching with the `mnemonic` salt prefix.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> bip39::Seed {
    bip39::Seed::new(mnemonic.as_bip39(), passphrase)
}

/// Short-lived signing keys, zeroized on drop.
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: [u8; 33],
    address: String,
}

impl KeyPair {
    /// Compressed SEC1 public key
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&self.signing_key.to_bytes());
        secret
    }

    /// Deterministic (RFC 6979) low-S ECDSA over `SHA256(message)`.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let signature: k256::ecdsa::Signature = self.signing_key.sign(message);
        let mut result = [0u8; 64];
        result.copy_from_slice(&signature.to_bytes());
        result
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DeriveError {
    #[error("unsupported chain `{0}`")]
    UnsupportedChain(String),
    #[error("invalid derivation path")]
    InvalidPath,
    #[error("derived key is invalid")]
    InvalidKey,
    #[error("failed to encode address")]
    InvalidAddress(#[from] AddressError),
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("invalid derivation path `{0}`")]
pub struct InvalidDerivationPath(pub String);

#[cfg(test)]
mod tests {
    use k256::ecdsa::signature::Verifier;
    use proptest::prelude::*;

    use super::*;

    const ZERO_12: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn deriver(chain_id: &str) -> KeyDeriver {
        KeyDeriver::new(DerivationPath::default(), chain_id).unwrap()
    }

    #[test]
    fn seed_matches_bip39_vector() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();

        let seed = mnemonic_to_seed(&mnemonic, "TREZOR");
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn cosmos_account_vector() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();

        let keypair = deriver("cosmoshub-4").derive(&mnemonic).unwrap();
        assert_eq!(
            hex::encode(keypair.public_key()),
            "024f4e2ad99c34d60b9ba6283c9431a8418af8673212961f97a77b6377fcd05b62"
        );
        assert_eq!(
            keypair.address(),
            "cosmos19rl4cm2hmr8afy4kldpxz3fka4jguq0auqdal4"
        );

        let keypair = deriver("pion-1").derive(&mnemonic).unwrap();
        assert_eq!(
            keypair.address(),
            "neutron19rl4cm2hmr8afy4kldpxz3fka4jguq0aclyl9j"
        );
    }

    #[test]
    fn path_parsing() {
        assert_eq!(DerivationPath::default().as_str(), DEFAULT_PATH);
        assert!("m/44'/118'/0'/0/0".parse::<DerivationPath>().is_ok());
        assert!("m".parse::<DerivationPath>().is_ok());
        assert!("m/0/1/2".parse::<DerivationPath>().is_ok());

        for invalid in ["", "44'/118'", "m/", "m/a", "m/2147483648", "m/1''", "m/01", "m//1"] {
            assert!(
                invalid.parse::<DerivationPath>().is_err(),
                "{invalid} must be rejected"
            );
        }
    }

    #[test]
    fn path_serde() {
        #[derive(Deserialize)]
        struct Helper {
            path: DerivationPath,
        }

        let helper: Helper = toml::from_str("path = \"m/44'/529'/0'/0/0\"").unwrap();
        assert_eq!(helper.path.as_str(), "m/44'/529'/0'/0/0");

        assert!(toml::from_str::<Helper>("path = \"x/1\"").is_err());
    }

    #[test]
    fn unsupported_chain() {
        assert_eq!(
            KeyDeriver::new(DerivationPath::default(), "nowhere-1").unwrap_err(),
            DeriveError::UnsupportedChain("nowhere-1".to_owned())
        );
    }

    #[test]
    fn address_uses_chain_prefix() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();

        let cosmos = deriver("cosmoshub-4").derive(&mnemonic).unwrap();
        let neutron = deriver("pion-1").derive(&mnemonic).unwrap();

        assert!(cosmos.address().starts_with("cosmos1"));
        assert!(neutron.address().starts_with("neutron1"));
        assert_eq!(cosmos.public_key(), neutron.public_key());
        assert_eq!(
            address::decode_address(cosmos.address()).unwrap().1,
            address::decode_address(neutron.address()).unwrap().1
        );
    }

    #[test]
    fn passphrase_changes_keys() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();
        let deriver = deriver("pion-1");

        let plain = deriver.derive(&mnemonic).unwrap();
        let protected = deriver.derive_with_passphrase(&mnemonic, "extra").unwrap();
        assert_ne!(plain.address(), protected.address());
    }

    #[test]
    fn passphrase_is_normalized() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();
        let deriver = deriver("pion-1");

        let composed = deriver.derive_with_passphrase(&mnemonic, "caf\u{e9}").unwrap();
        let decomposed = deriver
            .derive_with_passphrase(&mnemonic, "cafe\u{301}")
            .unwrap();
        assert_eq!(composed.address(), decomposed.address());
    }

    #[test]
    fn different_paths_yield_different_keys() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();
        let first = deriver("pion-1").derive(&mnemonic).unwrap();
        let second = KeyDeriver::new("m/44'/118'/0'/0/1".parse().unwrap(), "pion-1")
            .unwrap()
            .derive(&mnemonic)
            .unwrap();
        assert_ne!(first.address(), second.address());
    }

    #[test]
    fn signatures_verify_and_are_deterministic() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();
        let keypair = deriver("pion-1").derive(&mnemonic).unwrap();

        let signature = keypair.sign(b"transfer");
        assert_eq!(signature, keypair.sign(b"transfer"));

        let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(keypair.public_key()).unwrap();
        let signature = k256::ecdsa::Signature::from_slice(&signature).unwrap();
        assert!(verifying_key.verify(b"transfer", &signature).is_ok());
        assert!(verifying_key.verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();
        let keypair = deriver("pion-1").derive(&mnemonic).unwrap();
        let secret = hex::encode(&keypair.secret_bytes()[..]);
        assert!(!format!("{keypair:?}").contains(&secret));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn derivation_is_deterministic(entropy in prop::collection::vec(any::<u8>(), 16)) {
            let mnemonic = Mnemonic::from_entropy(&entropy).unwrap();
            let path = DerivationPath::default();

            let first = derive(&mnemonic, &path, "pion-1").unwrap();
            let second = derive(&mnemonic.clone(), &path, "pion-1").unwrap();

            prop_assert_eq!(first.address(), second.address());
            prop_assert_eq!(first.public_key(), second.public_key());
            prop_assert_eq!(&first.secret_bytes()[..], &second.secret_bytes()[..]);
        }
    }
}
