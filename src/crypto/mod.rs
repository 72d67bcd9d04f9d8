pub use self::address::{bech32_prefix, decode_address, encode_address, AddressError};
pub use self::derive::{
    derive, mnemonic_to_seed, DerivationPath, DeriveError, InvalidDerivationPath, KeyDeriver,
    KeyPair, DEFAULT_PATH,
};
pub use self::mnemonic::{InvalidEntropyLength, Mnemonic, ValidationError, WordCount};

mod address;
mod derive;
mod mnemonic;
