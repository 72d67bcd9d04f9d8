use std::str::FromStr;

use bip39::{ErrorKind, Language, MnemonicType};
use zeroize::Zeroizing;

const LANGUAGE: Language = Language::English;

/// Supported phrase lengths
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WordCount {
    #[default]
    Words12,
    Words15,
    Words18,
    Words21,
    Words24,
}

impl WordCount {
    pub const ALL: [Self; 5] = [
        Self::Words12,
        Self::Words15,
        Self::Words18,
        Self::Words21,
        Self::Words24,
    ];

    pub fn from_word_count(count: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.word_count() == count)
    }

    pub fn from_entropy_bits(bits: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.entropy_bits() == bits)
    }

    pub fn word_count(self) -> usize {
        self.mnemonic_type().word_count()
    }

    pub fn entropy_bits(self) -> usize {
        self.mnemonic_type().entropy_bits()
    }

    pub fn checksum_bits(self) -> usize {
        self.mnemonic_type().checksum_bits() as usize
    }

    pub fn entropy_bytes(self) -> usize {
        self.entropy_bits() / 8
    }

    fn mnemonic_type(self) -> MnemonicType {
        match self {
            Self::Words12 => MnemonicType::Words12,
            Self::Words15 => MnemonicType::Words15,
            Self::Words18 => MnemonicType::Words18,
            Self::Words21 => MnemonicType::Words21,
            Self::Words24 => MnemonicType::Words24,
        }
    }
}

impl FromStr for WordCount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<usize>()
            .ok()
            .and_then(Self::from_word_count)
            .ok_or_else(|| anyhow::anyhow!("word count must be one of 12, 15, 18, 21 or 24"))
    }
}

/// Validated English seed phrase.
#[derive(Clone)]
pub struct Mnemonic {
    inner: bip39::Mnemonic,
}

impl Mnemonic {
    /// Draws fresh entropy from the OS-seeded CSPRNG and encodes it.
    pub fn generate(word_count: WordCount) -> Self {
        Self {
            inner: bip39::Mnemonic::new(word_count.mnemonic_type(), LANGUAGE),
        }
    }

    pub fn from_entropy(entropy: &[u8]) -> Result<Self, InvalidEntropyLength> {
        match bip39::Mnemonic::from_entropy(entropy, LANGUAGE) {
            Ok(inner) => Ok(Self { inner }),
            Err(_) => Err(InvalidEntropyLength(entropy.len())),
        }
    }

    /// Checks word count, list membership and checksum, in that order.
    pub fn validate<I, S>(words: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words.into_iter().collect::<Vec<_>>();
        if WordCount::from_word_count(words.len()).is_none() {
            return Err(ValidationError::InvalidWordCount(words.len()));
        }

        if let Some(unknown) = ValidationError::unknown_word(&words) {
            return Err(unknown);
        }

        let phrase = Zeroizing::new(
            words
                .iter()
                .map(|word| word.as_ref())
                .collect::<Vec<&str>>()
                .join(" "),
        );
        match bip39::Mnemonic::from_phrase(&phrase, LANGUAGE) {
            Ok(inner) => Ok(Self { inner }),
            Err(e) => Err(ValidationError::from_bip39(&e, &words)),
        }
    }

    /// Splits a user supplied phrase on whitespace and validates it.
    pub fn parse_phrase(phrase: &str) -> Result<Self, ValidationError> {
        Self::validate(phrase.split_whitespace().map(str::to_lowercase))
    }

    pub fn word_count(&self) -> WordCount {
        // NOTE: the length was checked on construction
        WordCount::from_word_count(self.words().count()).unwrap_or_default()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.phrase().split(' ')
    }

    /// Space-joined lowercase words.
    pub fn phrase(&self) -> &str {
        self.inner.phrase()
    }

    pub fn entropy(&self) -> &[u8] {
        self.inner.entropy()
    }

    pub(crate) fn as_bip39(&self) -> &bip39::Mnemonic {
        &self.inner
    }
}

impl FromStr for Mnemonic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_phrase(s)
    }
}

impl Eq for Mnemonic {}

impl PartialEq for Mnemonic {
    fn eq(&self, other: &Self) -> bool {
        self.entropy() == other.entropy()
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.word_count().word_count())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("expected 12, 15, 18, 21 or 24 words, got {0}")]
    InvalidWordCount(usize),
    #[error("word #{} `{word}` is not in the word list", .index + 1)]
    UnknownWord { index: usize, word: String },
    #[error("checksum mismatch, the phrase contains a typo")]
    ChecksumMismatch,
}

impl ValidationError {
    fn from_bip39<S: AsRef<str>>(error: &anyhow::Error, words: &[S]) -> Self {
        match error.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::InvalidWordLength(count)) => Self::InvalidWordCount(*count),
            Some(ErrorKind::InvalidWord) => {
                Self::unknown_word(words).unwrap_or(Self::InvalidWordCount(words.len()))
            }
            _ => Self::ChecksumMismatch,
        }
    }

    fn unknown_word<S: AsRef<str>>(words: &[S]) -> Option<Self> {
        let wordmap = LANGUAGE.wordmap();
        words.iter().enumerate().find_map(|(index, word)| {
            let word: &str = word.as_ref();
            wordmap.get_bits(word).is_err().then(|| Self::UnknownWord {
                index,
                word: word.to_owned(),
            })
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("entropy must be 16, 20, 24, 28 or 32 bytes, got {0}")]
pub struct InvalidEntropyLength(pub usize);

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const ZERO_12: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn wordmap_lookup() {
        let wordmap = LANGUAGE.wordmap();
        assert!(wordmap.get_bits("abandon").is_ok());
        assert!(wordmap.get_bits("zoo").is_ok());
        assert!(wordmap.get_bits("Zoo").is_err());
        assert!(wordmap.get_bits("").is_err());
    }

    #[test]
    fn known_vectors() {
        let vectors: &[(&[u8], &str)] = &[
            (&[0x00; 16], ZERO_12),
            (
                &[0x7f; 16],
                "legal winner thank year wave sausage worth useful legal winner thank yellow",
            ),
            (
                &[0x80; 16],
                "letter advice cage absurd amount doctor acoustic avoid letter advice cage above",
            ),
            (
                &[0xff; 16],
                "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong",
            ),
        ];

        for (entropy, phrase) in vectors {
            let mnemonic = Mnemonic::from_entropy(entropy).unwrap();
            assert_eq!(mnemonic.phrase(), *phrase);
            assert_eq!(mnemonic.entropy(), *entropy);

            let parsed = Mnemonic::parse_phrase(phrase).unwrap();
            assert_eq!(parsed, mnemonic);
        }
    }

    #[test]
    fn zero_entropy_24_words() {
        let mnemonic = Mnemonic::from_entropy(&[0; 32]).unwrap();
        let words = mnemonic.words().collect::<Vec<_>>();
        assert_eq!(words.len(), 24);
        assert!(words[..23].iter().all(|word| *word == "abandon"));
        assert_eq!(words[23], "art");
    }

    #[test]
    fn rejects_wrong_word_count() {
        let words = ZERO_12.split(' ').take(11);
        assert_eq!(
            Mnemonic::validate(words).unwrap_err(),
            ValidationError::InvalidWordCount(11)
        );
        assert_eq!(
            Mnemonic::validate(Vec::<&str>::new()).unwrap_err(),
            ValidationError::InvalidWordCount(0)
        );
    }

    #[test]
    fn rejects_unknown_word() {
        let phrase = ZERO_12.replacen("abandon", "abandonn", 1);
        assert_eq!(
            Mnemonic::parse_phrase(&phrase).unwrap_err(),
            ValidationError::UnknownWord {
                index: 0,
                word: "abandonn".to_owned()
            }
        );
    }

    #[test]
    fn word_count_is_checked_before_membership() {
        assert_eq!(
            Mnemonic::parse_phrase("foo bar").unwrap_err(),
            ValidationError::InvalidWordCount(2)
        );
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let phrase = ["abandon"; 12];
        assert_eq!(
            Mnemonic::validate(phrase).unwrap_err(),
            ValidationError::ChecksumMismatch
        );

        let phrase = "legal winner thank year wave sausage worth useful legal winner thank year";
        assert_eq!(
            Mnemonic::parse_phrase(phrase).unwrap_err(),
            ValidationError::ChecksumMismatch
        );
    }

    #[test]
    fn library_errors_are_mapped() {
        let words = ["abandon", "qwerty", "zoo"];

        let error = anyhow::Error::from(ErrorKind::InvalidWord);
        assert_eq!(
            ValidationError::from_bip39(&error, &words),
            ValidationError::UnknownWord {
                index: 1,
                word: "qwerty".to_owned()
            }
        );

        let error = anyhow::Error::from(ErrorKind::InvalidWordLength(13));
        assert_eq!(
            ValidationError::from_bip39(&error, &words),
            ValidationError::InvalidWordCount(13)
        );

        let error = anyhow::Error::from(ErrorKind::InvalidChecksum);
        assert_eq!(
            ValidationError::from_bip39(&error, &words),
            ValidationError::ChecksumMismatch
        );
    }

    #[test]
    fn parse_phrase_normalizes_whitespace_and_case() {
        let messy = format!("  {}\n", ZERO_12.to_uppercase().replace(' ', "\t "));
        assert_eq!(Mnemonic::parse_phrase(&messy).unwrap().phrase(), ZERO_12);
    }

    #[test]
    fn debug_does_not_leak_words() {
        let mnemonic = Mnemonic::parse_phrase(ZERO_12).unwrap();
        let debug = format!("{mnemonic:?}");
        assert!(!debug.contains("abandon"));
    }

    #[test]
    fn word_count_parameters() {
        for (word_count, bits, checksum) in [
            (WordCount::Words12, 128, 4),
            (WordCount::Words15, 160, 5),
            (WordCount::Words18, 192, 6),
            (WordCount::Words21, 224, 7),
            (WordCount::Words24, 256, 8),
        ] {
            assert_eq!(word_count.entropy_bits(), bits);
            assert_eq!(word_count.checksum_bits(), checksum);
            assert_eq!(WordCount::from_entropy_bits(bits), Some(word_count));
        }
        assert_eq!(WordCount::from_entropy_bits(100), None);
        assert!("13".parse::<WordCount>().is_err());
        assert_eq!("24".parse::<WordCount>().unwrap(), WordCount::Words24);
    }

    #[test]
    fn generated_phrases_validate() {
        for word_count in WordCount::ALL {
            let mnemonic = Mnemonic::generate(word_count);
            assert_eq!(mnemonic.word_count(), word_count);

            let reparsed = Mnemonic::validate(mnemonic.words()).unwrap();
            assert_eq!(reparsed, mnemonic);
        }
    }

    #[test]
    fn invalid_entropy_length() {
        assert_eq!(
            Mnemonic::from_entropy(&[0; 17]).unwrap_err(),
            InvalidEntropyLength(17)
        );
    }

    fn entropy_strategy() -> impl Strategy<Value = Vec<u8>> {
        prop::sample::select(vec![16usize, 20, 24, 28, 32])
            .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
    }

    proptest! {
        #[test]
        fn validate_accepts_every_encoding(entropy in entropy_strategy()) {
            let mnemonic = Mnemonic::from_entropy(&entropy).unwrap();
            let phrase = mnemonic.phrase();
            let parsed = Mnemonic::parse_phrase(&phrase).unwrap();
            prop_assert_eq!(parsed.entropy(), entropy.as_slice());
        }

        #[test]
        fn foreign_token_is_reported(entropy in entropy_strategy(), position in 0usize..12) {
            let mnemonic = Mnemonic::from_entropy(&entropy).unwrap();
            let mut words = mnemonic.words().map(str::to_owned).collect::<Vec<_>>();
            words[position] = "qwerty".to_owned();
            prop_assert_eq!(
                Mnemonic::validate(&words).unwrap_err(),
                ValidationError::UnknownWord { index: position, word: "qwerty".to_owned() }
            );
        }
    }
}
