//! Keyring for encrypted configuration values
//!
//! # File Format
//!
//! A keyring is UTF-8 text holding one hex-encoded 32-byte key per line.
//! Blank lines and lines starting with `#` are ignored:
//!
//! ```text
//! # production keyring, newest key first
//! 6f1c...e2a9
//! 0b7d...41c3
//! ```
//!
//! # Value Format
//!
//! Encrypted values are stored in the backend as
//! `base64(nonce || ciphertext)` using ChaCha20-Poly1305 with a 12-byte
//! nonce. Decryption tries each key in order, so a keyring can carry old
//! keys during rotation.

use crate::error::{BackendError, BackendResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use std::fmt;
use std::io::Read;
use zeroize::Zeroizing;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A set of symmetric keys read from a keyring file
pub struct Keyring {
    keys: Vec<Zeroizing<[u8; KEY_LEN]>>,
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("keys", &format_args!("<{} redacted>", self.keys.len()))
            .finish()
    }
}

impl Keyring {
    /// Read and parse a keyring from any reader
    pub fn from_reader(reader: &mut dyn Read) -> BackendResult<Self> {
        let mut text = Zeroizing::new(String::new());
        reader.read_to_string(&mut text).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => BackendError::keyring("keyring is not valid UTF-8"),
            _ => BackendError::Io(e),
        })?;
        Self::parse(&text)
    }

    /// Parse keyring text
    pub fn parse(text: &str) -> BackendResult<Self> {
        let mut keys = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let bytes = Zeroizing::new(hex::decode(line).map_err(|e| {
                BackendError::keyring(format!("line {}: invalid hex: {}", lineno + 1, e))
            })?);
            if bytes.len() != KEY_LEN {
                return Err(BackendError::keyring(format!(
                    "line {}: expected {} key bytes, found {}",
                    lineno + 1,
                    KEY_LEN,
                    bytes.len()
                )));
            }

            let mut key = Zeroizing::new([0u8; KEY_LEN]);
            key.copy_from_slice(&bytes);
            keys.push(key);
        }

        if keys.is_empty() {
            return Err(BackendError::keyring("keyring contains no keys"));
        }

        Ok(Self { keys })
    }

    /// Generate a keyring with one fresh random key
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(key.as_slice());
        Self { keys: vec![bytes] }
    }

    /// Render the keyring in its file format
    pub fn to_text(&self) -> Zeroizing<String> {
        let mut out = String::new();
        for key in &self.keys {
            out.push_str(&hex::encode(key.as_slice()));
            out.push('\n');
        }
        Zeroizing::new(out)
    }

    /// Number of keys in the keyring
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyring holds no keys (never true for a parsed keyring)
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Encrypt a value with the first key, producing the stored text form
    pub fn encrypt(&self, plaintext: &[u8]) -> BackendResult<Vec<u8>> {
        let key = self
            .keys
            .first()
            .ok_or_else(|| BackendError::keyring("keyring contains no keys"))?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| BackendError::Decryption("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed).into_bytes())
    }

    /// Decrypt a stored value, trying every key in order
    pub fn decrypt(&self, encoded: &[u8]) -> BackendResult<Vec<u8>> {
        let text = std::str::from_utf8(encoded)
            .map_err(|_| BackendError::Decryption("value is not base64 text".to_string()))?;
        let sealed = STANDARD
            .decode(text.trim())
            .map_err(|e| BackendError::Decryption(format!("value is not base64: {}", e)))?;

        if sealed.len() < NONCE_LEN {
            return Err(BackendError::Decryption("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);

        self.keys
            .iter()
            .find_map(|key| {
                ChaCha20Poly1305::new(Key::from_slice(key.as_slice()))
                    .decrypt(nonce, ciphertext)
                    .ok()
            })
            .ok_or_else(|| {
                BackendError::Decryption("no key in the keyring can decrypt the value".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = format!(
            "# rotated 2024-01\n\n{}\n  {}  \n",
            "11".repeat(32),
            "22".repeat(32)
        );
        let keyring = Keyring::parse(&text).unwrap();
        assert_eq!(keyring.len(), 2);
    }

    #[test]
    fn test_parse_rejects_short_key() {
        let err = Keyring::parse("abcd\n").unwrap_err();
        assert!(matches!(err, BackendError::Keyring(msg) if msg.contains("line 1")));
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        let err = Keyring::parse(&"zz".repeat(32)).unwrap_err();
        assert!(matches!(err, BackendError::Keyring(msg) if msg.contains("invalid hex")));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            Keyring::parse("# nothing here\n"),
            Err(BackendError::Keyring(_))
        ));
    }

    #[test]
    fn test_from_reader_rejects_binary() {
        let mut bytes: &[u8] = &[0xff, 0xfe, 0x00, 0x9f];
        let err = Keyring::from_reader(&mut bytes).unwrap_err();
        assert!(matches!(err, BackendError::Keyring(msg) if msg.contains("UTF-8")));
    }

    #[test]
    fn test_from_reader_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let keyring = Keyring::generate();
        file.write_all(keyring.to_text().as_bytes()).unwrap();

        let mut reader = std::fs::File::open(file.path()).unwrap();
        let loaded = Keyring::from_reader(&mut reader).unwrap();
        assert_eq!(loaded.len(), 1);

        let sealed = keyring.encrypt(b"db_password=hunter2").unwrap();
        assert_eq!(loaded.decrypt(&sealed).unwrap(), b"db_password=hunter2");
    }

    #[test]
    fn test_decrypt_with_rotated_key() {
        let old = Keyring::generate();
        let sealed = old.encrypt(b"legacy").unwrap();

        let new = Keyring::generate();
        let rotated = Keyring::parse(&format!("{}{}", new.to_text().as_str(), old.to_text().as_str())).unwrap();

        assert_eq!(rotated.decrypt(&sealed).unwrap(), b"legacy");
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let sealed = Keyring::generate().encrypt(b"secret").unwrap();
        let other = Keyring::generate();
        assert!(matches!(other.decrypt(&sealed), Err(BackendError::Decryption(_))));
    }

    #[test]
    fn test_decrypt_rejects_plaintext() {
        let keyring = Keyring::generate();
        assert!(matches!(
            keyring.decrypt(b"port: 8080"),
            Err(BackendError::Decryption(_))
        ));
        assert!(matches!(keyring.decrypt(b"AAAA"), Err(BackendError::Decryption(_))));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let keyring = Keyring::generate();
        let rendered = format!("{:?}", keyring);
        assert!(rendered.contains("1 redacted"));
        assert!(!rendered.contains(keyring.to_text().trim()));
    }

    proptest! {
        #[test]
        fn prop_sealed_values_never_contain_plaintext(payload in proptest::collection::vec(any::<u8>(), 8..256)) {
            let keyring = Keyring::generate();
            let sealed = keyring.encrypt(&payload).unwrap();
            prop_assert!(!sealed.windows(payload.len()).any(|w| w == payload.as_slice()));
            prop_assert_eq!(keyring.decrypt(&sealed).unwrap(), payload);
        }
    }
}
