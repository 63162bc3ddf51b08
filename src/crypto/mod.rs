use aes::{Aes128, Aes256};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use cmac::{Cmac, Mac};
use std::fmt;

use crate::error::{LedgerError, Result};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const INDEX_LABEL: &[u8] = b"cardledger/number-index/v1";

/// A 32-byte secret used for card number encryption
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| LedgerError::Codec(format!("Invalid key encoding: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::Codec("Encryption key must be 32 bytes".to_string()))?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Never print key material.
impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Reversible encryption of primary account numbers.
///
/// Numbers are sealed with AES-256-GCM under a fresh random nonce, so two
/// encryptions of the same number differ. Equality lookups go through
/// [`CardNumberCodec::number_index`], a keyed CMAC of the clear number.
#[derive(Clone)]
pub struct CardNumberCodec {
    cipher: Aes256Gcm,
    index_key: [u8; 16],
}

impl CardNumberCodec {
    pub fn new(key: &EncryptionKey) -> Result<Self> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let index_key = derive_index_key(key)?;
        Ok(Self { cipher, index_key })
    }

    /// Encrypts `plaintext`, passing `None` through untouched.
    pub fn encode(&self, plaintext: Option<&str>) -> Result<Option<String>> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| LedgerError::Codec(format!("Encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(hex::encode(out))
    }

    /// Decrypts a value produced by [`CardNumberCodec::encrypt`].
    pub fn decode(&self, ciphertext: &str) -> Result<String> {
        let bytes = hex::decode(ciphertext)
            .map_err(|e| LedgerError::Codec(format!("Invalid ciphertext encoding: {e}")))?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(LedgerError::Codec("Ciphertext too short".to_string()));
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| LedgerError::Codec("Ciphertext failed authentication".to_string()))?;

        String::from_utf8(plain)
            .map_err(|_| LedgerError::Codec("Decrypted number is not UTF-8".to_string()))
    }

    /// Deterministic, keyed digest of a clear card number.
    pub fn number_index(&self, plaintext: &str) -> Result<String> {
        let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(&self.index_key)
            .map_err(|e| LedgerError::Codec(format!("Invalid index key length: {e:?}")))?;
        mac.update(plaintext.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn derive_index_key(key: &EncryptionKey) -> Result<[u8; 16]> {
    let mut mac = <Cmac<Aes256> as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| LedgerError::Codec(format!("Invalid key length: {e:?}")))?;
    mac.update(INDEX_LABEL);
    let mut sub_key = [0u8; 16];
    sub_key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(sub_key)
}

/// Display form of a card number: only the last four characters survive.
pub fn mask(plaintext: &str) -> String {
    let chars: Vec<char> = plaintext.chars().collect();
    let start = chars.len().saturating_sub(4);
    let last4: String = chars[start..].iter().collect();
    format!("**** **** **** {last4}")
}
