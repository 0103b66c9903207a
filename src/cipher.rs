// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Deterministic Field Cipher
//!
//! Identifying fields are encrypted with AES applied block by block (ECB,
//! no IV or nonce) over PKCS#7-padded UTF-8 bytes, and rendered as
//! lowercase hex.
//!
//! ## Determinism
//!
//! `encrypt` is a pure function of `(plaintext, key)`. The same plaintext
//! under the same key always yields byte-identical ciphertext, which is
//! what makes exact-match lookup possible: a caller's plaintext is
//! encrypted and compared for equality against the stored value.
//!
//! ## Limitation
//!
//! Equal plaintexts produce equal ciphertexts, so anyone who can read the
//! stored documents learns which records share a username or phone (and
//! repeated 16-byte blocks within a value). This is the accepted price of
//! searchability. There is a single cipher mode in this crate and every
//! write and query path goes through it; mixing in a randomized mode would
//! make stored values unreachable by lookup.
//!
//! ## Key Sizes
//!
//! | Key bytes | Cipher |
//! |-----------|---------|
//! | 16 | AES-128 |
//! | 24 | AES-192 |
//! | 32 | AES-256 |

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Errors from the field cipher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Key is not 16, 24 or 32 bytes long.
    #[error("invalid key length: expected 16, 24 or 32 bytes, got {0}")]
    InvalidKey(usize),

    /// Ciphertext failed a structural check during decryption.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),
}

pub type CipherResult<T> = Result<T, CipherError>;

#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(key: &[u8]) -> CipherResult<Self> {
        let invalid = |_| CipherError::InvalidKey(key.len());
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            len => Err(CipherError::InvalidKey(len)),
        }
    }

    /// Encrypt `buf` in place. `buf.len()` must be a multiple of [`BLOCK_SIZE`].
    fn encrypt_blocks(&self, buf: &mut [u8]) {
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = Block::from_mut_slice(chunk);
            match self {
                Self::Aes128(c) => c.encrypt_block(block),
                Self::Aes192(c) => c.encrypt_block(block),
                Self::Aes256(c) => c.encrypt_block(block),
            }
        }
    }

    /// Decrypt `buf` in place. `buf.len()` must be a multiple of [`BLOCK_SIZE`].
    fn decrypt_blocks(&self, buf: &mut [u8]) {
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = Block::from_mut_slice(chunk);
            match self {
                Self::Aes128(c) => c.decrypt_block(block),
                Self::Aes192(c) => c.decrypt_block(block),
                Self::Aes256(c) => c.decrypt_block(block),
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Aes128(_) => "AES-128",
            Self::Aes192(_) => "AES-192",
            Self::Aes256(_) => "AES-256",
        }
    }
}

/// Keyed deterministic cipher for identifying fields.
///
/// The key is validated once at construction; the expanded key schedule is
/// zeroized on drop.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: BlockCipher,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("algorithm", &self.cipher.name())
            .finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// Build a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// [`CipherError::InvalidKey`] if the key is not 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> CipherResult<Self> {
        Ok(Self {
            cipher: BlockCipher::new(key)?,
        })
    }

    /// Name of the underlying block cipher (e.g. `AES-256`).
    pub fn algorithm(&self) -> &'static str {
        self.cipher.name()
    }

    /// Encrypt a plaintext field value into its hex ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut buf = pad(plaintext.as_bytes());
        self.cipher.encrypt_blocks(&mut buf);
        hex::encode(buf)
    }

    /// Decrypt a hex ciphertext produced by [`FieldCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// [`CipherError::MalformedCiphertext`] if the text is not hex, its
    /// decoded length is not a positive multiple of [`BLOCK_SIZE`], the
    /// padding is invalid, or the recovered bytes are not UTF-8.
    pub fn decrypt(&self, ciphertext: &str) -> CipherResult<String> {
        let mut buf = hex::decode(ciphertext)
            .map_err(|e| CipherError::MalformedCiphertext(format!("invalid hex: {e}")))?;

        if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::MalformedCiphertext(format!(
                "length {} is not a positive multiple of {BLOCK_SIZE}",
                buf.len()
            )));
        }

        self.cipher.decrypt_blocks(&mut buf);
        let len = unpadded_len(&buf)?;
        buf.truncate(len);

        String::from_utf8(buf).map_err(|_| {
            CipherError::MalformedCiphertext("plaintext is not valid UTF-8".to_string())
        })
    }
}

/// Encrypt `plaintext` under `key`.
///
/// Convenience form of [`FieldCipher::encrypt`] that validates the key on
/// every call. Prefer holding a [`FieldCipher`].
pub fn encrypt(plaintext: &str, key: &[u8]) -> CipherResult<String> {
    Ok(FieldCipher::new(key)?.encrypt(plaintext))
}

/// Decrypt `ciphertext` under `key`.
pub fn decrypt(ciphertext: &str, key: &[u8]) -> CipherResult<String> {
    FieldCipher::new(key)?.decrypt(ciphertext)
}

/// PKCS#7: append `n` bytes of value `n`, `n` in `1..=BLOCK_SIZE`.
fn pad(data: &[u8]) -> Vec<u8> {
    let padding = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut buf = Vec::with_capacity(data.len() + padding);
    buf.extend_from_slice(data);
    buf.resize(data.len() + padding, padding as u8);
    buf
}

/// Length of `data` once PKCS#7 padding is stripped.
fn unpadded_len(data: &[u8]) -> CipherResult<usize> {
    let Some(&last) = data.last() else {
        return Err(CipherError::MalformedCiphertext("empty block".to_string()));
    };

    let padding = last as usize;
    if padding == 0 || padding > BLOCK_SIZE {
        return Err(CipherError::MalformedCiphertext(format!(
            "padding length {padding} outside 1..={BLOCK_SIZE}"
        )));
    }

    let start = data.len() - padding;
    if data[start..].iter().any(|&b| b != last) {
        return Err(CipherError::MalformedCiphertext(
            "inconsistent padding bytes".to_string(),
        ));
    }

    Ok(start)
}
