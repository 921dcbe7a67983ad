//! Versioned binary serialization ("pickle") of account state.
//!
//! The raw pickle is a fixed-layout, append-only encoding whose exact size
//! is computable before encoding. The decoder streams over the input with a
//! bounds-checked cursor and never reads past the supplied slice. The
//! encrypted form wraps the raw bytes in AES-256-GCM-SIV under a key and
//! nonce derived deterministically from the caller's key bytes, keeping the
//! core free of any internal entropy source; GCM-SIV tolerates the reused
//! nonce.

use aes_gcm_siv::aead::Aead;
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use base64::Engine;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::identity_key::IDENTITY_KEY_PICKLE_LENGTH;
use crate::one_time_key::{ONE_TIME_KEY_PICKLE_LENGTH, OneTimeKeyStore};
use crate::{Account, Error, IdentityKey, MAX_ONE_TIME_KEYS, OneTimeKey};

/// Format tag written at the front of every pickle.
const PICKLE_VERSION: u32 = 1;

/// Domain separator for the encrypted-pickle key derivation.
const PICKLE_KDF_INFO: &[u8] = b"acolyte-pickle-v1";

/// Bounds-checked streaming reader over a pickle buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Takes the next `len` bytes, failing rather than reading past the end.
    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(len).ok_or(Error::CorruptPickle)?;
        if end > self.buf.len() {
            return Err(Error::CorruptPickle);
        }

        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(bytes))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.buf.len()
    }
}

/// Derives the AEAD cipher and nonce for an encrypted pickle from the
/// caller's key bytes.
fn pickle_cipher(key: &[u8]) -> Result<(Aes256GcmSiv, [u8; 12]), Error> {
    let hkdf = Hkdf::<Sha256>::new(None, key);

    let mut derived_material = [0u8; 44];
    hkdf.expand(PICKLE_KDF_INFO, &mut derived_material)
        .map_err(|_| Error::BadAccountKey)?;

    let cipher_key = aes_gcm_siv::Key::<Aes256GcmSiv>::from_slice(&derived_material[0..32]);
    let cipher = Aes256GcmSiv::new(cipher_key);

    let mut nonce_bytes = [0u8; 12];
    nonce_bytes.copy_from_slice(&derived_material[32..44]);
    derived_material.zeroize();

    Ok((cipher, nonce_bytes))
}

impl Account {
    /// Exact size in bytes of this account's raw pickle, computable without
    /// encoding.
    pub fn pickle_length(&self) -> usize {
        4 + IDENTITY_KEY_PICKLE_LENGTH
            + 4
            + 4
            + self.one_time_keys.len() * ONE_TIME_KEY_PICKLE_LENGTH
    }

    /// Serializes the full account state to its raw (plaintext) pickle.
    ///
    /// The layout is sequential and versioned: format tag, identity key
    /// pair, the next-id watermark, then every one-time key in insertion
    /// order with its id and publish flag. The bytes contain private key
    /// material and are expected to be wrapped by an authenticated
    /// encryption step, such as [`Account::pickle`], before leaving memory.
    pub fn to_pickle(&self) -> Vec<u8> {
        let mut pickled = Vec::with_capacity(self.pickle_length());

        pickled.extend_from_slice(&PICKLE_VERSION.to_be_bytes());
        pickled.extend_from_slice(&self.identity_key.to_bytes());
        pickled.extend_from_slice(&self.one_time_keys.next_id().to_be_bytes());
        pickled.extend_from_slice(&(self.one_time_keys.len() as u32).to_be_bytes());
        for key in self.one_time_keys.iter() {
            pickled.extend_from_slice(&key.to_bytes());
        }

        pickled
    }

    /// Writes the raw pickle into a caller-supplied buffer, returning the
    /// bytes written.
    ///
    /// Fails with [`Error::OutputBufferTooSmall`] if `output` is shorter
    /// than [`Account::pickle_length`].
    pub fn pickle_into(&self, output: &mut [u8]) -> Result<usize, Error> {
        let needed = self.pickle_length();
        if output.len() < needed {
            return self.track(Err(Error::OutputBufferTooSmall {
                needed,
                got: output.len(),
            }));
        }

        let mut pickled = self.to_pickle();
        output[..needed].copy_from_slice(&pickled);
        pickled.zeroize();

        Ok(needed)
    }

    /// Restores an account from a raw pickle produced by
    /// [`Account::to_pickle`].
    ///
    /// The decode validates every step against the end of `bytes` and never
    /// reads out of bounds. Truncated or structurally invalid input fails
    /// with [`Error::CorruptPickle`]; a format tag other than the supported
    /// version fails with [`Error::UnknownPickleVersion`]. A freshly
    /// constructed account is returned only when the whole buffer decodes,
    /// so a failure leaves no partially-restored state anywhere.
    pub fn unpickle(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        let version = reader.u32()?;
        if version != PICKLE_VERSION {
            return Err(Error::UnknownPickleVersion);
        }

        let mut identity_bytes = reader.array::<IDENTITY_KEY_PICKLE_LENGTH>()?;
        let identity_key = IdentityKey::from_bytes(&identity_bytes);
        identity_bytes.zeroize();
        let identity_key = identity_key?;

        let next_id = reader.u32()?;
        let count = reader.u32()? as usize;
        if count > MAX_ONE_TIME_KEYS {
            return Err(Error::CorruptPickle);
        }

        let mut keys: Vec<OneTimeKey> = Vec::with_capacity(count);
        for _ in 0..count {
            let mut key_bytes = reader.array::<ONE_TIME_KEY_PICKLE_LENGTH>()?;
            let key = OneTimeKey::from_bytes(&key_bytes);
            key_bytes.zeroize();
            let key = key?;

            // Ids are assigned monotonically, so a valid pickle lists them
            // in strictly increasing order below the next-id watermark.
            if key.id() >= next_id || keys.last().is_some_and(|prev| key.id() <= prev.id()) {
                return Err(Error::CorruptPickle);
            }
            keys.push(key);
        }

        if !reader.is_exhausted() {
            return Err(Error::CorruptPickle);
        }

        Ok(Self::from_parts(
            identity_key,
            OneTimeKeyStore::from_parts(keys, next_id),
        ))
    }

    /// Serializes the account and encrypts it under `key` for storage.
    ///
    /// The raw pickle is sealed with AES-256-GCM-SIV using a cipher key and
    /// nonce derived from `key` via HKDF-SHA256, then base64-armored. The
    /// intermediate plaintext is zeroized before returning.
    pub fn pickle(&self, key: &[u8]) -> Result<String, Error> {
        let result = self.pickle_encrypted(key);
        self.track(result)
    }

    fn pickle_encrypted(&self, key: &[u8]) -> Result<String, Error> {
        let (cipher, nonce_bytes) = pickle_cipher(key)?;

        let mut plaintext = self.to_pickle();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| Error::BadAccountKey);
        plaintext.zeroize();

        Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext?))
    }

    /// Decrypts and restores an account sealed by [`Account::pickle`].
    ///
    /// Fails with [`Error::CorruptPickle`] on damaged base64 armor and with
    /// [`Error::BadAccountKey`] when the authentication tag rejects the
    /// supplied key (wrong key, or a tampered blob).
    pub fn from_pickle(pickled: &str, key: &[u8]) -> Result<Self, Error> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(pickled)
            .map_err(|_| Error::CorruptPickle)?;

        let (cipher, nonce_bytes) = pickle_cipher(key)?;
        let mut plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| Error::BadAccountKey)?;

        let account = Self::unpickle(&plaintext);
        plaintext.zeroize();

        account
    }
}
