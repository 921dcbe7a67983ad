use crate::identity_key::IDENTITY_SEED_LENGTH;
use crate::one_time_key::{ONE_TIME_KEY_SEED_LENGTH, OneTimeKeyStore};
use crate::{Error, IdentityKey, MAX_ONE_TIME_KEYS, OneTimeKey};
use base64::Engine;
use ed25519_dalek::{SIGNATURE_LENGTH, Signature};
use std::cell::Cell;
use std::fmt::Write as _;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A long-lived messaging identity and its pool of ephemeral keys.
///
/// The account owns exactly one [`IdentityKey`], generated at construction
/// and immutable thereafter, plus a bounded ordered pool of one-time keys
/// that session-establishment code publishes, claims, and removes. All
/// entropy is injected by the caller; no operation reaches for a platform
/// RNG, so every generation is a deterministic function of its inputs.
///
/// An account is not internally synchronized. Callers that share one across
/// threads must serialize access externally; the error latch is a [`Cell`],
/// so the type is `!Sync`.
pub struct Account {
    pub(crate) identity_key: IdentityKey,
    pub(crate) one_time_keys: OneTimeKeyStore,
    last_error: Cell<Option<Error>>,
}

impl Account {
    /// Random bytes [`Account::new`] consumes.
    pub fn new_account_random_length() -> usize {
        IDENTITY_SEED_LENGTH
    }

    /// Creates an account by deriving its identity key from caller-supplied
    /// entropy.
    ///
    /// Exactly [`Account::new_account_random_length`] bytes are consumed
    /// from the front of `random`; equal seeds derive equal identities.
    /// Fails with [`Error::NotEnoughRandom`] without constructing anything
    /// if fewer bytes are supplied.
    pub fn new(random: &[u8]) -> Result<Self, Error> {
        let identity_key = IdentityKey::from_random(random)?;

        Ok(Self {
            identity_key,
            one_time_keys: OneTimeKeyStore::new(),
            last_error: Cell::new(None),
        })
    }

    /// Rebuilds an account from unpickled parts.
    pub(crate) fn from_parts(identity_key: IdentityKey, one_time_keys: OneTimeKeyStore) -> Self {
        Self {
            identity_key,
            one_time_keys,
            last_error: Cell::new(None),
        }
    }

    /// Returns this account's identity key.
    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    /// Encodes the public identity keys for distribution.
    ///
    /// The result is a self-describing JSON object mapping each algorithm
    /// name to the standard-base64 public key:
    /// `{"curve25519":"...","ed25519":"..."}`.
    pub fn identity_keys(&self) -> String {
        let engine = base64::engine::general_purpose::STANDARD;

        format!(
            "{{\"curve25519\":\"{}\",\"ed25519\":\"{}\"}}",
            self.identity_key.dh_key_public().to_base64(),
            engine.encode(self.identity_key.signing_key_public().as_bytes()),
        )
    }

    /// Maximum number of one-time keys the account can hold at once.
    pub fn max_number_of_one_time_keys() -> usize {
        MAX_ONE_TIME_KEYS
    }

    /// Random bytes [`Account::generate_one_time_keys`] consumes for a batch
    /// of `count` keys.
    pub fn one_time_keys_random_length(count: usize) -> usize {
        count * ONE_TIME_KEY_SEED_LENGTH
    }

    /// Generates `count` fresh one-time keys from caller-supplied entropy,
    /// appending them to the unpublished tail of the pool.
    ///
    /// Each new key is assigned the next unused sequence id; ids are never
    /// reused within one account, even across removals. The batch is
    /// all-or-nothing: [`Error::MaxOneTimeKeys`] if it would push the pool
    /// past capacity, [`Error::NotEnoughRandom`] on an entropy shortfall,
    /// and in both cases the pool is left untouched.
    pub fn generate_one_time_keys(&mut self, count: usize, random: &[u8]) -> Result<usize, Error> {
        let result = self.one_time_keys.generate(count, random);
        self.track(result)
    }

    /// Looks up a one-time key by id.
    ///
    /// Absence is not an error and does not disturb [`Account::last_error`];
    /// callers that require presence decide for themselves what `None`
    /// means.
    pub fn lookup_key(&self, id: u32) -> Option<&OneTimeKey> {
        self.one_time_keys.get(id)
    }

    /// Removes the one-time key a peer session consumed, returning the index
    /// it occupied.
    ///
    /// The relative order of the remaining keys is preserved and the removed
    /// key material is zeroized. Fails with [`Error::UnknownOneTimeKey`] if
    /// no key has this id, which is how "at most one session may claim a
    /// given one-time key" is enforced: the second claimant finds nothing to
    /// remove.
    pub fn remove_key(&mut self, id: u32) -> Result<usize, Error> {
        let result = self.one_time_keys.remove(id);
        self.track(result)
    }

    /// Encodes the public halves of the still-unpublished one-time keys.
    ///
    /// The result maps each key's base64 id to its standard-base64 public
    /// key, in insertion order:
    /// `{"curve25519":{"AAAAAQ==":"...","AAAAAg==":"..."}}`.
    pub fn one_time_keys(&self) -> String {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut encoded = String::from("{\"curve25519\":{");

        let mut first = true;
        for key in self.one_time_keys.unpublished() {
            if !first {
                encoded.push(',');
            }
            first = false;

            let _ = write!(
                encoded,
                "\"{}\":\"{}\"",
                engine.encode(key.id().to_be_bytes()),
                key.public_key().to_base64(),
            );
        }
        encoded.push_str("}}");

        encoded
    }

    /// Marks every one-time key currently in the pool as published.
    ///
    /// Published keys disappear from [`Account::one_time_keys`] exports but
    /// stay valid for [`Account::lookup_key`] and [`Account::remove_key`].
    /// Idempotent.
    pub fn mark_keys_as_published(&mut self) {
        self.one_time_keys.mark_as_published();
    }

    /// Bytes a signature produced by [`Account::sign`] occupies.
    pub fn signature_length() -> usize {
        SIGNATURE_LENGTH
    }

    /// Signs a message with the identity key's Ed25519 half.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.identity_key.sign(message)
    }

    /// Buffer-oriented form of [`Account::sign`]: writes the signature into
    /// `output` and returns the bytes written.
    ///
    /// Fails with [`Error::OutputBufferTooSmall`] if `output` is shorter
    /// than [`Account::signature_length`].
    pub fn sign_into(&self, message: &[u8], output: &mut [u8]) -> Result<usize, Error> {
        let needed = Self::signature_length();
        if output.len() < needed {
            return self.track(Err(Error::OutputBufferTooSmall {
                needed,
                got: output.len(),
            }));
        }

        let signature = self.identity_key.sign(message);
        output[..needed].copy_from_slice(&signature.to_bytes());

        Ok(needed)
    }

    /// Returns the most recent failure latched on this account.
    ///
    /// The latch is overwritten by every failing call and left untouched by
    /// successful ones, so it should be read promptly after a failure is
    /// detected.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error.get()
    }

    /// Latches failures for the legacy check-then-read retrieval pattern.
    pub(crate) fn track<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &result {
            self.last_error.set(Some(*err));
        }

        result
    }
}

impl Zeroize for Account {
    fn zeroize(&mut self) {
        self.identity_key.zeroize();
        self.one_time_keys.zeroize();
    }
}

impl ZeroizeOnDrop for Account {}
