use crate::Error;
use crate::{X25519PublicKey, X25519Secret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Upper bound on how many one-time keys an account holds at once.
pub const MAX_ONE_TIME_KEYS: usize = 100;

/// Random bytes consumed per generated one-time key.
pub(crate) const ONE_TIME_KEY_SEED_LENGTH: usize = 32;

/// Bytes occupied by a pickled one-time key: id, published flag, private
/// scalar, public point.
pub(crate) const ONE_TIME_KEY_PICKLE_LENGTH: usize = 69;

/// An ephemeral X25519 key pair handed out for a single session
/// establishment.
///
/// A key becomes `published` once its public half has been exported for
/// distribution. Published keys are excluded from later exports but remain
/// available for lookup and removal until the session that claimed them
/// consumes the key.
#[derive(Clone)]
pub struct OneTimeKey {
    id: u32,
    key: X25519Secret,
    published: bool,
}

impl OneTimeKey {
    /// Creates a new unpublished key with the given id from one seed's worth
    /// of caller entropy.
    pub(crate) fn new(id: u32, seed: Box<[u8; 32]>) -> Self {
        Self {
            id,
            key: X25519Secret::from(seed),
            published: false,
        }
    }

    /// Returns the unique identifier for this key.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the public component of this key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.key.public_key()
    }

    /// Checks whether this key has already been handed out for distribution.
    pub fn is_published(&self) -> bool {
        self.published
    }

    pub(crate) fn mark_as_published(&mut self) {
        self.published = true;
    }

    /// Serializes the key to its pickled form.
    ///
    /// The format is:
    /// - 4 bytes: id (big-endian u32)
    /// - 1 byte: published flag (0 = unpublished, 1 = published)
    /// - 32 bytes: X25519 private key
    /// - 32 bytes: X25519 public key
    pub(crate) fn to_bytes(&self) -> [u8; ONE_TIME_KEY_PICKLE_LENGTH] {
        let mut result = [0u8; ONE_TIME_KEY_PICKLE_LENGTH];

        result[0..4].copy_from_slice(&self.id.to_be_bytes());
        result[4] = u8::from(self.published);
        result[5..37].copy_from_slice(self.key.as_bytes());
        result[37..69].copy_from_slice(self.key.public_key().as_bytes());

        result
    }

    /// Deserializes a key from its pickled form, rejecting entries whose
    /// stored public point does not match the private scalar.
    pub(crate) fn from_bytes(bytes: &[u8; ONE_TIME_KEY_PICKLE_LENGTH]) -> Result<Self, Error> {
        let mut id_bytes = [0u8; 4];
        id_bytes.copy_from_slice(&bytes[0..4]);
        let id = u32::from_be_bytes(id_bytes);
        let published = bytes[4] != 0;

        let mut key_bytes = Box::new([0u8; 32]);
        key_bytes.copy_from_slice(&bytes[5..37]);
        let key = X25519Secret::from(key_bytes);

        if key.public_key().as_bytes() != &bytes[37..69] {
            return Err(Error::CorruptPickle);
        }

        Ok(Self {
            id,
            key,
            published,
        })
    }
}

impl Zeroize for OneTimeKey {
    fn zeroize(&mut self) {
        self.key.zeroize();
        self.id = 0;
        self.published = false;
    }
}

impl ZeroizeOnDrop for OneTimeKey {}

/// Bounded, insertion-ordered storage for one-time keys.
///
/// Ids are assigned from a monotonically increasing counter scoped to the
/// owning account and are never reused, even after removal.
pub(crate) struct OneTimeKeyStore {
    keys: Vec<OneTimeKey>,
    next_id: u32,
}

impl OneTimeKeyStore {
    pub(crate) fn new() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_ONE_TIME_KEYS),
            next_id: 1,
        }
    }

    /// Rebuilds a store from unpickled parts.
    pub(crate) fn from_parts(keys: Vec<OneTimeKey>, next_id: u32) -> Self {
        Self { keys, next_id }
    }

    /// Appends `count` fresh keys to the unpublished tail.
    ///
    /// Each key consumes [`ONE_TIME_KEY_SEED_LENGTH`] bytes of `random`.
    /// The batch is all-or-nothing: a capacity or entropy shortfall leaves
    /// the store untouched.
    pub(crate) fn generate(&mut self, count: usize, random: &[u8]) -> Result<usize, Error> {
        if count > MAX_ONE_TIME_KEYS - self.keys.len() {
            return Err(Error::MaxOneTimeKeys);
        }

        let needed = count * ONE_TIME_KEY_SEED_LENGTH;
        if random.len() < needed {
            return Err(Error::NotEnoughRandom {
                needed,
                got: random.len(),
            });
        }

        for chunk in random[..needed].chunks_exact(ONE_TIME_KEY_SEED_LENGTH) {
            let mut seed = Box::new([0u8; 32]);
            seed.copy_from_slice(chunk);

            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            self.keys.push(OneTimeKey::new(id, seed));
        }

        Ok(count)
    }

    pub(crate) fn get(&self, id: u32) -> Option<&OneTimeKey> {
        self.keys.iter().find(|key| key.id() == id)
    }

    /// Removes the key with the given id, preserving the relative order of
    /// the remaining entries, and returns the index it occupied. The removed
    /// key material is zeroized on drop.
    pub(crate) fn remove(&mut self, id: u32) -> Result<usize, Error> {
        match self.keys.iter().position(|key| key.id() == id) {
            Some(index) => {
                self.keys.remove(index);
                Ok(index)
            }
            None => Err(Error::UnknownOneTimeKey(id)),
        }
    }

    /// Marks every key currently in the store as published. Idempotent.
    pub(crate) fn mark_as_published(&mut self) {
        for key in &mut self.keys {
            key.mark_as_published();
        }
    }

    pub(crate) fn unpublished(&self) -> impl Iterator<Item = &OneTimeKey> {
        self.keys.iter().filter(|key| !key.is_published())
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, OneTimeKey> {
        self.keys.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }
}

impl Zeroize for OneTimeKeyStore {
    fn zeroize(&mut self) {
        for key in self.keys.iter_mut() {
            key.zeroize();
        }
        self.keys.clear();
        self.next_id = 0;
    }
}

impl ZeroizeOnDrop for OneTimeKeyStore {}
