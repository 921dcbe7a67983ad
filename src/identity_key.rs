use crate::Error;
use crate::{X25519PublicKey, X25519Secret};
use ed25519_dalek::Signer;
use ed25519_dalek::{SecretKey, SigningKey, ed25519};
use x25519_dalek::SharedSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Random bytes consumed when deriving a fresh identity key.
pub(crate) const IDENTITY_SEED_LENGTH: usize = 32;

/// Bytes occupied by a pickled identity key: both private scalars followed
/// by both public halves.
pub(crate) const IDENTITY_KEY_PICKLE_LENGTH: usize = 128;

/// Long-term identity key pair that combines signing and key agreement
/// capabilities.
///
/// An `IdentityKey` contains both an Ed25519 signing key for authentication
/// and an X25519 key for Diffie-Hellman key agreement, derived from the same
/// caller-supplied seed so a single long-lived pair serves both roles. It is
/// generated exactly once per account and never replaced.
pub struct IdentityKey {
    signing_key: Box<SigningKey>,
    dh_key: X25519Secret,
}

impl IdentityKey {
    /// Derives both halves of the identity from caller-supplied entropy.
    ///
    /// Consumes the first [`IDENTITY_SEED_LENGTH`] bytes of `random`; equal
    /// seeds derive equal key pairs. Fails with [`Error::NotEnoughRandom`]
    /// if fewer bytes are supplied.
    pub(crate) fn from_random(random: &[u8]) -> Result<Self, Error> {
        if random.len() < IDENTITY_SEED_LENGTH {
            return Err(Error::NotEnoughRandom {
                needed: IDENTITY_SEED_LENGTH,
                got: random.len(),
            });
        }

        let mut seed = Box::new([0u8; 32]);
        seed.copy_from_slice(&random[..IDENTITY_SEED_LENGTH]);

        let signing_key = Box::new(SigningKey::from(SecretKey::from(*seed)));
        let dh_key = X25519Secret::from(seed);

        Ok(Self {
            signing_key,
            dh_key,
        })
    }

    /// Signs a message using the Ed25519 signing key.
    pub fn sign(&self, message: &[u8]) -> ed25519_dalek::Signature {
        self.signing_key.sign(message)
    }

    /// Verifies a signature using this identity's public key.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &ed25519::Signature,
    ) -> Result<(), ed25519::Error> {
        let verifying_key = self.signing_key.verifying_key();
        verifying_key.verify_strict(message, signature)
    }

    /// Returns the public Ed25519 signing key for this identity.
    pub fn signing_key_public(&self) -> ed25519_dalek::VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the public X25519 key peers use for key agreement.
    pub fn dh_key_public(&self) -> X25519PublicKey {
        self.dh_key.public_key()
    }

    /// Performs Diffie-Hellman key agreement with another party's public key.
    pub fn dh(&self, public_key: &X25519PublicKey) -> SharedSecret {
        self.dh_key.dh(public_key)
    }

    /// Serializes the identity key to its pickled form.
    ///
    /// The layout is the Ed25519 private key, the X25519 private key, then
    /// the two public halves in the same order.
    pub(crate) fn to_bytes(&self) -> [u8; IDENTITY_KEY_PICKLE_LENGTH] {
        let mut bytes = [0u8; IDENTITY_KEY_PICKLE_LENGTH];
        bytes[0..32].copy_from_slice(self.signing_key.as_bytes().as_slice());
        bytes[32..64].copy_from_slice(self.dh_key.as_bytes());
        bytes[64..96].copy_from_slice(self.signing_key.verifying_key().as_bytes());
        bytes[96..128].copy_from_slice(self.dh_key.public_key().as_bytes());

        bytes
    }

    /// Deserializes an identity key from its pickled form.
    ///
    /// The stored public halves must match the publics re-derived from the
    /// private scalars; a mismatch means the pickle was damaged.
    pub(crate) fn from_bytes(bytes: &[u8; IDENTITY_KEY_PICKLE_LENGTH]) -> Result<Self, Error> {
        let mut private_sk_bytes = Box::new([0u8; 32]);
        private_sk_bytes.copy_from_slice(&bytes[0..32]);
        let signing_key = Box::new(SigningKey::from_bytes(&private_sk_bytes));
        private_sk_bytes.zeroize();

        let mut private_dh_bytes = Box::new([0u8; 32]);
        private_dh_bytes.copy_from_slice(&bytes[32..64]);
        let dh_key = X25519Secret::from(private_dh_bytes);

        if signing_key.verifying_key().as_bytes() != &bytes[64..96]
            || dh_key.public_key().as_bytes() != &bytes[96..128]
        {
            return Err(Error::CorruptPickle);
        }

        Ok(Self {
            signing_key,
            dh_key,
        })
    }
}

impl Zeroize for IdentityKey {
    fn zeroize(&mut self) {
        // `SigningKey` only exposes scrub-on-drop (`ZeroizeOnDrop`), not
        // `Zeroize`; overwriting the boxed value drops the previous secret in
        // place, which scrubs it.
        *self.signing_key = SigningKey::from_bytes(&[0u8; 32]);
        self.dh_key.zeroize();
    }
}

impl ZeroizeOnDrop for IdentityKey {}
