/// Errors that can occur during account and key-store operations.
///
/// Every fallible operation returns one of these through its `Result`; the
/// owning [`crate::Account`] additionally latches the most recent failure
/// for callers that use the legacy check-then-read retrieval pattern.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Fewer random bytes were supplied than the operation consumes.
    #[error("not enough random: operation needs {needed} bytes, got {got}")]
    NotEnoughRandom {
        /// Bytes the operation consumes.
        needed: usize,
        /// Bytes the caller supplied.
        got: usize,
    },

    /// The caller-provided output buffer cannot hold the result.
    #[error("output buffer too small: need {needed} bytes, got {got}")]
    OutputBufferTooSmall {
        /// Bytes the result occupies.
        needed: usize,
        /// Bytes available in the buffer.
        got: usize,
    },

    /// Generating the requested batch would exceed the one-time key capacity.
    #[error("one-time key store is full")]
    MaxOneTimeKeys,

    /// No one-time key with this id exists in the store.
    #[error("unknown one-time key id: {0}")]
    UnknownOneTimeKey(u32),

    /// The pickle key does not authenticate the encrypted pickle.
    #[error("bad account key")]
    BadAccountKey,

    /// The pickle is truncated or structurally invalid.
    #[error("corrupt pickle")]
    CorruptPickle,

    /// The pickle carries a format version this build does not understand.
    #[error("unknown pickle version")]
    UnknownPickleVersion,
}
