mod types;
pub use types::*;

mod identity_key;
pub use identity_key::IdentityKey;

mod one_time_key;
pub use one_time_key::{MAX_ONE_TIME_KEYS, OneTimeKey};

mod error;
pub use error::Error;

mod account;
pub use account::Account;

mod pickle;
