pub mod authenticator;
pub mod clock;
pub mod error;
pub mod factory;
pub mod policy;
pub mod token_codec;

#[cfg(test)]
pub(crate) mod test_keys;

pub use authenticator::{Admission, Authenticator, CallState};
pub use error::AuthError;
pub use factory::build_authenticator;
pub use token_codec::{Claims, TokenCodec};
