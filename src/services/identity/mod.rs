pub mod resolver;
pub mod types;

pub use resolver::{CachingIdentityResolver, IdentityResolver, InMemoryIdentityResolver};
pub use types::{Identity, Role};
