pub mod authority;

pub use authority::{InterNodeClaims, TokenAuthority, TokenError, DEFAULT_TOKEN_TTL};
