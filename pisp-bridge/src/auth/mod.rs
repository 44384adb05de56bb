//! Bearer-token acquisition for the partner API families.

pub mod token;

pub use token::{ApiFamily, ClientIdentity, Token, TokenAuthority, imf_fixdate};
