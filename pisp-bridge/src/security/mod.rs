//! Secret handling for logs.
//!
//! Request signatures and bearer tokens travel in the `Authorization` header and
//! must never reach a log sink in clear. Account references in settled payments
//! are logged with only their last four characters.
//!
//! ```rust
//! use pisp_bridge::security::{redact_account_reference, redact_authorization};
//!
//! assert_eq!(redact_authorization("Bearer eyJhbGciOi"), "Bearer ********");
//! assert_eq!(redact_account_reference("DE89370400440532013000"), "******************3000");
//! ```

pub mod redact;

pub use redact::{MASK, redact_account_reference, redact_authorization, redact_headers};
