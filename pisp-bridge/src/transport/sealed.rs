//! Sealed trait marker for Transport implementations.
//!
//! Keeps `Transport` implementable only inside this crate, so every
//! implementation goes through the retrying wrapper and header validation.

pub(crate) mod private {
    /// Sealed trait marker.
    pub trait Sealed {}
}
