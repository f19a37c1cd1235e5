//! Image entities.
//!
//! Anything implementing [`Imager`] can be persisted by the large-object
//! protocol; [`Image`] is the stock implementation and [`Images`] the ordered
//! collection batch operations work on.

mod types;

pub use types::{Image, Imager, Images, Oid};
