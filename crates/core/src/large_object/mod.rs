//! Transactional large-object persistence.
//!
//! This module provides:
//! - The store traits a backing database implements ([`TransactionSource`], [`LargeObjectTx`])
//! - The single-image protocol steps run inside an open transaction
//! - [`TxScope`], which ends every transaction in exactly one commit or rollback
//! - [`ImageService`], the batch coordinator

mod error;
pub mod protocol;
mod scope;
mod service;
mod store;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod protocol_props;

pub use error::StoreError;
pub use scope::TxScope;
pub use service::ImageService;
pub use store::{
    Descriptor, InsertStatement, LargeObjectTx, Location, NewRow, OpenMode, StoredRow,
    TransactionSource,
};
