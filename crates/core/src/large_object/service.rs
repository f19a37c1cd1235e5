//! Batch coordinator for image persistence.

use std::sync::Arc;

use tracing::{error, info};

use crate::image::{Imager, Images};

use super::error::StoreError;
use super::protocol::{self, Fetched, Inserted};
use super::scope::TxScope;
use super::store::{InsertStatement, TransactionSource};

/// A single-image protocol step applied by the coordinator.
enum Operation<'a, I> {
    Insert(&'a InsertStatement),
    Read(&'a str),
    ReadWith(&'a (dyn Fn(&I) -> String + Sync)),
    DeleteLo,
}

/// What a step produced, applied to the entity once the batch commits.
enum Outcome {
    Inserted(Inserted),
    Fetched(Fetched),
    Unlinked,
}

impl<I: Imager> Operation<'_, I> {
    fn name(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert images",
            Self::Read(_) | Self::ReadWith(_) => "read images",
            Self::DeleteLo => "delete image large objects",
        }
    }

    async fn apply<T>(&self, tx: &T, image: &I) -> Result<Outcome, StoreError>
    where
        T: super::store::LargeObjectTx,
    {
        match self {
            Self::Insert(statement) => protocol::write_in_tx(tx, image, statement)
                .await
                .map(Outcome::Inserted),
            Self::Read(sql) => protocol::fetch_in_tx(tx, sql).await.map(Outcome::Fetched),
            Self::ReadWith(query_for) => protocol::fetch_in_tx(tx, &query_for(image))
                .await
                .map(Outcome::Fetched),
            Self::DeleteLo => protocol::delete_in_tx(tx, image)
                .await
                .map(|()| Outcome::Unlinked),
        }
    }
}

/// Applies the large-object protocol to images under one transaction per
/// call.
///
/// Batches are all-or-nothing: images are processed strictly in collection
/// order, the first failure rolls the whole transaction back and later
/// images are never attempted. Entities are only updated after a successful
/// commit, so a failed batch leaves every entity as it was.
pub struct ImageService<S: TransactionSource> {
    source: Arc<S>,
}

impl<S: TransactionSource> Clone for ImageService<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: TransactionSource> ImageService<S> {
    /// Create a new image service over a transaction source.
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Begins a scoped transaction for composing protocol steps with other
    /// statements.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub async fn begin(&self, operation: &'static str) -> Result<TxScope<S::Tx>, StoreError> {
        TxScope::begin(&*self.source, operation).await
    }

    /// Inserts one image in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns the first protocol, commit or begin error.
    pub async fn insert<I: Imager>(
        &self,
        image: &mut I,
        statement: &InsertStatement,
    ) -> Result<(), StoreError> {
        self.run(&Operation::Insert(statement), std::slice::from_mut(image))
            .await
    }

    /// Reads one image's content in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns the first protocol, commit or begin error.
    pub async fn read<I: Imager>(&self, image: &mut I, sql: &str) -> Result<(), StoreError> {
        self.run(&Operation::Read(sql), std::slice::from_mut(image))
            .await
    }

    /// Unlinks one image's large object in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns the first protocol, commit or begin error.
    pub async fn delete<I: Imager>(&self, image: &mut I) -> Result<(), StoreError> {
        self.run(&Operation::DeleteLo, std::slice::from_mut(image))
            .await
    }

    /// Inserts every image in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the first failing image's error; nothing is persisted.
    pub async fn insert_all<I: Imager>(
        &self,
        images: &mut Images<I>,
        statement: &InsertStatement,
    ) -> Result<(), StoreError> {
        self.run(&Operation::Insert(statement), images.as_mut_slice())
            .await
    }

    /// Reads every image with the same parameterless query in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns the first failing image's error; no entity is updated.
    pub async fn read_all<I: Imager>(
        &self,
        images: &mut Images<I>,
        sql: &str,
    ) -> Result<(), StoreError> {
        self.run(&Operation::Read(sql), images.as_mut_slice()).await
    }

    /// Reads every image with a query built per entity, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the first failing image's error; no entity is updated.
    pub async fn read_all_with<I, F>(
        &self,
        images: &mut Images<I>,
        query_for: F,
    ) -> Result<(), StoreError>
    where
        I: Imager + Sync,
        F: Fn(&I) -> String + Sync,
    {
        self.run(&Operation::ReadWith(&query_for), images.as_mut_slice())
            .await
    }

    /// Unlinks every image's large object in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the first failing image's error; no large object is removed.
    pub async fn delete_all<I: Imager>(&self, images: &mut Images<I>) -> Result<(), StoreError> {
        self.run(&Operation::DeleteLo, images.as_mut_slice()).await
    }

    async fn run<I: Imager>(
        &self,
        operation: &Operation<'_, I>,
        images: &mut [I],
    ) -> Result<(), StoreError> {
        let scope = self.begin(operation.name()).await?;

        let mut outcomes = Vec::with_capacity(images.len());
        for (position, image) in images.iter().enumerate() {
            match operation.apply(scope.tx(), image).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!(
                        operation = operation.name(),
                        position,
                        id = image.id(),
                        error = %err,
                        "Image operation failed"
                    );
                    return Err(scope.abort(err).await);
                }
            }
        }

        scope.commit().await?;

        for (image, outcome) in images.iter_mut().zip(outcomes) {
            match outcome {
                Outcome::Inserted(inserted) => inserted.apply_to(image),
                Outcome::Fetched(fetched) => fetched.apply_to(image),
                Outcome::Unlinked => {}
            }
        }

        info!(
            operation = operation.name(),
            count = images.len(),
            "Image transaction committed"
        );
        Ok(())
    }
}
