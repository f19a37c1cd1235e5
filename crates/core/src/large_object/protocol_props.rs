//! Property-based tests for the large-object protocol.
//!
//! Round-trip: any non-empty content inserted and read back by its assigned
//! oid is byte-identical, and its recorded size equals its length.

use std::sync::Arc;

use proptest::prelude::*;

use crate::image::{Image, Images};

use super::mock::{MemoryStore, INSERT_SQL};
use super::service::ImageService;
use super::StoreError;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Strategy for non-empty image content.
fn content() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..4096)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// *For any* non-empty content, insert then read yields identical bytes.
    #[test]
    fn prop_insert_read_round_trip(raw in content()) {
        let store = MemoryStore::default();
        let service = ImageService::new(Arc::new(store));

        let (stored, copy) = runtime().block_on(async {
            let mut stored = Image::new(raw.clone());
            service.insert(&mut stored, &INSERT_SQL.into()).await?;

            let mut copy = Image::stored(stored.id, stored.oid.unwrap(), 0);
            service.read(&mut copy, &MemoryStore::locate_sql(stored.id)).await?;
            Ok::<_, StoreError>((stored, copy))
        }).unwrap();

        prop_assert_eq!(&copy.raw, &raw);
        prop_assert_eq!(usize::try_from(stored.size).unwrap(), raw.len());
        prop_assert_eq!(copy.size, stored.size);
    }

    /// *For any* batch with one failing insert at position K, no row
    /// survives and no entity gains an identity.
    #[test]
    fn prop_batch_atomicity(
        raws in prop::collection::vec(content(), 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let failing = pick.index(raws.len()) + 1;
        let store = MemoryStore::default();
        store.fail_insert_row_on_call(failing);
        let service = ImageService::new(Arc::new(store.clone()));

        let mut images: Images = raws.iter().cloned().map(Image::new).collect();
        let result = runtime().block_on(service.insert_all(&mut images, &INSERT_SQL.into()));

        prop_assert!(result.is_err());
        prop_assert_eq!(store.row_count(), 0);
        prop_assert!(images.iter().all(|i| i.id == 0 && i.name.is_empty() && i.oid.is_none()));
        prop_assert_eq!(store.probe().insert_rows, failing);
    }
}
