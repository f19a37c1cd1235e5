//! In-memory transactional store for tests.
//!
//! Each transaction works on a private copy of the committed state; commit
//! publishes the copy, rollback or drop discards it. Failures can be
//! scheduled and every call is counted in a [`Probe`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::image::Oid;

use super::error::StoreError;
use super::store::{
    Descriptor, InsertStatement, LargeObjectTx, Location, NewRow, OpenMode, StoredRow,
    TransactionSource,
};

pub(crate) const INSERT_SQL: &str =
    "INSERT INTO images (raster, size) VALUES ($1, $2) RETURNING id, name";

const FIRST_OID: u32 = 16_384;

#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub oid: Oid,
    pub size: i32,
    pub name: String,
    pub file_type: String,
    pub sort_index: i32,
}

#[derive(Debug, Clone, Default)]
struct State {
    objects: HashMap<Oid, Vec<u8>>,
    rows: BTreeMap<u32, Row>,
    created: u32,
    last_id: u32,
}

#[derive(Debug, Default)]
struct Plan {
    fail_begin: bool,
    fail_insert_row_on_call: Option<usize>,
    truncate_writes_to: Option<usize>,
    fail_commit: bool,
    fail_rollback: bool,
}

/// Call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Probe {
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub dropped: usize,
    pub creates: usize,
    pub writes: usize,
    pub insert_rows: usize,
    pub locates: usize,
    pub unlinks: usize,
}

#[derive(Debug, Default)]
struct Inner {
    committed: Mutex<State>,
    plan: Mutex<Plan>,
    probe: Mutex<Probe>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn locate_sql(id: u32) -> String {
        format!("SELECT raster, size FROM images WHERE id = {id}")
    }

    pub fn probe(&self) -> Probe {
        self.inner.probe.lock().unwrap().clone()
    }

    pub fn fail_begin(&self) {
        self.inner.plan.lock().unwrap().fail_begin = true;
    }

    /// Fails the `call`-th (1-based) insert statement run against the store.
    pub fn fail_insert_row_on_call(&self, call: usize) {
        self.inner.plan.lock().unwrap().fail_insert_row_on_call = Some(call);
    }

    pub fn truncate_writes_to(&self, len: usize) {
        self.inner.plan.lock().unwrap().truncate_writes_to = Some(len);
    }

    pub fn fail_commit(&self) {
        self.inner.plan.lock().unwrap().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.inner.plan.lock().unwrap().fail_rollback = true;
    }

    /// Stores `content` with a metadata row claiming `size` bytes.
    pub fn seed_row(&self, id: u32, content: &[u8], size: i32) -> Oid {
        let mut state = self.inner.committed.lock().unwrap();
        state.created += 1;
        let oid = Oid(FIRST_OID + state.created);
        state.objects.insert(oid, content.to_vec());
        state.rows.insert(
            id,
            Row {
                oid,
                size,
                name: format!("image-{id}"),
                file_type: String::new(),
                sort_index: 0,
            },
        );
        state.last_id = state.last_id.max(id);
        oid
    }

    pub fn has_object(&self, oid: Oid) -> bool {
        self.inner.committed.lock().unwrap().objects.contains_key(&oid)
    }

    pub fn object_count(&self) -> usize {
        self.inner.committed.lock().unwrap().objects.len()
    }

    pub fn row_count(&self) -> usize {
        self.inner.committed.lock().unwrap().rows.len()
    }

    pub fn row(&self, id: u32) -> Option<Row> {
        self.inner.committed.lock().unwrap().rows.get(&id).cloned()
    }

    fn count(&self, f: impl FnOnce(&mut Probe)) {
        f(&mut self.inner.probe.lock().unwrap());
    }
}

impl TransactionSource for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        self.count(|p| p.begins += 1);
        if self.inner.plan.lock().unwrap().fail_begin {
            return Err(StoreError::connection("connection refused"));
        }
        let staged = self.inner.committed.lock().unwrap().clone();
        Ok(MemoryTx {
            store: self.clone(),
            staged: Mutex::new(staged),
            descriptors: Mutex::new(HashMap::new()),
            finished: false,
        })
    }
}

#[derive(Debug)]
struct OpenObject {
    oid: Oid,
    mode: OpenMode,
    position: usize,
}

#[derive(Debug)]
pub(crate) struct MemoryTx {
    store: MemoryStore,
    staged: Mutex<State>,
    descriptors: Mutex<HashMap<Descriptor, OpenObject>>,
    finished: bool,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.store.count(|p| p.dropped += 1);
        }
    }
}

impl LargeObjectTx for MemoryTx {
    async fn create(&self) -> Result<Oid, StoreError> {
        self.store.count(|p| p.creates += 1);
        let mut state = self.staged.lock().unwrap();
        state.created += 1;
        let oid = Oid(FIRST_OID + state.created);
        state.objects.insert(oid, Vec::new());
        Ok(oid)
    }

    async fn open(&self, oid: Oid, mode: OpenMode) -> Result<Descriptor, StoreError> {
        if !self.staged.lock().unwrap().objects.contains_key(&oid) {
            return Err(StoreError::not_found(format!("large object {oid}")));
        }
        let mut descriptors = self.descriptors.lock().unwrap();
        let fd = Descriptor(descriptors.keys().map(|fd| fd.0 + 1).max().unwrap_or(0));
        descriptors.insert(
            fd,
            OpenObject {
                oid,
                mode,
                position: 0,
            },
        );
        Ok(fd)
    }

    async fn write(&self, fd: Descriptor, data: &[u8]) -> Result<usize, StoreError> {
        self.store.count(|p| p.writes += 1);
        let limit = self.store.inner.plan.lock().unwrap().truncate_writes_to;
        let mut descriptors = self.descriptors.lock().unwrap();
        let open = descriptors
            .get_mut(&fd)
            .ok_or_else(|| StoreError::large_object("write", "invalid descriptor"))?;
        if open.mode != OpenMode::Write {
            return Err(StoreError::large_object("write", "descriptor not open for writing"));
        }
        let n = limit.map_or(data.len(), |limit| limit.min(data.len()));
        let mut state = self.staged.lock().unwrap();
        let object = state.objects.get_mut(&open.oid).unwrap();
        object.truncate(open.position);
        object.extend_from_slice(&data[..n]);
        open.position += n;
        Ok(n)
    }

    async fn read(&self, fd: Descriptor, len: usize) -> Result<Vec<u8>, StoreError> {
        let mut descriptors = self.descriptors.lock().unwrap();
        let open = descriptors
            .get_mut(&fd)
            .ok_or_else(|| StoreError::large_object("read", "invalid descriptor"))?;
        if open.mode != OpenMode::Read {
            return Err(StoreError::large_object("read", "descriptor not open for reading"));
        }
        let state = self.staged.lock().unwrap();
        let object = &state.objects[&open.oid];
        let start = open.position.min(object.len());
        let end = (start + len).min(object.len());
        open.position = end;
        Ok(object[start..end].to_vec())
    }

    async fn close(&self, fd: Descriptor) -> Result<(), StoreError> {
        self.descriptors
            .lock()
            .unwrap()
            .remove(&fd)
            .map(|_| ())
            .ok_or_else(|| StoreError::large_object("close", "invalid descriptor"))
    }

    async fn unlink(&self, oid: Oid) -> Result<(), StoreError> {
        self.store.count(|p| p.unlinks += 1);
        self.staged
            .lock()
            .unwrap()
            .objects
            .remove(&oid)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("large object {oid}")))
    }

    async fn insert_row(
        &self,
        statement: &InsertStatement,
        row: NewRow<'_>,
    ) -> Result<StoredRow, StoreError> {
        let call = {
            let mut probe = self.store.inner.probe.lock().unwrap();
            probe.insert_rows += 1;
            probe.insert_rows
        };
        if self.store.inner.plan.lock().unwrap().fail_insert_row_on_call == Some(call) {
            return Err(StoreError::query("duplicate key value violates unique constraint"));
        }

        let mut state = self.staged.lock().unwrap();
        state.last_id += 1;
        let id = state.last_id;
        let name = format!("image-{id}");
        let (file_type, sort_index) = if statement.binds_metadata() {
            (row.file_type.to_string(), row.sort_index)
        } else {
            (String::new(), 0)
        };
        state.rows.insert(
            id,
            Row {
                oid: row.oid,
                size: row.size,
                name: name.clone(),
                file_type,
                sort_index,
            },
        );
        Ok(StoredRow { id, name })
    }

    async fn locate(&self, sql: &str) -> Result<Location, StoreError> {
        self.store.count(|p| p.locates += 1);
        let id: u32 = sql
            .rsplit(' ')
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| StoreError::query(format!("cannot run query: {sql}")))?;
        let state = self.staged.lock().unwrap();
        let row = state
            .rows
            .get(&id)
            .ok_or_else(|| StoreError::not_found(format!("image {id}")))?;
        Ok(Location {
            oid: row.oid,
            size: row.size,
        })
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.count(|p| p.commits += 1);
        if self.store.inner.plan.lock().unwrap().fail_commit {
            return Err(StoreError::connection("could not serialize access"));
        }
        let staged = std::mem::take(&mut *self.staged.lock().unwrap());
        *self.store.inner.committed.lock().unwrap() = staged;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.count(|p| p.rollbacks += 1);
        if self.store.inner.plan.lock().unwrap().fail_rollback {
            return Err(StoreError::connection("connection reset during rollback"));
        }
        Ok(())
    }
}
