//! Image entity types and the storable-entity capability trait.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle of a large object in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(pub u32);

impl Oid {
    /// Returns the raw numeric handle.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Oid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Capability set a type must expose to be stored as a large object.
///
/// `id`, `name`, `oid` and `size` are written by the storage protocol;
/// `raw`, `file_type` and `sort_index` are filled in by ingestion.
pub trait Imager: Send {
    /// Image content.
    fn raw(&self) -> &[u8];
    /// Replaces the image content.
    fn set_raw(&mut self, raw: Vec<u8>);

    /// Server-assigned identity, zero before persistence.
    fn id(&self) -> u32;
    /// Sets the server-assigned identity.
    fn set_id(&mut self, id: u32);

    /// Server-assigned name, empty before persistence.
    fn name(&self) -> &str;
    /// Sets the server-assigned name.
    fn set_name(&mut self, name: String);

    /// Classified MIME type.
    fn file_type(&self) -> &str;
    /// Sets the classified MIME type.
    fn set_file_type(&mut self, file_type: String);

    /// Large-object handle, `None` until the image has been inserted.
    fn oid(&self) -> Option<Oid>;
    /// Sets the large-object handle.
    fn set_oid(&mut self, oid: Oid);

    /// Stored byte length.
    fn size(&self) -> i32;
    /// Sets the stored byte length.
    fn set_size(&mut self, size: i32);

    /// Ordering hint within a batch.
    fn sort_index(&self) -> i32;
    /// Sets the ordering hint.
    fn set_sort_index(&mut self, index: i32);
}

impl<T: Imager + ?Sized> Imager for &mut T {
    fn raw(&self) -> &[u8] {
        (**self).raw()
    }
    fn set_raw(&mut self, raw: Vec<u8>) {
        (**self).set_raw(raw);
    }
    fn id(&self) -> u32 {
        (**self).id()
    }
    fn set_id(&mut self, id: u32) {
        (**self).set_id(id);
    }
    fn name(&self) -> &str {
        (**self).name()
    }
    fn set_name(&mut self, name: String) {
        (**self).set_name(name);
    }
    fn file_type(&self) -> &str {
        (**self).file_type()
    }
    fn set_file_type(&mut self, file_type: String) {
        (**self).set_file_type(file_type);
    }
    fn oid(&self) -> Option<Oid> {
        (**self).oid()
    }
    fn set_oid(&mut self, oid: Oid) {
        (**self).set_oid(oid);
    }
    fn size(&self) -> i32 {
        (**self).size()
    }
    fn set_size(&mut self, size: i32) {
        (**self).set_size(size);
    }
    fn sort_index(&self) -> i32 {
        (**self).sort_index()
    }
    fn set_sort_index(&mut self, index: i32) {
        (**self).set_sort_index(index);
    }
}

/// Stock image entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    /// Server-assigned identity.
    pub id: u32,
    /// Server-assigned name.
    pub name: String,
    /// Image content.
    pub raw: Vec<u8>,
    /// Large-object handle.
    pub oid: Option<Oid>,
    /// Stored byte length.
    pub size: i32,
    /// Classified MIME type.
    pub file_type: String,
    /// Ordering hint.
    pub sort_index: i32,
}

impl Image {
    /// Creates an unpersisted image holding `raw`.
    #[must_use]
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    /// Creates a handle to an already stored image, for reads and deletes.
    #[must_use]
    pub fn stored(id: u32, oid: Oid, size: i32) -> Self {
        Self {
            id,
            oid: Some(oid),
            size,
            ..Self::default()
        }
    }

    /// Returns true once the image has been assigned a large object.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.oid.is_some()
    }
}

impl Imager for Image {
    fn raw(&self) -> &[u8] {
        &self.raw
    }
    fn set_raw(&mut self, raw: Vec<u8>) {
        self.raw = raw;
    }
    fn id(&self) -> u32 {
        self.id
    }
    fn set_id(&mut self, id: u32) {
        self.id = id;
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn file_type(&self) -> &str {
        &self.file_type
    }
    fn set_file_type(&mut self, file_type: String) {
        self.file_type = file_type;
    }
    fn oid(&self) -> Option<Oid> {
        self.oid
    }
    fn set_oid(&mut self, oid: Oid) {
        self.oid = Some(oid);
    }
    fn size(&self) -> i32 {
        self.size
    }
    fn set_size(&mut self, size: i32) {
        self.size = size;
    }
    fn sort_index(&self) -> i32 {
        self.sort_index
    }
    fn set_sort_index(&mut self, index: i32) {
        self.sort_index = index;
    }
}

/// Ordered collection of images; the unit of batch operations.
///
/// Insertion order is preserved. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Images<I = Image>(Vec<I>);

impl<I> Default for Images<I> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<I: Imager> Images<I> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an image.
    pub fn push(&mut self, image: I) {
        self.0.push(image);
    }

    /// Number of images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length collection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for an absent or zero-length collection.
    #[must_use]
    pub fn is_none_or_empty(images: Option<&Self>) -> bool {
        images.is_none_or(Self::is_empty)
    }

    /// Stable sort by `sort_index`.
    pub fn sort_by_index(&mut self) {
        self.0.sort_by_key(|image| image.sort_index());
    }

    /// Iterates in collection order.
    pub fn iter(&self) -> std::slice::Iter<'_, I> {
        self.0.iter()
    }

    /// Iterates mutably in collection order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, I> {
        self.0.iter_mut()
    }

    /// Mutable view of the underlying entities.
    pub fn as_mut_slice(&mut self) -> &mut [I] {
        &mut self.0
    }
}

impl<I: Imager> From<Vec<I>> for Images<I> {
    fn from(images: Vec<I>) -> Self {
        Self(images)
    }
}

impl<I: Imager> FromIterator<I> for Images<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<I: Imager> IntoIterator for Images<I> {
    type Item = I;
    type IntoIter = std::vec::IntoIter<I>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, I: Imager> IntoIterator for &'a Images<I> {
    type Item = &'a I;
    type IntoIter = std::slice::Iter<'a, I>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
