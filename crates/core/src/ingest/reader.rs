//! Reading file parts into image entities.

use std::io::Read;

use tracing::{debug, warn};

use super::classify::ContentClassifier;
use super::error::IngestError;
use super::part::FilePart;
use super::policy::UploadPolicy;
use super::progress::ProgressReader;
use crate::image::{Image, Imager, Images};

/// Populate `image` from one uploaded part.
///
/// The declared size is checked before the part is opened. The entity is
/// only mutated once every check has passed, so on error it is unchanged.
///
/// # Errors
///
/// - [`IngestError::FileTooLarge`] if the declared size exceeds the policy
/// - [`IngestError::Io`] if the content cannot be fully read
/// - [`IngestError::MissingFileName`] / [`IngestError::InvalidSortIndex`]
///   if the filename is absent or not an integer
/// - [`IngestError::DisallowedFileType`] if the allow-list rejects the type
pub fn read_from_part<P, I>(
    part: &P,
    image: &mut I,
    policy: &UploadPolicy,
    classifier: &dyn ContentClassifier,
) -> Result<(), IngestError>
where
    P: FilePart + ?Sized,
    I: Imager + ?Sized,
{
    let label = part.file_name().unwrap_or_default();
    let size = part.size();
    if size > policy.max_size {
        warn!(part = label, size, max = policy.max_size, "Rejecting oversized upload");
        return Err(IngestError::file_too_large(label, size, policy.max_size));
    }
    let len = usize::try_from(size)
        .map_err(|_| IngestError::file_too_large(label, size, policy.max_size))?;

    let mut raw = vec![0u8; len];
    let mut reader = ProgressReader::new(part.open()?, label, size);
    reader.read_exact(&mut raw)?;

    let file_name = part.file_name().ok_or(IngestError::MissingFileName)?;
    let sort_index = file_name
        .parse::<i32>()
        .map_err(|source| IngestError::InvalidSortIndex {
            file_name: file_name.to_string(),
            source,
        })?;

    let file_type = classifier.classify(&raw);
    if !policy.allows(&file_type) {
        warn!(part = file_name, file_type = %file_type, "Rejecting disallowed file type");
        return Err(IngestError::disallowed_file_type(file_type));
    }

    debug!(part = file_name, sort_index, file_type = %file_type, bytes = len, "Ingested part");
    image.set_raw(raw);
    image.set_sort_index(sort_index);
    image.set_file_type(file_type);
    Ok(())
}

/// Ingest every part into a fresh image, ordered by sort index.
///
/// # Errors
///
/// Returns the first part's error; earlier parts are discarded.
pub fn ingest_parts<'a, P, It>(
    parts: It,
    policy: &UploadPolicy,
    classifier: &dyn ContentClassifier,
) -> Result<Images<Image>, IngestError>
where
    P: FilePart + 'a,
    It: IntoIterator<Item = &'a P>,
{
    let mut images = Images::new();
    for part in parts {
        let mut image = Image::default();
        read_from_part(part, &mut image, policy, classifier)?;
        images.push(image);
    }
    images.sort_by_index();
    Ok(images)
}
