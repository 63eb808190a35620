//! Generic cursor decoding.

use futures::StreamExt;
use mongodb::bson;
use serde::de::DeserializeOwned;

use super::error::RepositoryResult;
use crate::store::DocumentCursor;

/// Drains `cursor` into `out`, decoding each document into `T` as it arrives.
///
/// Elements are appended in cursor order. The first cursor or decode error
/// stops the drain and is returned; whatever was appended before it stays in
/// `out`. The cursor itself is left to the caller, who releases it by
/// dropping it.
pub async fn decode_all<T>(cursor: &mut DocumentCursor, out: &mut Vec<T>) -> RepositoryResult<()>
where
    T: DeserializeOwned,
{
    while let Some(next) = cursor.next().await {
        let document = next?;
        out.push(bson::from_document(document)?);
    }
    Ok(())
}

/// Decodes at most one document from `cursor`.
///
/// Returns `Ok(None)` when the cursor is already exhausted.
pub async fn decode_first<T>(cursor: &mut DocumentCursor) -> RepositoryResult<Option<T>>
where
    T: DeserializeOwned,
{
    match cursor.next().await {
        Some(next) => Ok(Some(bson::from_document(next?)?)),
        None => Ok(None),
    }
}
