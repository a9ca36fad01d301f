//! Index provisioning for registered collections.

use crate::{
    backend::CollectionHandle,
    error::AdapterResult,
    schema::IndexSpec,
};

/// Creates every index in `specs` on `collection`, in order.
///
/// The first failure is returned and the remaining specs are not attempted. Indexes
/// created before the failure stay in place; re-running the batch is safe because
/// creating an equivalent index is a no-op in the store.
pub async fn provision_indexes<C>(collection: &C, specs: &[IndexSpec]) -> AdapterResult<()>
where
    C: CollectionHandle,
{
    for spec in specs {
        tracing::debug!(
            collection = collection.name(),
            keys = %spec.keys,
            unique = spec.is_unique(),
            "Creating index"
        );

        collection.create_index(spec).await?;
    }

    Ok(())
}
