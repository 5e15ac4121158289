//! Brings a collection (and optionally a partition) into a state where rows
//! can be written and searched: created, schema-compatible, indexed, loaded.
//!
//! Every step is derived from what the store reports at the time of the call.
//! Nothing is cached between calls and no remote call is retried here; the
//! first remote error ends the sequence.

use std::{
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
    time::Duration,
};

use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use tessera_config::helpers::{deserialize_duration_from_millis, serialize_duration_to_millis};
use tessera_error::TesseraError;
use tessera_types::{CollectionDescriptor, LoadState};

use crate::{
    client::{RemoteOperation, VectorStoreClient},
    errors::{ConfigurationError, IndexerError},
    schema_check::fields_match,
};

/// Name of the partition every collection is created with.
pub const DEFAULT_PARTITION: &str = "_default";

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

/// How to wait for a collection that is loading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPollPolicy {
    #[serde(
        rename = "interval_ms",
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration_from_millis",
        serialize_with = "serialize_duration_to_millis"
    )]
    pub interval: Duration,
    /// Polls before giving up with [`IndexerError::LoadTimedOut`]. Unbounded
    /// when unset; the caller then bounds the wait by dropping the future.
    #[serde(default)]
    pub max_attempts: Option<usize>,
    /// Issue the load without waiting for it and poll the progress instead.
    #[serde(default)]
    pub async_load: bool,
}

impl Default for LoadPollPolicy {
    fn default() -> Self {
        LoadPollPolicy {
            interval: default_poll_interval(),
            max_attempts: None,
            async_load: false,
        }
    }
}

impl LoadPollPolicy {
    /// Rejects a bound of zero polls; at least one poll always happens.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.max_attempts {
            Some(0) => Err(ConfigurationError::ZeroLoadAttempts),
            _ => Ok(()),
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        let builder = ConstantBuilder::default().with_delay(self.interval);
        match self.max_attempts {
            // The first poll is not a retry.
            Some(attempts) => builder.with_max_times(attempts.saturating_sub(1)),
            None => builder.without_max_times(),
        }
    }
}

/// Checks what can be checked locally: a named collection, a positive
/// dimension and a vector field that is part of the schema with that
/// dimension.
pub(crate) fn validate_descriptor(
    descriptor: &CollectionDescriptor,
) -> Result<(), ConfigurationError> {
    if descriptor.name.is_empty() {
        return Err(ConfigurationError::EmptyCollectionName);
    }
    if descriptor.dim == 0 {
        return Err(ConfigurationError::InvalidDimension { dim: 0 });
    }
    let field = descriptor
        .vector_field_schema()
        .ok_or_else(|| ConfigurationError::MissingVectorField(descriptor.vector_field.clone()))?;
    match field.dim {
        Some(field_dim) if field_dim != descriptor.dim => {
            Err(ConfigurationError::VectorDimensionMismatch {
                field: field.name,
                field_dim,
                dim: descriptor.dim,
            })
        }
        _ => Ok(()),
    }
}

/// Makes sure `descriptor.name` exists with compatible fields, has an index on
/// its vector field and is loaded.
///
/// A missing collection is created from the descriptor without being
/// described first. An existing one whose fields differ from the descriptor's
/// fails with [`IndexerError::SchemaMismatch`]; it is never migrated. An
/// invalid descriptor or policy fails before the store is contacted.
#[tracing::instrument(skip_all, fields(collection = %descriptor.name))]
pub async fn ensure_collection(
    client: &dyn VectorStoreClient,
    descriptor: &CollectionDescriptor,
    policy: &LoadPollPolicy,
) -> Result<(), IndexerError> {
    validate_descriptor(descriptor)?;
    policy.validate()?;
    let collection = descriptor.name.as_str();

    let exists = client
        .has_collection(collection)
        .await
        .map_err(IndexerError::remote(RemoteOperation::HasCollection))?;

    if exists {
        let info = client
            .describe_collection(collection)
            .await
            .map_err(IndexerError::remote(RemoteOperation::DescribeCollection))?;
        if !fields_match(&info.fields, &descriptor.resolved_fields()) {
            let remote_fields: Vec<_> = info
                .fields
                .iter()
                .map(|f| (f.name.as_str(), f.data_type))
                .collect();
            tracing::error!(?remote_fields, "Collection exists with a different schema");
            return Err(IndexerError::SchemaMismatch {
                collection: collection.to_string(),
            });
        }
    } else {
        tracing::info!("Creating collection");
        client
            .create_collection(descriptor)
            .await
            .map_err(IndexerError::remote(RemoteOperation::CreateCollection))?;
    }

    let state = client
        .get_load_state(collection)
        .await
        .map_err(IndexerError::remote(RemoteOperation::GetLoadState))?;
    tracing::debug!(?state, "Collection load state");

    match state {
        LoadState::NotExist => Err(IndexerError::CollectionVanished {
            collection: collection.to_string(),
        }),
        LoadState::NotLoaded => {
            ensure_index(client, descriptor).await?;
            tracing::info!(async_load = policy.async_load, "Loading collection");
            client
                .load_collection(collection, !policy.async_load)
                .await
                .map_err(IndexerError::remote(RemoteOperation::LoadCollection))?;
            if policy.async_load {
                wait_for_load(client, collection, policy).await
            } else {
                Ok(())
            }
        }
        LoadState::Loading => wait_for_load(client, collection, policy).await,
        LoadState::Loaded => Ok(()),
    }
}

/// Creates the descriptor's default index unless the vector field already
/// has one. The metric is checked against the field type before the store is
/// asked to build anything.
async fn ensure_index(
    client: &dyn VectorStoreClient,
    descriptor: &CollectionDescriptor,
) -> Result<(), IndexerError> {
    let indexes = client
        .describe_indexes(&descriptor.name, &descriptor.vector_field)
        .await
        .map_err(IndexerError::remote(RemoteOperation::DescribeIndexes))?;
    if !indexes.is_empty() {
        return Ok(());
    }

    let field = descriptor
        .vector_field_schema()
        .ok_or_else(|| ConfigurationError::MissingVectorField(descriptor.vector_field.clone()))?;
    if !descriptor.metric_type.supports(field.data_type) {
        return Err(IndexerError::InvalidMetricType {
            metric: descriptor.metric_type,
            data_type: field.data_type,
            field: field.name,
        });
    }

    let index = descriptor.default_index();
    tracing::info!(
        field = %index.field_name,
        index_type = ?index.index_type,
        metric = %index.metric_type,
        "Creating default index"
    );
    client
        .create_index(&descriptor.name, &index)
        .await
        .map_err(IndexerError::remote(RemoteOperation::CreateIndex))
}

enum PollError {
    Loading,
    Remote(Box<dyn TesseraError>),
}

async fn wait_for_load(
    client: &dyn VectorStoreClient,
    collection: &str,
    policy: &LoadPollPolicy,
) -> Result<(), IndexerError> {
    let attempts = &AtomicUsize::new(0);
    let last_progress = &AtomicU8::new(0);

    let poll = || async move {
        attempts.fetch_add(1, Ordering::Relaxed);
        let progress = match client.get_load_progress(collection).await {
            Ok(progress) => progress,
            Err(err) => return Err(PollError::Remote(err)),
        };
        last_progress.store(progress, Ordering::Relaxed);
        if progress >= 100 {
            Ok(())
        } else {
            Err(PollError::Loading)
        }
    };

    let res = poll
        .retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e| matches!(e, PollError::Loading))
        .notify(|_, delay| {
            tracing::debug!(
                progress = last_progress.load(Ordering::Relaxed),
                ?delay,
                "Collection still loading"
            );
        })
        .await;

    match res {
        Ok(()) => {
            tracing::debug!(
                attempts = attempts.load(Ordering::Relaxed),
                "Collection loaded"
            );
            Ok(())
        }
        Err(PollError::Remote(source)) => Err(IndexerError::Remote {
            operation: RemoteOperation::GetLoadProgress,
            source,
        }),
        Err(PollError::Loading) => {
            let progress = last_progress.load(Ordering::Relaxed);
            let attempts = attempts.load(Ordering::Relaxed);
            tracing::warn!(progress, attempts, "Gave up waiting for collection load");
            Err(IndexerError::LoadTimedOut {
                collection: collection.to_string(),
                progress,
                attempts,
            })
        }
    }
}

/// Makes sure a non-default partition exists and is loaded. The default
/// partition always exists, so it is left alone.
#[tracing::instrument(skip(client))]
pub async fn ensure_partition(
    client: &dyn VectorStoreClient,
    collection: &str,
    partition: &str,
) -> Result<(), IndexerError> {
    if partition == DEFAULT_PARTITION {
        return Ok(());
    }

    let exists = client
        .has_partition(collection, partition)
        .await
        .map_err(IndexerError::remote(RemoteOperation::HasPartition))?;
    if exists {
        return Ok(());
    }

    tracing::info!("Creating partition");
    client
        .create_partition(collection, partition)
        .await
        .map_err(IndexerError::remote(RemoteOperation::CreatePartition))?;
    client
        .load_partitions(collection, &[partition.to_string()])
        .await
        .map_err(IndexerError::remote(RemoteOperation::LoadPartitions))
}
