//! Store health

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::HealthStatus;
use crate::store::{self, QueryOptions, TransactionStore};

/// Report reachability and index metadata
///
/// An unreachable store is a normal answer here (`reachable: false`), not an
/// error. That holds for the index lookup as well as the ping, so a cluster
/// that answers the ping and then drops or stalls is still reported. A store
/// that answers with something unexpected still fails.
pub async fn health<S>(store: &S, options: &QueryOptions) -> Result<HealthStatus>
where
    S: TransactionStore + ?Sized,
{
    let index_name = store.index_name().to_string();

    let ping = match store::bounded(options, store.ping(options)).await {
        Ok(ping) => ping,
        Err(e) if e.is_unavailable() => return Ok(unreachable(index_name, &e)),
        Err(e) => return Err(e),
    };

    let index = match store::bounded(options, store.describe_index(options)).await {
        Ok(index) => index,
        Err(e) if e.is_unavailable() => return Ok(unreachable(index_name, &e)),
        Err(e) => return Err(e),
    };
    if !index.exists {
        warn!("Index {} does not exist", index_name);
    }

    Ok(HealthStatus {
        reachable: true,
        latency_ms: Some(ping.latency.as_millis() as u64),
        cluster_name: ping.cluster_name,
        status: ping.status,
        index_name,
        index_exists: index.exists,
        document_count: index.document_count,
        error: None,
    })
}

fn unreachable(index_name: String, error: &Error) -> HealthStatus {
    warn!("Store unreachable: {}", error);
    HealthStatus {
        reachable: false,
        latency_ms: None,
        cluster_name: None,
        status: None,
        index_name,
        index_exists: false,
        document_count: 0,
        error: Some(error.to_string()),
    }
}
