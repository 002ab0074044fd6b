//! The `k8s-service` interface: a provider publishes the name and port of a
//! Kubernetes Service, and the requirer reads them.

use crate::{Bag, RelationStore, TooManyRelations};
use serde::{Deserialize, Serialize};

pub const NAME: &str = "name";
pub const PORT: &str = "port";

const REQUIRED: [&str; 2] = [NAME, PORT];

/// A Service as published by a provider.
///
/// The port is kept as text so that a provider that has not yet published a
/// number can still be represented.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub port: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("missing relation with a service info provider on {endpoint}")]
    RelationMissing { endpoint: String },

    #[error("{count} applications are related on {endpoint}, expected one")]
    TooManyRelatedApplications { endpoint: String, count: usize },

    #[error("missing attributes {missing:?} in {endpoint} relation data")]
    RelationDataMissing {
        endpoint: String,
        missing: Vec<&'static str>,
    },
}

/// Reads the service descriptor published on `endpoint`.
///
/// The store is read on every call; nothing is cached.
pub fn get<S>(store: &S, endpoint: &str) -> Result<ServiceDescriptor, Error>
where
    S: RelationStore + ?Sized,
{
    let relation = store
        .relation(endpoint)
        .map_err(
            |TooManyRelations { endpoint, count }| Error::TooManyRelatedApplications {
                endpoint,
                count,
            },
        )?
        .ok_or_else(|| Error::RelationMissing {
            endpoint: endpoint.to_string(),
        })?;

    let missing = REQUIRED
        .into_iter()
        .filter(|attr| relation.remote.get(*attr).map_or(true, |v| v.is_empty()))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(Error::RelationDataMissing {
            endpoint: endpoint.to_string(),
            missing,
        });
    }

    Ok(ServiceDescriptor {
        name: relation.remote[NAME].clone(),
        port: relation.remote[PORT].clone(),
    })
}

// === impl ServiceDescriptor ===

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, port: impl ToString) -> Self {
        Self {
            name: name.into(),
            port: port.to_string(),
        }
    }

    /// The bag a provider publishes for this descriptor.
    pub fn to_bag(&self) -> Bag {
        [
            (NAME.to_string(), self.name.clone()),
            (PORT.to_string(), self.port.clone()),
        ]
        .into_iter()
        .collect()
    }
}
