//! Multi-source registry with namespaced function routing
//!
//! The registry owns one protocol client per configured source and exposes
//! the union of their operations under qualified names. Qualification is
//! purely client-side: a source only ever sees the unprefixed operation
//! names it advertised, so two sources can both offer `fetchLogs` without
//! colliding.
//!
//! Construction is all-or-nothing. A registry either connects and
//! initializes every configured source or fails, closing whatever it had
//! already opened. Discovery after that is best-effort: a source that fails
//! `discover` is logged and left out of the catalog, and the catalog
//! snapshot gates `execute` until a later discovery brings it back.

use crate::client::{ClientError, SourceClient};
use crate::protocol::OperationDescriptor;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{error, info, warn};

/// Connection coordinates and credentials for one remote source.
#[derive(Debug, Clone)]
pub struct SourceBinding {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub credentials: HashMap<String, String>,
}

/// Routing failures raised by the registry itself, distinct from transport
/// or remote failures surfaced through [`ClientError`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid function name '{0}': expected '<source>.<operation>'")]
    InvalidFunctionFormat(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Facade over a set of initialized source clients, keyed by source name.
///
/// Sources are held in a `BTreeMap` so discovery and shutdown walk them in
/// a stable name order regardless of configuration order.
pub struct SourceRegistry {
    clients: BTreeMap<String, SourceClient>,
    catalog: HashSet<String>,
}

impl SourceRegistry {
    /// Connect and initialize every binding. The first failure aborts
    /// construction and closes the sources opened so far, best-effort.
    pub async fn connect(bindings: Vec<SourceBinding>) -> Result<Self, RegistryError> {
        let mut clients: BTreeMap<String, SourceClient> = BTreeMap::new();

        for binding in bindings {
            match Self::connect_one(&binding).await {
                Ok(client) => {
                    clients.insert(binding.name, client);
                }
                Err(e) => {
                    error!(source = %binding.name, error = %e, "failed to bring up source");
                    for (name, client) in clients {
                        if let Err(close_err) = client.close().await {
                            warn!(source = %name, error = %close_err, "close during unwind failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            clients,
            catalog: HashSet::new(),
        })
    }

    async fn connect_one(binding: &SourceBinding) -> Result<SourceClient, RegistryError> {
        let mut client = SourceClient::connect((binding.host.as_str(), binding.port)).await?;
        let init = client.initialize(&binding.credentials).await?;
        info!(source = %binding.name, provider = %init.provider, "source ready");
        Ok(client)
    }

    /// Assemble a registry over clients that are already connected and
    /// initialized. This is the entry point for in-process transports;
    /// [`SourceRegistry::connect`] is the TCP path.
    pub fn from_clients(clients: BTreeMap<String, SourceClient>) -> Self {
        Self {
            clients,
            catalog: HashSet::new(),
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    /// Ask every source for its operations and return the union under
    /// qualified names, with the owning source appended to each
    /// description. A source that fails discovery is skipped with a
    /// warning; its functions drop out of the catalog until a later call
    /// succeeds for it.
    pub async fn discover_all(&mut self) -> Vec<OperationDescriptor> {
        let mut functions = Vec::new();
        let mut catalog = HashSet::new();

        for (name, client) in &mut self.clients {
            match client.discover().await {
                Ok(descriptors) => {
                    for descriptor in descriptors {
                        let qualified = qualify(name, &descriptor.name);
                        catalog.insert(qualified.clone());
                        functions.push(OperationDescriptor {
                            name: qualified,
                            description: format!("{} (from {})", descriptor.description, name),
                            parameters: descriptor.parameters,
                        });
                    }
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "discovery failed, dropping source from catalog");
                }
            }
        }

        self.catalog = catalog;
        functions
    }

    /// Route a qualified function call to its source, stripping the
    /// namespace prefix before delegation. Only functions present in the
    /// latest discovery snapshot are callable.
    pub async fn execute(
        &mut self,
        function: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, RegistryError> {
        let (source_name, operation) = split_qualified(function)?;

        let client = match self.clients.get_mut(source_name) {
            Some(client) => client,
            None => return Err(RegistryError::UnknownSource(source_name.to_string())),
        };
        if !self.catalog.contains(function) {
            return Err(RegistryError::UnknownFunction(function.to_string()));
        }

        Ok(client.execute(operation, arguments).await?)
    }

    /// Close every client, logging rather than propagating close failures.
    pub async fn close(self) {
        for (name, client) in self.clients {
            if let Err(e) = client.close().await {
                warn!(source = %name, error = %e, "failed to close source cleanly");
            }
        }
    }
}

fn qualify(source: &str, operation: &str) -> String {
    format!("{source}.{operation}")
}

/// Split a qualified name at the first `.` into source and operation.
/// Both halves must be non-empty; the operation half may itself contain
/// dots.
fn split_qualified(function: &str) -> Result<(&str, &str), RegistryError> {
    match function.split_once('.') {
        Some((source, operation)) if !source.is_empty() && !operation.is_empty() => {
            Ok((source, operation))
        }
        _ => Err(RegistryError::InvalidFunctionFormat(function.to_string())),
    }
}
