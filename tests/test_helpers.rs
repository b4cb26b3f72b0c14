//! Test helpers and utilities for integration tests

use std::collections::{BTreeMap, HashMap};
use tokio::io::duplex;
use tokio::task::JoinHandle;
use watchtower::client::SourceClient;
use watchtower::registry::SourceRegistry;
use watchtower::server::serve_connection;
use watchtower::sources::LogSource;

/// Spawn a server for one source over an in-memory duplex stream and
/// return a client connected to it. Dropping the join handle detaches the
/// server task; aborting it simulates a dead connection.
#[allow(dead_code)]
pub fn spawn_source(source: Box<dyn LogSource>) -> (SourceClient, JoinHandle<()>) {
    let (client_io, server_io) = duplex(64 * 1024);
    let (read_half, write_half) = tokio::io::split(server_io);
    let task = tokio::spawn(async move {
        let _ = serve_connection(source, read_half, write_half).await;
    });
    (SourceClient::over(client_io), task)
}

/// Build a registry over in-memory servers, initializing each source with
/// the given credentials.
#[allow(dead_code)]
pub async fn registry_over(
    sources: Vec<(&str, Box<dyn LogSource>, HashMap<String, String>)>,
) -> SourceRegistry {
    let mut clients = BTreeMap::new();
    for (name, source, credentials) in sources {
        let (mut client, _task) = spawn_source(source);
        client
            .initialize(&credentials)
            .await
            .expect("source should initialize");
        clients.insert(name.to_string(), client);
    }
    SourceRegistry::from_clients(clients)
}

#[allow(dead_code)]
pub fn creds(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
