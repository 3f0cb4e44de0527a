use std::{net::SocketAddr, path::Path, time::Duration};

use crate::{
    config::ServerConfig,
    server::{Server, ServerStats},
};

/// Starts a server on an ephemeral localhost port serving `directory`.
pub(crate) async fn start_server(directory: &Path) -> (SocketAddr, ServerStats) {
    let config = ServerConfig {
        listen: "127.0.0.1:0".to_string(),
        directory: directory.to_path_buf(),
        data_timeout: Duration::from_secs(2),
    };
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let stats = server.stats();
    tokio::spawn(server.run());
    (addr, stats)
}
