use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::error::FtpError;

/// Only the one peer the port was announced to is expected.
const DATA_BACKLOG: u32 = 1;

/// Server end of a single-use data channel.
///
/// Bound to an OS-assigned port on open; [`DataListener::accept`] consumes it,
/// so the port serves exactly one connection.
#[derive(Debug)]
pub struct DataListener {
    listener: TcpListener,
    port: u16,
}

impl DataListener {
    pub fn open(ip: IpAddr) -> Result<Self, FtpError> {
        let socket = match ip {
            IpAddr::V4(_) => TcpSocket::new_v4()?,
            IpAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.bind(SocketAddr::new(ip, 0))?;
        let listener = socket.listen(DATA_BACKLOG)?;
        let port = listener.local_addr()?.port();

        log::debug!("Data channel listening on {}:{}", ip, port);
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn accept(self, timeout: Duration) -> Result<TcpStream, FtpError> {
        let (stream, peer) = tokio::time::timeout(timeout, self.listener.accept())
            .await
            .map_err(|_| FtpError::Timeout("data channel connection"))??;

        log::debug!("Data channel on port {} accepted {}", self.port, peer);
        Ok(stream)
    }
}

/// Client end: connects to the port the server announced.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, FtpError> {
    let addr = format!("{}:{}", host, port);
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            log::debug!("Data channel connected to {}", addr);
            Ok(stream)
        }
        Ok(Err(source)) => Err(FtpError::DataChannelUnreachable { addr, source }),
        Err(_) => Err(FtpError::Timeout("data channel connection")),
    }
}
