use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use local_ip_address::local_ip;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

use crate::{
    config::ServerConfig,
    data_channel::DataListener,
    error::FtpError,
    fs,
    protocol::{self, Command, CommandCode, REPLY_ERR, REPLY_OK, UNKNOWN_COMMAND},
};

/// Counters shared by every session of one server.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    data_channels: Arc<AtomicUsize>,
}

impl ServerStats {
    pub fn data_channels_opened(&self) -> usize {
        self.data_channels.load(Ordering::SeqCst)
    }

    fn record_data_channel(&self) {
        self.data_channels.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Server {
    listener: TcpListener,
    directory: Arc<PathBuf>,
    data_timeout: Duration,
    stats: ServerStats,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Server, FtpError> {
        let directory = tokio::fs::canonicalize(&config.directory).await?;
        let server = Self {
            listener: TcpListener::bind(&config.listen).await?,
            directory: Arc::new(directory),
            data_timeout: config.data_timeout,
            stats: ServerStats::default(),
        };

        log::info!(
            "Initializing server... serving directory:{}",
            server.directory.display()
        );
        let local_addr = server.local_addr()?;
        if local_addr.ip().is_unspecified() {
            match local_ip() {
                Ok(ip) => println!("Server is hosted on {}:{}", ip, local_addr.port()),
                Err(e) => {
                    log::warn!("Could not determine local address: {}", e);
                    println!("Server is hosted on {}", local_addr);
                }
            }
        } else {
            println!("Server is hosted on {}", local_addr);
        }

        Ok(server)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, FtpError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> ServerStats {
        self.stats.clone()
    }

    /// Accepts control connections forever, one task per connection.
    pub async fn run(self) -> Result<(), FtpError> {
        log::info!("Waiting for clients to connect...");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            log::info!("Accepted connection from client {}", peer);

            let session = ControlSession {
                control: stream,
                peer,
                directory: Arc::clone(&self.directory),
                data_timeout: self.data_timeout,
                stats: self.stats(),
            };
            tokio::spawn(async move {
                if let Err(e) = session.serve().await {
                    log::error!("Session with {} ended: {}", peer, e);
                }
            });
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionState {
    AwaitingCommand,
    Dispatching(Request),
    Closed,
}

#[derive(Debug, PartialEq, Eq)]
enum Request {
    Known(Command),
    Unknown(i64),
}

/// Server end of one client's control connection.
struct ControlSession {
    control: TcpStream,
    peer: SocketAddr,
    directory: Arc<PathBuf>,
    data_timeout: Duration,
    stats: ServerStats,
}

impl ControlSession {
    async fn serve(mut self) -> Result<(), FtpError> {
        let mut state = SessionState::AwaitingCommand;
        loop {
            state = match state {
                SessionState::AwaitingCommand => {
                    log::debug!("Waiting for commands from {}", self.peer);
                    match self.read_request().await? {
                        Some(request) => SessionState::Dispatching(request),
                        None => {
                            log::info!("Client {} disconnected", self.peer);
                            SessionState::Closed
                        }
                    }
                }
                SessionState::Dispatching(request) => self.dispatch(request).await?,
                SessionState::Closed => return Ok(()),
            };
        }
    }

    /// Runs one request to completion and says what the session does next.
    async fn dispatch(&mut self, request: Request) -> Result<SessionState, FtpError> {
        log::info!("Received {:?} from {}", request, self.peer);

        match request {
            Request::Known(Command::Fetch { file_name }) => self.fetch(&file_name).await?,
            Request::Known(Command::Store { file_name }) => self.store(&file_name).await?,
            Request::Known(Command::List) => self.list().await?,
            Request::Known(Command::Quit) => {
                self.quit().await;
                return Ok(SessionState::Closed);
            }
            Request::Unknown(code) => {
                log::warn!("Unknown command code {} from {}", code, self.peer);
                self.send_err(UNKNOWN_COMMAND).await?;
            }
        }
        Ok(SessionState::AwaitingCommand)
    }

    /// `None` when the client went away between commands.
    async fn read_request(&mut self) -> Result<Option<Request>, FtpError> {
        let Some(code) = protocol::decode_or_eof(&mut self.control).await? else {
            return Ok(None);
        };
        let code = String::from_utf8_lossy(&code).into_owned();
        let number = code
            .trim()
            .parse::<i64>()
            .map_err(|_| FtpError::MalformedCommand(code.clone()))?;

        let request = match CommandCode::from_code(number) {
            Some(CommandCode::Fetch) => Request::Known(Command::Fetch {
                file_name: protocol::read_text_frame(&mut self.control).await?,
            }),
            Some(CommandCode::Store) => Request::Known(Command::Store {
                file_name: protocol::read_text_frame(&mut self.control).await?,
            }),
            Some(CommandCode::List) => Request::Known(Command::List),
            Some(CommandCode::Quit) => Request::Known(Command::Quit),
            None => Request::Unknown(number),
        };
        Ok(Some(request))
    }

    async fn fetch(&mut self, file_name: &str) -> Result<(), FtpError> {
        // Only regular files directly under the served directory are fetchable.
        let path = fs::served_path(&self.directory, file_name);
        let path = match path {
            Some(path) if fs::file_exists(&path).await => path,
            _ => {
                let message = format!("{} does not exist.", file_name);
                log::warn!("{}", message);
                return self.send_err(&message).await;
            }
        };
        let contents = match fs::read_file(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                return self.send_err(&format!("{} could not be read.", file_name)).await;
            }
        };

        let Some(listener) = self.open_data_channel().await? else {
            return Ok(());
        };
        let timeout = self.data_timeout;
        let result = async {
            let mut data = listener.accept(timeout).await?;
            protocol::write_frame(&mut data, &contents).await?;
            data.shutdown().await?;
            Ok::<_, FtpError>(())
        }
        .await;

        match result {
            Ok(()) => log::info!("Sent {} ({} bytes)", path.display(), contents.len()),
            Err(e) => log::error!("Sending {} failed: {}", file_name, e),
        }
        Ok(())
    }

    async fn store(&mut self, file_name: &str) -> Result<(), FtpError> {
        let Some(path) = fs::served_path(&self.directory, file_name) else {
            log::warn!("Rejected store of {:?}", file_name);
            return self.send_err("Invalid file name.").await;
        };

        let Some(listener) = self.open_data_channel().await? else {
            return Ok(());
        };
        let timeout = self.data_timeout;
        let result = async {
            let mut data = listener.accept(timeout).await?;
            let contents = protocol::decode(&mut data).await?;
            fs::write_file(&path, &contents).await?;
            Ok::<_, FtpError>(contents.len())
        }
        .await;

        match result {
            Ok(len) => log::info!("Received {} ({} bytes)", path.display(), len),
            Err(e) => log::error!("Receiving {} failed: {}", file_name, e),
        }
        Ok(())
    }

    async fn list(&mut self) -> Result<(), FtpError> {
        let listing = match fs::list_directory(&self.directory).await {
            Ok(listing) => listing,
            Err(e) => {
                log::error!("Failed to list {}: {}", self.directory.display(), e);
                return self.send_err("Directory listing failed.").await;
            }
        };

        let Some(listener) = self.open_data_channel().await? else {
            return Ok(());
        };
        let timeout = self.data_timeout;
        let directory = self.directory.to_string_lossy().into_owned();
        let result = async {
            let mut data = listener.accept(timeout).await?;
            protocol::write_text_frame(&mut data, &listing).await?;
            protocol::write_text_frame(&mut data, &directory).await?;
            data.shutdown().await?;
            Ok::<_, FtpError>(())
        }
        .await;

        if let Err(e) = result {
            log::error!("Sending listing failed: {}", e);
        }
        Ok(())
    }

    /// Closes the control connection; the session ends right after.
    async fn quit(&mut self) {
        if let Err(e) = self.control.shutdown().await {
            log::debug!("Shutting down control connection to {}: {}", self.peer, e);
        }
        log::info!("Client {} quit", self.peer);
    }

    /// Binds the data channel, then replies `OK` and announces its port.
    ///
    /// If no port can be bound the client gets `ERR` instead and `None` is returned.
    async fn open_data_channel(&mut self) -> Result<Option<DataListener>, FtpError> {
        let ip = self.control.local_addr()?.ip();
        let listener = match DataListener::open(ip) {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("Could not open data channel: {}", e);
                self.send_err("Could not open data channel.").await?;
                return Ok(None);
            }
        };
        self.stats.record_data_channel();
        log::info!(
            "Data channel #{} for {} on port {}",
            self.stats.data_channels_opened(),
            self.peer,
            listener.port()
        );

        protocol::write_text_frame(&mut self.control, REPLY_OK).await?;
        protocol::write_text_frame(&mut self.control, &listener.port().to_string()).await?;
        Ok(Some(listener))
    }

    async fn send_err(&mut self, message: &str) -> Result<(), FtpError> {
        protocol::write_text_frame(&mut self.control, REPLY_ERR).await?;
        protocol::write_text_frame(&mut self.control, message).await
    }
}
