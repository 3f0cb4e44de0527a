use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::{
    error::FtpError,
    protocol::{self, Command, Reply, REPLY_ERR, REPLY_OK},
};

/// Client end of the persistent control connection.
///
/// Once a framing or connectivity error hits the control stream, or the
/// session is closed, the stream is dropped and every later call fails
/// with [`FtpError::ConnectionClosed`].
pub struct ControlSession {
    stream: Option<TcpStream>,
    host: String,
    port: u16,
}

impl ControlSession {
    pub async fn connect(host: &str, port: u16) -> Result<Self, FtpError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| FtpError::ConnectionRefused {
                addr: addr.clone(),
                source,
            })?;

        log::info!("Control connection established to {}", addr);
        Ok(Self {
            stream: Some(stream),
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends the command code frame followed by its argument frame, if any.
    pub async fn send_command(&mut self, command: &Command) -> Result<(), FtpError> {
        log::debug!("Sending {:?}", command);
        let result = Self::write_command(self.stream()?, command).await;
        self.check(result)
    }

    /// Reads one status reply: `OK` and a data port, or `ERR` and a message.
    pub async fn await_reply(&mut self) -> Result<Reply, FtpError> {
        let result = Self::read_reply(self.stream()?).await;
        self.check(result)
    }

    /// Sends `QUIT` and shuts the control connection down. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), FtpError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        Self::write_command(&mut stream, &Command::Quit).await?;
        stream.shutdown().await?;

        log::info!("Control connection to {}:{} closed", self.host, self.port);
        Ok(())
    }

    fn stream(&mut self) -> Result<&mut TcpStream, FtpError> {
        self.stream.as_mut().ok_or(FtpError::ConnectionClosed)
    }

    fn check<T>(&mut self, result: Result<T, FtpError>) -> Result<T, FtpError> {
        if let Err(e) = &result {
            if e.is_fatal() {
                log::warn!("Control connection lost: {}", e);
                self.stream = None;
            }
        }
        result
    }

    async fn write_command(stream: &mut TcpStream, command: &Command) -> Result<(), FtpError> {
        protocol::write_text_frame(stream, &command.code().code().to_string()).await?;
        if let Some(argument) = command.argument() {
            protocol::write_text_frame(stream, argument).await?;
        }
        Ok(())
    }

    async fn read_reply(stream: &mut TcpStream) -> Result<Reply, FtpError> {
        let status = protocol::read_text_frame(stream).await?;
        match status.as_str() {
            REPLY_OK => {
                let port = protocol::parse_port(&protocol::read_text_frame(stream).await?)?;
                Ok(Reply::Ok { port })
            }
            REPLY_ERR => Ok(Reply::Err(protocol::read_text_frame(stream).await?)),
            _ => Err(FtpError::UnexpectedReply(status)),
        }
    }
}
