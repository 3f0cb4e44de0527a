use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use crate::{
    config::ClientConfig,
    data_channel,
    error::FtpError,
    file_metadata::FileMetaData,
    fs,
    protocol::{self, Command},
    session::ControlSession,
};

const PROGRESS_TEMPLATE: &str = "{msg} {wide_bar} {bytes}/{total_bytes} ({eta})";

/// What `list` brings back: the listing text and the server's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub text: String,
    pub directory: String,
}

/// Transfer handlers on top of one control session.
///
/// Every handler is one control round trip followed, on `OK`, by exactly
/// one data-channel exchange.
pub struct Client {
    session: ControlSession,
    directory: PathBuf,
    data_timeout: Duration,
    progress: bool,
}

impl Client {
    pub async fn connect(config: &ClientConfig) -> Result<Client, FtpError> {
        let session = ControlSession::connect(&config.host, config.port).await?;
        Ok(Self {
            session,
            directory: config.directory.clone(),
            data_timeout: config.data_timeout,
            progress: config.progress,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Downloads `name` into the local directory, returning where it was written.
    pub async fn fetch(&mut self, name: &str) -> Result<PathBuf, FtpError> {
        let local_name = fs::basename(name).ok_or_else(|| {
            FtpError::LocalPrecondition(format!("{:?} is not a usable file name", name))
        })?;
        let local_path = self.directory.join(local_name);

        let port = self
            .round_trip(Command::Fetch {
                file_name: name.to_string(),
            })
            .await?;

        let mut data = self.open_data(port).await?;
        let progress = self.transfer_bar(format!("Downloading {}", name));
        let contents = protocol::decode_tracked(&mut data, &progress).await?;
        drop(data);
        progress.finish_with_message("Download completed");

        fs::write_file(&local_path, &contents).await?;
        Ok(local_path)
    }

    /// Uploads the local file `name`, returning the number of bytes sent.
    pub async fn store(&mut self, name: &str) -> Result<u64, FtpError> {
        let file_metadata = FileMetaData::from_local_path(&self.directory.join(name)).await?;
        let contents = fs::read_file(&file_metadata.file_path).await?;
        log::info!(
            "Uploading {} ({} bytes)",
            file_metadata.file_path.display(),
            file_metadata.size
        );

        let port = self
            .round_trip(Command::Store {
                file_name: file_metadata.name.clone(),
            })
            .await?;

        let mut data = self.open_data(port).await?;
        let progress = self.transfer_bar(format!("Uploading {}", file_metadata.name));
        protocol::write_frame_tracked(&mut data, &contents, &progress).await?;
        data.shutdown().await?;
        progress.finish_with_message("Upload completed");

        Ok(contents.len() as u64)
    }

    pub async fn list(&mut self) -> Result<Listing, FtpError> {
        let port = self.round_trip(Command::List).await?;

        let mut data = self.open_data(port).await?;
        let text = protocol::read_text_frame(&mut data).await?;
        let directory = protocol::read_text_frame(&mut data).await?;
        Ok(Listing { text, directory })
    }

    pub async fn quit(&mut self) -> Result<(), FtpError> {
        self.session.close().await
    }

    pub fn local_directory(&self) -> &Path {
        &self.directory
    }

    async fn round_trip(&mut self, command: Command) -> Result<u16, FtpError> {
        self.session.send_command(&command).await?;
        self.session.await_reply().await?.into_data_port()
    }

    async fn open_data(&self, port: u16) -> Result<tokio::net::TcpStream, FtpError> {
        data_channel::connect(self.session.host(), port, self.data_timeout).await
    }

    fn transfer_bar(&self, message: String) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            progress_bar.set_style(style.progress_chars("##-"));
        }
        progress_bar.set_message(message);
        progress_bar
    }
}
