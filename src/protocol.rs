use indicatif::ProgressBar;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FtpError;

/// Width of the decimal length prefix in front of every frame.
pub const LENGTH_PREFIX_LEN: usize = 10;

/// Largest payload a 10-digit prefix can describe.
pub const MAX_PAYLOAD_LEN: u64 = 9_999_999_999;

pub const REPLY_OK: &str = "OK";
pub const REPLY_ERR: &str = "ERR";
pub const UNKNOWN_COMMAND: &str = "Unknown command.";

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Fetch = 1,
    Store = 2,
    List = 3,
    Quit = 4,
}

impl CommandCode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(CommandCode::Fetch),
            2 => Some(CommandCode::Store),
            3 => Some(CommandCode::List),
            4 => Some(CommandCode::Quit),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// A control-channel request together with its validated argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch { file_name: String },
    Store { file_name: String },
    List,
    Quit,
}

impl Command {
    pub fn code(&self) -> CommandCode {
        match self {
            Command::Fetch { .. } => CommandCode::Fetch,
            Command::Store { .. } => CommandCode::Store,
            Command::List => CommandCode::List,
            Command::Quit => CommandCode::Quit,
        }
    }

    pub fn argument(&self) -> Option<&str> {
        match self {
            Command::Fetch { file_name } | Command::Store { file_name } => Some(file_name.as_str()),
            Command::List | Command::Quit => None,
        }
    }
}

/// Status reply read off the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK` plus the data channel port announced right after it.
    Ok { port: u16 },
    Err(String),
}

impl Reply {
    /// Turns an `ERR` reply into [`FtpError::ServerRejected`] and hands back the announced data port.
    pub fn into_data_port(self) -> Result<u16, FtpError> {
        match self {
            Reply::Ok { port } => Ok(port),
            Reply::Err(message) => Err(FtpError::ServerRejected(message)),
        }
    }
}

pub fn parse_port(text: &str) -> Result<u16, FtpError> {
    text.trim()
        .parse::<u16>()
        .map_err(|_| FtpError::UnexpectedReply(text.to_string()))
}

/// Zero-padded decimal prefix for a payload of `len` bytes.
pub fn length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_LEN], FtpError> {
    if len as u64 > MAX_PAYLOAD_LEN {
        return Err(FtpError::FrameTooLarge(len));
    }
    let digits = format!("{:0width$}", len, width = LENGTH_PREFIX_LEN);
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(digits.as_bytes());
    Ok(prefix)
}

pub fn parse_length_prefix(prefix: &[u8]) -> Result<usize, FtpError> {
    let malformed = || FtpError::MalformedLength(String::from_utf8_lossy(prefix).into_owned());

    if prefix.is_empty() || !prefix.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    std::str::from_utf8(prefix)
        .map_err(|_| malformed())?
        .parse::<usize>()
        .map_err(|_| malformed())
}

pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FtpError> {
    let prefix = length_prefix(payload.len())?;

    let mut buffer = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buffer.extend_from_slice(&prefix);
    buffer.extend_from_slice(payload);

    Ok(buffer)
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FtpError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(payload)?).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn write_text_frame<W>(writer: &mut W, text: &str) -> Result<(), FtpError>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, text.as_bytes()).await
}

/// Writes one frame in chunks, advancing `progress` by the payload bytes sent.
pub async fn write_frame_tracked<W>(
    writer: &mut W,
    payload: &[u8],
    progress: &ProgressBar,
) -> Result<(), FtpError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&length_prefix(payload.len())?).await?;
    progress.set_length(payload.len() as u64);

    for chunk in payload.chunks(CHUNK_SIZE) {
        writer.write_all(chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    writer.flush().await?;
    Ok(())
}

/// Reads one complete frame. A peer that closes cleanly before the prefix
/// yields [`FtpError::ConnectionClosed`].
pub async fn decode<R>(reader: &mut R) -> Result<Vec<u8>, FtpError>
where
    R: AsyncRead + Unpin,
{
    decode_or_eof(reader)
        .await?
        .ok_or(FtpError::ConnectionClosed)
}

/// Like [`decode`] but reports a clean end of stream at a frame boundary as `None`.
pub async fn decode_or_eof<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FtpError>
where
    R: AsyncRead + Unpin,
{
    decode_inner(reader, &ProgressBar::hidden()).await
}

pub async fn decode_tracked<R>(reader: &mut R, progress: &ProgressBar) -> Result<Vec<u8>, FtpError>
where
    R: AsyncRead + Unpin,
{
    decode_inner(reader, progress)
        .await?
        .ok_or(FtpError::ConnectionClosed)
}

/// Reads one frame and interprets it as text; invalid UTF-8 is replaced, not rejected.
pub async fn read_text_frame<R>(reader: &mut R) -> Result<String, FtpError>
where
    R: AsyncRead + Unpin,
{
    let payload = decode(reader).await?;
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

async fn decode_inner<R>(
    reader: &mut R,
    progress: &ProgressBar,
) -> Result<Option<Vec<u8>>, FtpError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FtpError::TruncatedFrame {
                expected: LENGTH_PREFIX_LEN,
                received: filled,
            });
        }
        filled += n;
    }

    let length = parse_length_prefix(&prefix)?;
    progress.set_length(length as u64);

    // Grows with the bytes that arrive; the prefix alone never sizes the allocation.
    let mut payload = Vec::with_capacity(length.min(CHUNK_SIZE));
    let mut chunk = vec![0u8; length.clamp(1, CHUNK_SIZE)];
    while payload.len() < length {
        let want = (length - payload.len()).min(chunk.len());
        let n = reader.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(FtpError::TruncatedFrame {
                expected: length,
                received: payload.len(),
            });
        }
        payload.extend_from_slice(&chunk[..n]);
        progress.inc(n as u64);
    }

    log::trace!("Received frame of {} bytes", length);
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn prefix_is_zero_padded_decimal_length() {
        for len in [0usize, 1, 42, 9999, 100_000] {
            let frame = encode(&vec![b'x'; len]).unwrap();
            let expected = format!("{:010}", len);
            assert_eq!(&frame[..LENGTH_PREFIX_LEN], expected.as_bytes());
            assert_eq!(frame.len(), LENGTH_PREFIX_LEN + len);
        }
        assert_eq!(&length_prefix(1_234_567_890).unwrap(), b"1234567890");
        assert_eq!(&encode(b"OK").unwrap(), b"0000000002OK");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        if usize::BITS > 32 {
            let too_big = (MAX_PAYLOAD_LEN + 1) as usize;
            assert!(matches!(
                length_prefix(too_big),
                Err(FtpError::FrameTooLarge(n)) if n == too_big
            ));
        }
    }

    #[test]
    fn prefix_parsing() {
        assert_eq!(parse_length_prefix(b"0000000000").unwrap(), 0);
        assert_eq!(parse_length_prefix(b"0000012345").unwrap(), 12345);
        let bad_prefixes: [&[u8]; 4] = [b"00000abcde", b"-000000001", b" 000000001", b"+000000001"];
        for bad in bad_prefixes {
            assert!(matches!(
                parse_length_prefix(bad),
                Err(FtpError::MalformedLength(_))
            ));
        }
    }

    #[tokio::test]
    async fn round_trip_over_connected_pair() {
        for len in [0usize, 1, 9999, 100_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let (mut client, mut server) = duplex(4096);

            let sent = payload.clone();
            let writer = tokio::spawn(async move {
                write_frame(&mut client, &sent).await.unwrap();
                client
            });

            let received = decode(&mut server).await.unwrap();
            writer.await.unwrap();
            assert_eq!(received, payload, "length {len}");
        }
    }

    #[tokio::test]
    async fn tracked_transfer_reports_progress() {
        let payload = vec![7u8; 200_000];
        let (mut client, mut server) = duplex(8192);

        let sent = payload.clone();
        let writer = tokio::spawn(async move {
            let progress = ProgressBar::hidden();
            write_frame_tracked(&mut client, &sent, &progress).await.unwrap();
            progress.position()
        });

        let progress = ProgressBar::hidden();
        let received = decode_tracked(&mut server, &progress).await.unwrap();
        assert_eq!(received, payload);
        assert_eq!(progress.position(), 200_000);
        assert_eq!(writer.await.unwrap(), 200_000);
    }

    #[tokio::test]
    async fn frames_are_consumed_one_at_a_time() {
        let mut wire = encode(b"OK").unwrap();
        wire.extend(encode(b"40000").unwrap());
        let mut input: &[u8] = &wire;

        assert_eq!(read_text_frame(&mut input).await.unwrap(), "OK");
        assert_eq!(read_text_frame(&mut input).await.unwrap(), "40000");
        assert!(decode_or_eof(&mut input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_prefix() {
        let mut input: &[u8] = b"00000abcdehello";
        assert!(matches!(
            decode(&mut input).await,
            Err(FtpError::MalformedLength(_))
        ));
    }

    #[tokio::test]
    async fn truncated_payload() {
        let mut input: &[u8] = b"0000000010abc";
        assert!(matches!(
            decode(&mut input).await,
            Err(FtpError::TruncatedFrame {
                expected: 10,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn truncated_prefix() {
        let mut input: &[u8] = b"00001";
        assert!(matches!(
            decode(&mut input).await,
            Err(FtpError::TruncatedFrame {
                expected: LENGTH_PREFIX_LEN,
                received: 5
            })
        ));
    }

    #[tokio::test]
    async fn clean_end_of_stream() {
        let mut input: &[u8] = b"";
        assert!(decode_or_eof(&mut input).await.unwrap().is_none());

        let mut input: &[u8] = b"";
        assert!(matches!(
            decode(&mut input).await,
            Err(FtpError::ConnectionClosed)
        ));
    }

    #[test]
    fn command_codes() {
        assert_eq!(CommandCode::from_code(1), Some(CommandCode::Fetch));
        assert_eq!(CommandCode::from_code(4), Some(CommandCode::Quit));
        assert_eq!(CommandCode::from_code(99), None);
        assert_eq!(CommandCode::from_code(0), None);
        assert_eq!(CommandCode::Store.code(), 2);

        let fetch = Command::Fetch {
            file_name: "a.txt".into(),
        };
        assert_eq!(fetch.code(), CommandCode::Fetch);
        assert_eq!(fetch.argument(), Some("a.txt"));
        assert_eq!(Command::List.argument(), None);
    }

    #[test]
    fn replies() {
        assert_eq!(Reply::Ok { port: 4321 }.into_data_port().unwrap(), 4321);
        assert!(matches!(
            Reply::Err("nope".into()).into_data_port(),
            Err(FtpError::ServerRejected(m)) if m == "nope"
        ));
        assert_eq!(parse_port("40001").unwrap(), 40001);
        assert!(parse_port("70000").is_err());
    }
}
