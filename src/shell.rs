use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::{client::Client, error::FtpError};

const PROMPT: &str = "ftp> ";

const HELP: &str = "\
get [file name]
put [file name]
ls
help
quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Get(String),
    Put(String),
    Ls,
    Help,
    Quit,
}

/// Parses one prompt line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<UserCommand>, FtpError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };
    if args.len() > 1 {
        return Err(usage("Too many arguments. Type 'help' for the command list"));
    }

    let command = match (verb, args.first()) {
        ("get", Some(name)) => UserCommand::Get(name.to_string()),
        ("put", Some(name)) => UserCommand::Put(name.to_string()),
        ("get" | "put", None) => {
            return Err(usage(&format!("Usage: {} [file name]", verb)));
        }
        ("ls", None) => UserCommand::Ls,
        ("help", None) => UserCommand::Help,
        ("quit", None) => UserCommand::Quit,
        ("ls" | "help" | "quit", Some(_)) => {
            return Err(usage(&format!("{} takes no arguments", verb)));
        }
        _ => return Err(usage("Unknown command. Type 'help' for the command list")),
    };
    Ok(Some(command))
}

fn usage(message: &str) -> FtpError {
    FtpError::LocalPrecondition(message.to_string())
}

/// Runs one command; returns `false` once the session should end.
pub async fn execute(client: &mut Client, command: UserCommand) -> Result<bool, FtpError> {
    match command {
        UserCommand::Get(name) => {
            let path = client.fetch(&name).await?;
            println!("Downloaded {} to {}", name, path.display());
        }
        UserCommand::Put(name) => {
            let bytes = client.store(&name).await?;
            println!("Uploaded {} ({} bytes)", name, bytes);
        }
        UserCommand::Ls => {
            let listing = client.list().await?;
            println!("{}", listing.directory);
            print!("{}", listing.text);
        }
        UserCommand::Help => println!("{}", HELP),
        UserCommand::Quit => {
            client.quit().await?;
            return Ok(false);
        }
    }
    Ok(true)
}

/// Interactive prompt loop over stdin. End of input counts as `quit`.
///
/// Rejections and local precondition failures are printed and the prompt
/// comes back. Once the control session is gone the error is returned
/// unprinted, for the caller to report.
pub async fn run(mut client: Client) -> Result<(), FtpError> {
    run_with(&mut client, BufReader::new(tokio::io::stdin())).await
}

pub async fn run_with<R>(client: &mut Client, input: R) -> Result<(), FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            client.quit().await?;
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match execute(client, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if !client.is_connected() => return Err(e),
            Err(e) => eprintln!("{}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ClientConfig, error::ErrorClass, test_helpers::start_server};
    use std::{net::SocketAddr, path::Path, time::Duration};

    async fn connect(addr: SocketAddr, directory: &Path) -> Client {
        Client::connect(&ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            directory: directory.to_path_buf(),
            data_timeout: Duration::from_secs(2),
            progress: false,
        })
        .await
        .unwrap()
    }

    #[test]
    fn parses_verbs() {
        assert_eq!(
            parse_line("get a.txt").unwrap(),
            Some(UserCommand::Get("a.txt".into()))
        );
        assert_eq!(
            parse_line("  put   notes.md ").unwrap(),
            Some(UserCommand::Put("notes.md".into()))
        );
        assert_eq!(parse_line("ls").unwrap(), Some(UserCommand::Ls));
        assert_eq!(parse_line("help").unwrap(), Some(UserCommand::Help));
        assert_eq!(parse_line("quit").unwrap(), Some(UserCommand::Quit));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn rejects_wrong_arity_locally() {
        for line in ["get", "put", "get a b", "ls extra", "quit now", "put a.txt b.txt"] {
            let err = parse_line(line).unwrap_err();
            assert!(
                matches!(err, FtpError::LocalPrecondition(_)),
                "{line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_unknown_verbs() {
        let err = parse_line("delete a.txt").unwrap_err();
        assert!(err.to_string().contains("Unknown command"));
    }

    #[tokio::test]
    async fn rejected_get_keeps_client_connected() {
        let served = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (addr, _) = start_server(served.path()).await;
        let mut client = connect(addr, local.path()).await;

        let err = execute(&mut client, UserCommand::Get("missing.txt".into()))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Rejected);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn quit_ends_the_session() {
        let served = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (addr, _) = start_server(served.path()).await;
        let mut client = connect(addr, local.path()).await;

        assert!(execute(&mut client, UserCommand::Help).await.unwrap());
        assert!(!execute(&mut client, UserCommand::Quit).await.unwrap());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn loop_survives_recoverable_errors_and_quits_at_eof() {
        let served = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let (addr, stats) = start_server(served.path()).await;
        let mut client = connect(addr, local.path()).await;

        let input: &[u8] = b"get missing.txt\nput nothing.txt\nbogus\nget a b\n\nls\n";
        run_with(&mut client, input).await.unwrap();

        // Only `ls` reached a data channel, and end of input sent QUIT.
        assert_eq!(stats.data_channels_opened(), 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn loop_stops_when_control_connection_dies() {
        let local = tempfile::tempdir().unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = connect(addr, local.path()).await;
        server.await.unwrap();

        let input: &[u8] = b"ls\nls\n";
        let err = run_with(&mut client, input).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Connectivity);
        assert!(!client.is_connected());
    }
}
