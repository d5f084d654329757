use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tokio::task::spawn_blocking;

use crate::fetch::{partial_path, RemoteStore};
use crate::{Error, Result};

/// Reads the FTP token: the first line of the file, trimmed.
pub fn load_token(path: &Path) -> Result<String> {
    let token = fs::read_to_string(path)?
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if token.is_empty() {
        return Err(Error::Auth(format!("empty token in {}", path.display())));
    }
    Ok(token)
}

/// A logged-in FTP session listing the server root.
///
/// `suppaftp`'s stream is blocking, so every call moves the stream onto the blocking pool
/// and back.
pub struct FtpStore {
    stream: Option<FtpStream>,
}

impl FtpStore {
    /// Logs in and switches to binary transfers at the server root. If that setup fails
    /// after login, the session is logged out before the error is returned.
    pub async fn connect((host, port): (&str, u16), user: &str, token: &str) -> Result<Self> {
        let (host, user, token) = (host.to_string(), user.to_string(), token.to_string());
        let stream = spawn_blocking(move || -> Result<FtpStream> {
            let mut ftp = FtpStream::connect((host.as_str(), port))?;
            ftp.login(&user, &token)
                .map_err(|e| Error::Auth(format!("{user}@{host}: {e}")))?;
            log::info!("Logged in to {host} as {user}");

            let prepared = ftp
                .transfer_type(FileType::Binary)
                .and_then(|_| ftp.cwd("/"));
            if let Err(e) = prepared {
                match ftp.quit() {
                    Ok(()) => log::info!("Logged out of FTP"),
                    Err(quit) => log::warn!("Couldn't log out of {host}: {quit}"),
                }
                return Err(e.into());
            }
            Ok(ftp)
        })
        .await??;

        Ok(FtpStore {
            stream: Some(stream),
        })
    }

    async fn with_stream<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T> + Send + 'static,
    {
        let mut stream = self.stream.take().ok_or_else(|| Error::TransferFailure {
            resource: "ftp session".to_string(),
            reason: "session already closed".to_string(),
        })?;
        let (stream, res) = spawn_blocking(move || {
            let res = op(&mut stream);
            (stream, res)
        })
        .await?;
        self.stream = Some(stream);
        res
    }
}

impl RemoteStore for FtpStore {
    async fn list(&mut self) -> Result<Vec<String>> {
        self.with_stream(|ftp| Ok(ftp.nlst(None)?)).await
    }

    async fn download(&mut self, name: &str, dest: &Path) -> Result<u64> {
        let name = name.to_string();
        let dest: PathBuf = dest.to_path_buf();
        self.with_stream(move |ftp| {
            let part = partial_path(&dest);
            let mut file = File::create(&part)?;
            let written = ftp.retr(&name, |reader| {
                io::copy(reader, &mut file).map_err(FtpError::ConnectionError)
            })?;
            drop(file);
            fs::rename(&part, &dest)?;
            Ok(written)
        })
        .await
    }

    /// Logs out. Safe to call more than once.
    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        spawn_blocking(move || stream.quit()).await??;
        log::info!("Logged out of FTP");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// One-connection FTP server that accepts the login, refuses `TYPE`, and records every
    /// command it receives.
    fn refusing_server() -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(conn.try_clone().unwrap());
            let mut writer = conn;
            writer.write_all(b"220 ready\r\n").unwrap();

            let mut commands = Vec::new();
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                let command = line.trim().to_string();
                line.clear();
                let reply: &[u8] = if command.starts_with("USER") {
                    b"331 Password required\r\n"
                } else if command.starts_with("PASS") {
                    b"230 Logged in\r\n"
                } else if command.starts_with("QUIT") {
                    b"221 Bye\r\n"
                } else {
                    b"504 Not supported\r\n"
                };
                writer.write_all(reply).unwrap();
                let done = command.starts_with("QUIT");
                commands.push(command);
                if done {
                    break;
                }
            }
            commands
        });
        (port, handle)
    }

    #[tokio::test]
    async fn failed_setup_after_login_still_logs_out() {
        let (port, server) = refusing_server();

        let res = FtpStore::connect(("127.0.0.1", port), "oxford", "s3cret-token").await;

        assert!(matches!(res, Err(Error::Ftp(_))));
        let commands = server.join().unwrap();
        assert_eq!(commands.first().map(String::as_str), Some("USER oxford"));
        assert_eq!(commands.last().map(String::as_str), Some("QUIT"));
    }

    #[test]
    fn token_is_first_line_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftp_token");
        fs::write(&path, "  s3cret-token \nsecond line\n").unwrap();
        assert_eq!(load_token(&path).unwrap(), "s3cret-token");
    }

    #[test]
    fn empty_or_missing_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftp_token");
        fs::write(&path, "\n").unwrap();
        assert!(matches!(load_token(&path), Err(Error::Auth(_))));
        assert!(matches!(
            load_token(&dir.path().join("absent")),
            Err(Error::Io(_))
        ));
    }
}
