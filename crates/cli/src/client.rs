//! A thin wrapper around the control-channel wire protocol.
//!
//! Unlike the teacher's `CascadeApiClient`, which keeps a persistent HTTP
//! connection, `RollctlClient` opens a fresh stream for every command and
//! closes it once the response is read, mirroring the original
//! `rollmgr_sendcmd`/`rollmgr_getresp` pair: one connect-send-recv-close
//! cycle per invocation.

use std::net::SocketAddr;

use camino::Utf8PathBuf;
use rollerd_api::{read_response, write_frame, Command, GROUP_PREFIX};
use tokio::net::{TcpStream, UnixStream};

/// Where rollerd's control channel is listening.
#[derive(Clone, Debug)]
pub enum Transport {
    Socket(Utf8PathBuf),
    Tcp(SocketAddr),
}

#[derive(Clone, Debug)]
pub struct RollctlClient {
    transport: Transport,
}

impl RollctlClient {
    pub fn new(transport: Transport) -> Self {
        RollctlClient { transport }
    }

    /// Sends one command and returns its `(return_code, message)`.
    ///
    /// `group` prepends the `g-` prefix (spec 4.E); the caller is
    /// responsible for only setting it on a groupable verb, since the
    /// daemon rejects `g-` on a verb outside the group-allowed set.
    pub async fn send(&self, verb: rollerd_api::Verb, data: &str, group: bool) -> Result<(u8, String), String> {
        let cmd = if group {
            format!("{GROUP_PREFIX}{verb}")
        } else {
            verb.to_string()
        };
        // Parse is only used to validate the constructed line matches what
        // the daemon will accept; a mismatch here is a programming error.
        debug_assert!(Command::parse(&cmd).is_some());

        match &self.transport {
            Transport::Socket(path) => {
                let mut stream = UnixStream::connect(path.as_std_path())
                    .await
                    .map_err(|e| format!("could not connect to {path}: {e}"))?;
                write_frame(&mut stream, &cmd, data)
                    .await
                    .map_err(|e| format!("could not send command: {e}"))?;
                read_response(&mut stream)
                    .await
                    .map_err(|e| format!("could not read response: {e}"))
            }
            Transport::Tcp(addr) => {
                let mut stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| format!("could not connect to {addr}: {e}"))?;
                write_frame(&mut stream, &cmd, data)
                    .await
                    .map_err(|e| format!("could not send command: {e}"))?;
                read_response(&mut stream)
                    .await
                    .map_err(|e| format!("could not read response: {e}"))
            }
        }
    }
}
