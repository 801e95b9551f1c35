//! Wire protocol types shared between `rollerd` and `rollctl` (spec 4.E,
//! 6): the command verbs, the fixed return codes, and the CRLF-framed
//! request/response encoding.
//!
//! Framing reads byte-by-byte watching for the literal two-byte sequence
//! `\r\n`, mirroring the original `rollmgr_getresp`/`rollmgr_sendcmd` loop
//! (`original_source/dnssec/rollmgr.py`): a response's message field (e.g.
//! `rollcmd_status`'s multi-line block) may itself contain bare `\n`
//! bytes, so framing cannot use a plain line reader.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The group-command prefix: `g-rollksk` runs `rollksk` once per active
/// rollrec entry.
pub const GROUP_PREFIX: &str = "g-";

const EOL: &str = "\r\n";

/// A control-channel verb, without the optional `g-` group prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Display,
    Dspub,
    Dspuball,
    Logfile,
    Loglevel,
    Logmsg,
    Logtz,
    Mergerrfs,
    Phasemsg,
    Rollall,
    Rollallksks,
    Rollallzsks,
    Rollksk,
    Rollrec,
    Rollzone,
    Rollzsk,
    Runqueue,
    Queuelist,
    Queuestatus,
    Shutdown,
    Signzone,
    Signzones,
    Skipall,
    Skipzone,
    Sleeptime,
    Splitrrf,
    Status,
    Zonegroup,
    Zonelog,
    Zonestatus,
    Zsargs,
}

impl Verb {
    pub const ALL: [Verb; 30] = [
        Verb::Display,
        Verb::Dspub,
        Verb::Dspuball,
        Verb::Logfile,
        Verb::Loglevel,
        Verb::Logmsg,
        Verb::Logtz,
        Verb::Mergerrfs,
        Verb::Phasemsg,
        Verb::Rollall,
        Verb::Rollallksks,
        Verb::Rollallzsks,
        Verb::Rollksk,
        Verb::Rollrec,
        Verb::Rollzone,
        Verb::Rollzsk,
        Verb::Runqueue,
        Verb::Queuelist,
        Verb::Queuestatus,
        Verb::Shutdown,
        Verb::Signzone,
        Verb::Signzones,
        Verb::Skipall,
        Verb::Skipzone,
        Verb::Sleeptime,
        Verb::Splitrrf,
        Verb::Status,
        Verb::Zonegroup,
        Verb::Zonelog,
        Verb::Zonestatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Display => "rollcmd_display",
            Verb::Dspub => "rollcmd_dspub",
            Verb::Dspuball => "rollcmd_dspuball",
            Verb::Logfile => "rollcmd_logfile",
            Verb::Loglevel => "rollcmd_loglevel",
            Verb::Logmsg => "rollcmd_logmsg",
            Verb::Logtz => "rollcmd_logtz",
            Verb::Mergerrfs => "rollcmd_mergerrfs",
            Verb::Phasemsg => "rollcmd_phasemsg",
            Verb::Rollall => "rollcmd_rollall",
            Verb::Rollallksks => "rollcmd_rollallksks",
            Verb::Rollallzsks => "rollcmd_rollallzsks",
            Verb::Rollksk => "rollcmd_rollksk",
            Verb::Rollrec => "rollcmd_rollrec",
            Verb::Rollzone => "rollcmd_rollzone",
            Verb::Rollzsk => "rollcmd_rollzsk",
            Verb::Runqueue => "rollcmd_runqueue",
            Verb::Queuelist => "rollcmd_queuelist",
            Verb::Queuestatus => "rollcmd_queuestatus",
            Verb::Shutdown => "rollcmd_shutdown",
            Verb::Signzone => "rollcmd_signzone",
            Verb::Signzones => "rollcmd_signzones",
            Verb::Skipall => "rollcmd_skipall",
            Verb::Skipzone => "rollcmd_skipzone",
            Verb::Sleeptime => "rollcmd_sleeptime",
            Verb::Splitrrf => "rollcmd_splitrrf",
            Verb::Status => "rollcmd_status",
            Verb::Zonegroup => "rollcmd_zonegroup",
            Verb::Zonelog => "rollcmd_zonelog",
            Verb::Zonestatus => "rollcmd_zonestatus",
            Verb::Zsargs => "rollcmd_zsargs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().chain([Verb::Zsargs]).find(|v| v.as_str() == s)
    }

    /// Whether this verb is in the group-allowed set (spec 4.E): the set
    /// of verbs the daemon will run once per active rollrec entry when
    /// prefixed with `g-`.
    pub fn is_groupable(self) -> bool {
        matches!(
            self,
            Verb::Dspub | Verb::Rollksk | Verb::Rollzone | Verb::Rollzsk | Verb::Skipzone
        )
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command line: the verb, whether it carried the `g-` group
/// prefix, and the request's data field.
#[derive(Clone, Debug)]
pub struct Command {
    pub verb: Verb,
    pub grouped: bool,
}

impl Command {
    pub fn parse(cmd_line: &str) -> Option<Self> {
        if let Some(rest) = cmd_line.strip_prefix(GROUP_PREFIX) {
            let verb = Verb::parse(rest)?;
            if !verb.is_groupable() {
                return None;
            }
            Some(Command { verb, grouped: true })
        } else {
            Some(Command {
                verb: Verb::parse(cmd_line)?,
                grouped: false,
            })
        }
    }
}

/// The control channel's fixed return codes (spec 4.E, 6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnCode {
    Okay = 0,
    BadLevel = 1,
    BadFile = 2,
    BadSleep = 3,
    BadRollrec = 4,
    BadTz = 5,
    RrfOpen = 6,
    NoZones = 7,
    BadZone = 8,
    BadZoneData = 9,
    Display = 10,
    KskRoll = 11,
    ZskRoll = 12,
    NoArgs = 13,
    BadEvent = 14,
    BadZoneGroup = 15,
}

impl ReturnCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Reads one CRLF-terminated field: bytes are read one at a time until
/// the literal sequence `\r\n` is seen, which is then stripped. A bare
/// `\n` inside the field (e.g. a multi-line status block) does not
/// terminate it.
pub async fn read_field<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before CRLF terminator",
            ));
        }
        buf.push(byte[0]);
        let len = buf.len();
        if len >= 2 && buf[len - 2] == b'\r' && buf[len - 1] == b'\n' {
            buf.truncate(len - 2);
            break;
        }
    }
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// Reads a `CMD\r\nDATA\r\n` request.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<(String, String)> {
    let cmd = read_field(reader).await?;
    let data = read_field(reader).await?;
    Ok((cmd, data))
}

/// Reads a `RETCODE\r\nMSG\r\n` response.
pub async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<(u8, String)> {
    let code_field = read_field(reader).await?;
    let msg = read_field(reader).await?;
    let code = code_field
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed return code"))?;
    Ok((code, msg))
}

/// Writes `first\r\nsecond\r\n`, used for both request and response
/// framing.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    first: &str,
    second: &str,
) -> io::Result<()> {
    let mut payload = String::with_capacity(first.len() + second.len() + 4);
    payload.push_str(first);
    payload.push_str(EOL);
    payload.push_str(second);
    payload.push_str(EOL);
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_round_trips_through_as_str_and_parse() {
        for verb in Verb::ALL {
            assert_eq!(Verb::parse(verb.as_str()), Some(verb));
        }
        assert_eq!(Verb::parse(Verb::Zsargs.as_str()), Some(Verb::Zsargs));
    }

    #[test]
    fn group_prefix_requires_groupable_verb() {
        assert!(Command::parse("g-rollcmd_rollksk").is_some());
        assert!(Command::parse("g-rollcmd_status").is_none());
    }

    #[test]
    fn return_codes_match_fixed_values() {
        assert_eq!(ReturnCode::Okay.code(), 0);
        assert_eq!(ReturnCode::ZskRoll.code(), 12);
        assert_eq!(ReturnCode::BadZoneGroup.code(), 15);
    }

    #[tokio::test]
    async fn read_field_stops_only_on_crlf() {
        let input = b"line one\nline two\r\n".to_vec();
        let mut cursor = std::io::Cursor::new(input);
        let field = read_field(&mut cursor).await.unwrap();
        assert_eq!(field, "line one\nline two");
    }
}
