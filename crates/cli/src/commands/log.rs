use clap::builder::PossibleValue;
use rollerd_api::{ReturnCode, Verb};

use crate::client::RollctlClient;
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Logfile {
    path: String,
}

/// rollerd's logging levels, from the quietest to the noisiest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Never,
    Tmi,
    Expire,
    Info,
    Phase,
    Err,
    Fatal,
    Always,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Never => "never",
            LogLevel::Tmi => "tmi",
            LogLevel::Expire => "expire",
            LogLevel::Info => "info",
            LogLevel::Phase => "phase",
            LogLevel::Err => "err",
            LogLevel::Fatal => "fatal",
            LogLevel::Always => "always",
        }
    }
}

impl clap::ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            LogLevel::Never,
            LogLevel::Tmi,
            LogLevel::Expire,
            LogLevel::Info,
            LogLevel::Phase,
            LogLevel::Err,
            LogLevel::Fatal,
            LogLevel::Always,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.as_str()))
    }
}

#[derive(Clone, Debug, clap::Args)]
pub struct Loglevel {
    level: LogLevel,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogTz {
    Gmt,
    Local,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Logtz {
    tz: LogTz,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum PhaseMsgLength {
    Long,
    Short,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Phasemsg {
    length: PhaseMsgLength,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Zonelog {
    /// `zone:loglevel` pairs.
    #[arg(required = true)]
    pairs: Vec<String>,
}

impl Logfile {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Logfile, &self.path, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd log file set to {}", self.path);
            Ok(())
        } else {
            Err(format!("log-file set failed: {msg}"))
        }
    }
}

impl Loglevel {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Loglevel, self.level.as_str(), group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd log level set to {}", self.level.as_str());
            Ok(())
        } else {
            Err(format!("log-level set failed: {msg}"))
        }
    }
}

impl Logtz {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = match self.tz {
            LogTz::Gmt => "gmt",
            LogTz::Local => "local",
        };
        let (code, msg) = client.send(Verb::Logtz, data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd log timezone set to {data}");
            Ok(())
        } else {
            Err(format!("log-tz set failed: {msg}"))
        }
    }
}

impl Phasemsg {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = match self.length {
            PhaseMsgLength::Long => "long",
            PhaseMsgLength::Short => "short",
        };
        let (code, msg) = client.send(Verb::Phasemsg, data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd phasemsg set to {data}");
            Ok(())
        } else {
            Err(format!("phasemsg set failed: {msg}"))
        }
    }
}

impl Zonelog {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for pair in &self.pairs {
            if !pair.contains(':') {
                println!("improperly formed zone:loglevel pair: {pair}");
                failures += 1;
                continue;
            }
            let (code, msg) = client.send(Verb::Zonelog, pair, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("rollerd logging changed for {pair}");
            } else {
                println!("zonelog failed: {msg}");
                failures += 1;
            }
        }
        if failures == 0 {
            Ok(())
        } else {
            Err(format!("{failures} pair(s) failed"))
        }
    }
}
