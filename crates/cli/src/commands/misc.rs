use rollerd_api::{ReturnCode, Verb};

use crate::client::RollctlClient;
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Mergerrfs {
    /// Rollrec files to merge into the currently loaded one.
    #[arg(required = true)]
    files: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Shutdown;

#[derive(Clone, Debug, clap::Args)]
pub struct Signzone {
    /// Zone(s) to sign, without rolling any keys.
    #[arg(required = true)]
    zones: Vec<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SignzonesScope {
    All,
    Active,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Signzones {
    scope: SignzonesScope,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Sleeptime {
    seconds: u64,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Splitrrf {
    /// Rollrec entries to move into the new, split-off file.
    #[arg(required = true)]
    entries: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Zsargs {
    /// `zonesigner` arguments, followed by the zone(s) they apply to.
    #[arg(required = true)]
    args: Vec<String>,
}

impl Mergerrfs {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = self.files.join(":");
        let (code, msg) = client.send(Verb::Mergerrfs, &data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd merged the rollrec files");
            Ok(())
        } else {
            Err(format!("rollerd did not merge the rollrec files: {msg}"))
        }
    }
}

impl Shutdown {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Shutdown, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("{msg}");
            Ok(())
        } else {
            Err(format!("shutdown failed: {msg}"))
        }
    }
}

impl Signzone {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for zone in &self.zones {
            let (code, msg) = client.send(Verb::Signzone, zone, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("zone {zone} signed");
            } else {
                println!("unable to sign zone {zone}: {msg}");
                failures += 1;
            }
        }
        if failures == 0 {
            Ok(())
        } else {
            Err(format!("{failures} zone(s) failed"))
        }
    }
}

impl Signzones {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = match self.scope {
            SignzonesScope::All => "all",
            SignzonesScope::Active => "active",
        };
        let (code, msg) = client.send(Verb::Signzones, data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("all zones signed");
            Ok(())
        } else {
            Err(format!("unable to sign all zones: {msg}"))
        }
    }
}

impl Sleeptime {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = self.seconds.to_string();
        let (code, msg) = client.send(Verb::Sleeptime, &data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd sleep time set to {}", self.seconds);
            Ok(())
        } else {
            Err(format!("sleep-time set failed: {msg}"))
        }
    }
}

impl Splitrrf {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = self.entries.join(":");
        let (code, msg) = client.send(Verb::Splitrrf, &data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd split the rollrec file");
            Ok(())
        } else {
            Err(format!("rollerd did not split the rollrec file: {msg}"))
        }
    }
}

impl Zsargs {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = self.args.join(",");
        let (code, msg) = client.send(Verb::Zsargs, &data, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("{msg}");
            Ok(())
        } else {
            Err(format!("zsargs failed: {msg}"))
        }
    }
}
