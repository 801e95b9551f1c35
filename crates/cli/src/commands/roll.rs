use rollerd_api::{ReturnCode, Verb};

use crate::client::RollctlClient;
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct RollKsk {
    /// Zone(s) to force into a KSK rollover.
    #[arg(required = true)]
    zones: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct RollZsk {
    /// Zone(s) to force into a ZSK rollover.
    #[arg(required = true)]
    zones: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct RollZone {
    /// Suspended zone(s) to restart.
    #[arg(required = true)]
    zones: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct RollAll;

#[derive(Clone, Debug, clap::Args)]
pub struct RollAllKsks;

#[derive(Clone, Debug, clap::Args)]
pub struct RollAllZsks;

#[derive(Clone, Debug, clap::Args)]
pub struct SkipZone {
    /// Zone(s) to stop rolling.
    #[arg(required = true)]
    zones: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct SkipAll;

#[derive(Clone, Debug, clap::Args)]
pub struct Rollrec {
    /// Rollrec file for rollerd to switch to.
    path: String,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Zonegroup {
    /// Zone group to show; omit to list all groups.
    group: Option<String>,
}

impl RollKsk {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for zone in &self.zones {
            let (code, msg) = client.send(Verb::Rollksk, zone, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("{msg}");
            } else {
                println!("unable to force KSK rollover process for {zone}: {msg}");
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

impl RollZsk {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for zone in &self.zones {
            let (code, msg) = client.send(Verb::Rollzsk, zone, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("{msg}");
            } else {
                println!("unable to force ZSK rollover process for {zone}: {msg}");
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

impl RollZone {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for zone in &self.zones {
            let (code, msg) = client.send(Verb::Rollzone, zone, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("rollover restarted for zone {zone}");
            } else {
                println!("unable to restart rollover for zone {zone}: {msg}");
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

impl RollAll {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Rollall, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("all suspended zones now resumed: {msg}");
            Ok(())
        } else {
            Err(msg)
        }
    }
}

impl RollAllKsks {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Rollallksks, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("all zones now in KSK rollover: {msg}");
            Ok(())
        } else {
            Err(msg)
        }
    }
}

impl RollAllZsks {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Rollallzsks, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("all zones now in ZSK rollover: {msg}");
            Ok(())
        } else {
            Err(msg)
        }
    }
}

impl SkipZone {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for zone in &self.zones {
            let (code, msg) = client.send(Verb::Skipzone, zone, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("rollover stopped for zone {zone}");
            } else {
                println!("unable to stop rollover for zone {zone}: {msg}");
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

impl SkipAll {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Skipall, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollover stopped for all zones: {msg}");
            Ok(())
        } else {
            Err(msg)
        }
    }
}

impl Rollrec {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Rollrec, &self.path, group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd now using rollrec file {}", self.path);
            Ok(())
        } else {
            Err(format!("couldn't set rollrec file: {msg}"))
        }
    }
}

impl Zonegroup {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = self.group.as_deref().unwrap_or("");
        let (code, msg) = client.send(Verb::Zonegroup, data, group).await?;
        println!("{msg}");
        if code == ReturnCode::Okay.code() {
            Ok(())
        } else {
            Err(msg)
        }
    }
}
