use rollerd_api::{ReturnCode, Verb};

use crate::client::RollctlClient;
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Dspub {
    /// Zone(s) whose parent has published the DS record.
    #[arg(required = true)]
    zones: Vec<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct DspubAll;

impl Dspub {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let mut failures = 0;
        for zone in &self.zones {
            let (code, msg) = client.send(Verb::Dspub, zone, group).await?;
            if code == ReturnCode::Okay.code() {
                println!("rollerd informed that parent has published DS record for zone {zone}");
            } else {
                println!("{msg}");
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

impl DspubAll {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Dspuball, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!(
                "rollerd informed that parents have published DS records for all zones in KSK rollover phase 5"
            );
            Ok(())
        } else {
            Err(msg)
        }
    }
}
