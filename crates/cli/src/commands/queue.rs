use rollerd_api::{ReturnCode, Verb};

use crate::client::RollctlClient;
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Runqueue;

#[derive(Clone, Debug, clap::Args)]
pub struct Queuelist;

#[derive(Clone, Debug, clap::Args)]
pub struct Queuestatus;

impl Runqueue {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Runqueue, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("rollerd checking rollrec queue");
            Ok(())
        } else {
            Err(format!("couldn't force the rollrec queue: {msg}"))
        }
    }
}

impl Queuelist {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Queuelist, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("{msg}");
            Ok(())
        } else {
            Err(format!("rollerd error response: <{msg}>"))
        }
    }
}

impl Queuestatus {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Queuestatus, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("{msg}");
            Ok(())
        } else {
            Err(format!("rollerd error response: <{msg}>"))
        }
    }
}
