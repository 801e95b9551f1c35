use rollerd_api::{ReturnCode, Verb};

use crate::client::RollctlClient;
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Status;

#[derive(Clone, Debug, clap::Args)]
pub struct Zonestatus;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum DisplayState {
    On,
    Off,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Display {
    state: DisplayState,
}

impl Status {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Status, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("{msg}");
            Ok(())
        } else {
            Err(format!("status failed: {msg}"))
        }
    }
}

impl Zonestatus {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let (code, msg) = client.send(Verb::Zonestatus, "", group).await?;
        if code == ReturnCode::Okay.code() {
            println!("{msg}");
            Ok(())
        } else {
            Err(format!("zonestatus failed: {msg}"))
        }
    }
}

impl Display {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        let data = match self.state {
            DisplayState::On => "1",
            DisplayState::Off => "0",
        };
        let (code, _msg) = client.send(Verb::Display, data, group).await?;
        if code == ReturnCode::Okay.code() {
            match self.state {
                DisplayState::On => println!("rollerd display started"),
                DisplayState::Off => println!("rollerd display stopped"),
            }
            Ok(())
        } else {
            Err(format!(
                "rollerd display not {}",
                match self.state {
                    DisplayState::On => "started",
                    DisplayState::Off => "stopped",
                }
            ))
        }
    }
}
