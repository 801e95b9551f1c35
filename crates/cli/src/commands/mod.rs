//! One `clap::Subcommand` variant per control-channel verb (spec 6),
//! grouped into files by topic the way `cascade`'s `crates/cli/src/commands`
//! splits `debug`/`keyset`/`status`/`template`.

pub mod dspub;
pub mod log;
pub mod misc;
pub mod queue;
pub mod roll;
pub mod status;

use crate::client::RollctlClient;

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Command {
    /// Get rollerd's status.
    Status(status::Status),
    /// Get status of individual zones.
    Zonestatus(status::Zonestatus),
    /// Turn rollerd's graphical display on or off.
    Display(status::Display),

    /// Tell rollerd that a zone's parent has published its DS record.
    Dspub(dspub::Dspub),
    /// Tell rollerd that all zones' parents have published DS records.
    #[command(name = "dspuball")]
    DspubAll(dspub::DspubAll),

    /// Set rollerd's log file.
    Logfile(log::Logfile),
    /// Set rollerd's logging level.
    Loglevel(log::Loglevel),
    /// Set rollerd's logging timezone.
    Logtz(log::Logtz),
    /// Set rollerd's phase-message length.
    Phasemsg(log::Phasemsg),
    /// Set the per-zone logging level for one or more zones.
    Zonelog(log::Zonelog),

    /// Resume all suspended zones.
    Rollall(roll::RollAll),
    /// Start a KSK rollover for all zones.
    Rollallksks(roll::RollAllKsks),
    /// Start a ZSK rollover for all zones.
    Rollallzsks(roll::RollAllZsks),
    /// Force a KSK rollover for the given zone(s).
    Rollksk(roll::RollKsk),
    /// Switch rollerd to a different rollrec file.
    Rollrec(roll::Rollrec),
    /// Restart a suspended zone's rollover.
    Rollzone(roll::RollZone),
    /// Force a ZSK rollover for the given zone(s).
    Rollzsk(roll::RollZsk),
    /// Stop all zones from rolling.
    Skipall(roll::SkipAll),
    /// Stop the given zone(s) from rolling.
    Skipzone(roll::SkipZone),
    /// Show the current zone groups.
    Zonegroup(roll::Zonegroup),

    /// Run the soon queue immediately.
    Runqueue(queue::Runqueue),
    /// List zones in the soon queue.
    Queuelist(queue::Queuelist),
    /// Status of the soon-queue event handler.
    Queuestatus(queue::Queuestatus),

    /// Merge a set of rollrec files into the current one.
    Mergerrfs(misc::Mergerrfs),
    /// Ask rollerd to shut down.
    Shutdown(misc::Shutdown),
    /// Sign the given zone(s), without rolling any keys.
    Signzone(misc::Signzone),
    /// Sign all ("all") or only active ("active") zones.
    Signzones(misc::Signzones),
    /// Set rollerd's sleep time between scans.
    Sleeptime(misc::Sleeptime),
    /// Split the current rollrec file in two.
    Splitrrf(misc::Splitrrf),
    /// Set zonesigner arguments for the given zone(s).
    Zsargs(misc::Zsargs),
}

impl Command {
    pub async fn execute(self, client: RollctlClient, group: bool) -> Result<(), String> {
        match self {
            Command::Status(c) => c.execute(client, group).await,
            Command::Zonestatus(c) => c.execute(client, group).await,
            Command::Display(c) => c.execute(client, group).await,
            Command::Dspub(c) => c.execute(client, group).await,
            Command::DspubAll(c) => c.execute(client, group).await,
            Command::Logfile(c) => c.execute(client, group).await,
            Command::Loglevel(c) => c.execute(client, group).await,
            Command::Logtz(c) => c.execute(client, group).await,
            Command::Phasemsg(c) => c.execute(client, group).await,
            Command::Zonelog(c) => c.execute(client, group).await,
            Command::Rollall(c) => c.execute(client, group).await,
            Command::Rollallksks(c) => c.execute(client, group).await,
            Command::Rollallzsks(c) => c.execute(client, group).await,
            Command::Rollksk(c) => c.execute(client, group).await,
            Command::Rollrec(c) => c.execute(client, group).await,
            Command::Rollzone(c) => c.execute(client, group).await,
            Command::Rollzsk(c) => c.execute(client, group).await,
            Command::Skipall(c) => c.execute(client, group).await,
            Command::Skipzone(c) => c.execute(client, group).await,
            Command::Zonegroup(c) => c.execute(client, group).await,
            Command::Runqueue(c) => c.execute(client, group).await,
            Command::Queuelist(c) => c.execute(client, group).await,
            Command::Queuestatus(c) => c.execute(client, group).await,
            Command::Mergerrfs(c) => c.execute(client, group).await,
            Command::Shutdown(c) => c.execute(client, group).await,
            Command::Signzone(c) => c.execute(client, group).await,
            Command::Signzones(c) => c.execute(client, group).await,
            Command::Sleeptime(c) => c.execute(client, group).await,
            Command::Splitrrf(c) => c.execute(client, group).await,
            Command::Zsargs(c) => c.execute(client, group).await,
        }
    }
}
