//! Daemon configuration: CLI flags, the `dtconfig` key/value file, and
//! the merged, typed [`Config`] everything else in the daemon reads from
//! (spec 6). CLI flags win over the configuration file, which wins over
//! built-in defaults.
//!
//! The configuration file is deliberately *not* TOML: spec.md §6 fixes
//! its wire format as line-oriented `key value`, `#`/`;` comments, which
//! is what the original `dnssec-tools.conf` looks like
//! (`original_source/dnssec/dnssec-tools/lib/conf.py`). It is parsed the
//! same single-pass-scan-then-typed-extraction way as the tabbed-record
//! store (spec 4.A).

use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;

use crate::error::ConfigError;

//----------- LogLevel ----------------------------------------------------------

/// The eleven rollerd severity levels (spec 4.D). Only the six
/// user-selectable ones are reachable through the CLI/config/control
/// channel; `Always` and `Never` are used internally by the log calls
/// themselves (an `Always`-level message is never suppressed, a `Never`
/// one is never emitted).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Never = 0,
    Tmi = 1,
    Expire = 3,
    Info = 4,
    Phase = 6,
    Err = 8,
    Fatal = 9,
    Always = 10,
}

impl LogLevel {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn as_str(self) -> &'static str {
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

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "never" => LogLevel::Never,
            "tmi" => LogLevel::Tmi,
            "expire" => LogLevel::Expire,
            "info" => LogLevel::Info,
            "phase" => LogLevel::Phase,
            "err" | "error" => LogLevel::Err,
            "fatal" => LogLevel::Fatal,
            "always" => LogLevel::Always,
            _ => return None,
        })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// The log sink's time zone (spec 4.D).
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogTz {
    Gmt,
    Local,
}

impl LogTz {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmt" => Some(LogTz::Gmt),
            "local" => Some(LogTz::Local),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LogTz::Gmt => "gmt",
            LogTz::Local => "local",
        }
    }
}

//----------- RolloverMethod -----------------------------------------------------

/// How the expiration evaluator (spec 4.F) picks the "starter" timestamp
/// it measures a key's life against. Not a spec.md §6 config key by name
/// (the distillation is silent on how it's selected); supplemented here
/// as `roll_method` in the `dtconfig` file, defaulting to the normative
/// `RM_ENDROLL`, grounded in `original_source/dnssec/rollerd/rollmgr.py`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RolloverMethod {
    #[default]
    EndRoll,
    KeyGen,
    StartRoll,
}

impl RolloverMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "endroll" | "rm_endroll" => Some(RolloverMethod::EndRoll),
            "keygen" | "rm_keygen" => Some(RolloverMethod::KeyGen),
            "startroll" | "rm_startroll" => Some(RolloverMethod::StartRoll),
            _ => None,
        }
    }
}

//----------- DsProvider ---------------------------------------------------------

/// The DS-publication provider (spec 4.J).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum DsProvider {
    #[default]
    Dummy,
    Gandi,
}

impl DsProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" => Some(DsProvider::Dummy),
            "gandi.net" | "gandi" => Some(DsProvider::Gandi),
            _ => None,
        }
    }
}

//----------- DaemonArgs (CLI) ---------------------------------------------------

/// Command-line flags (spec 6). Argument parsing is explicitly
/// out-of-scope "trivial glue"; this only needs to exist so flags can
/// win over the configuration file.
#[derive(Clone, Debug, Parser)]
#[command(
    name = "rollerd",
    version = env!("ROLLERD_BUILD_VERSION"),
    about = "Automated DNSSEC key rollover daemon"
)]
pub struct DaemonArgs {
    /// Rollrec file to manage.
    #[arg(long)]
    pub rrfile: Option<Utf8PathBuf>,

    /// Working directory for zone files named relatively.
    #[arg(long)]
    pub directory: Option<Utf8PathBuf>,

    /// Log file path; "-" means stdout.
    #[arg(long)]
    pub logfile: Option<Utf8PathBuf>,

    /// Minimum log level to emit.
    #[arg(long)]
    pub loglevel: Option<LogLevel>,

    /// Log timestamp time zone.
    #[arg(long)]
    pub logtz: Option<LogTz>,

    /// Never call the nameserver reload command.
    #[arg(long)]
    pub noreload: bool,

    /// PID file path.
    #[arg(long)]
    pub pidfile: Option<Utf8PathBuf>,

    /// Rollrec lock file path.
    #[arg(long)]
    pub lockfile: Option<Utf8PathBuf>,

    /// Control channel socket path.
    #[arg(long)]
    pub sockfile: Option<Utf8PathBuf>,

    /// Seconds to sleep between scans (minimum 10).
    #[arg(long)]
    pub sleep: Option<u64>,

    /// Path to the DNSSEC-Tools configuration file.
    #[arg(long)]
    pub dtconfig: Option<Utf8PathBuf>,

    /// Path to the external zone-signing tool.
    #[arg(long)]
    pub zonesigner: Option<Utf8PathBuf>,

    /// Print a one-line status and exit.
    #[arg(long)]
    pub display: bool,

    /// Print the resolved configuration and exit.
    #[arg(long)]
    pub parameters: bool,

    /// Re-sign zones whose unsigned file changed, outside of rollovers.
    #[arg(long, conflicts_with = "noautosign")]
    pub autosign: bool,

    #[arg(long, conflicts_with = "autosign")]
    pub noautosign: bool,

    /// Run exactly one scan pass, then exit.
    #[arg(long)]
    pub singlerun: bool,

    /// Do not daemonize.
    #[arg(long)]
    pub foreground: bool,

    /// Sign a zone every scan even if nothing else required it.
    #[arg(long)]
    pub alwayssign: bool,

    /// Drop privileges to this user after startup.
    #[arg(long)]
    pub username: Option<String>,

    /// Drop privileges to this group after startup.
    #[arg(long)]
    pub realm: Option<String>,

    /// Extra arguments passed through to the signer for every zone.
    #[arg(long)]
    pub zsargs: Option<String>,

    /// Raise rollerd's own log level by one notch.
    #[arg(long)]
    pub verbose: bool,
}

//----------- FileConfig ---------------------------------------------------------

/// The parsed `dtconfig` key/value file (spec 6), before typed
/// extraction. Unrecognized keys (the signer-default family: `ksklife`,
/// `zsklength`, `algorithm`, `nsec3iter`, ...) are kept verbatim so the
/// signer dispatcher (spec 4.I) can forward them as `zonesigner` flags
/// during an initial sign, rather than being silently dropped.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    pub raw: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Self {
        let mut raw = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some(idx) = line.find(char::is_whitespace) else {
                continue;
            };
            let (key, value) = line.split_at(idx);
            raw.insert(key.trim().to_string(), value.trim().to_string());
        }
        Self { raw }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            source: e,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(|s| s.as_str())
    }
}

//----------- Config --------------------------------------------------------------

/// The default daemon socket/lock/PID/log file paths (spec 6).
pub const DEFAULT_PIDFILE: &str = "/run/rollerd.pid";
pub const DEFAULT_SOCKFILE: &str = "/run/dnssec-tools/rollmgr.socket";
pub const DEFAULT_LOCKFILE: &str = "/run/dnssec-tools/rollrec.lock";
pub const DEFAULT_LOGFILE: &str = "/var/log/dnssec-tools/pyrollerd.log";
const DEFAULT_SLEEPTIME: u64 = 60;
const MIN_SLEEPTIME: u64 = 10;
const DEFAULT_MAXERRORS: u32 = 0;

/// The fully resolved configuration everything else in the daemon reads
/// from. Some fields (`sleeptime`, `zsargs`, `loglevel`) can still change
/// at runtime via the control channel (spec 4.E); those live in
/// [`crate::center::RuntimeState`] seeded from here, not here directly.
#[derive(Clone, Debug)]
pub struct Config {
    pub rrfile: Utf8PathBuf,
    pub directory: Utf8PathBuf,
    pub logfile: Utf8PathBuf,
    pub loglevel: LogLevel,
    pub logtz: LogTz,
    pub noreload: bool,
    pub pidfile: Utf8PathBuf,
    pub lockfile: Utf8PathBuf,
    pub sockfile: Utf8PathBuf,
    pub sleeptime: u64,
    pub dtconfig: Option<Utf8PathBuf>,
    pub zonesigner: Utf8PathBuf,
    pub autosign: bool,
    pub singlerun: bool,
    pub foreground: bool,
    pub alwayssign: bool,
    pub username: Option<String>,
    pub realm: Option<String>,
    pub zsargs: String,
    pub verbose: bool,

    pub rndc: String,
    pub rndc_opts: String,
    pub keyarch: Utf8PathBuf,
    pub rollchk: Option<Utf8PathBuf>,
    pub admin_email: Option<String>,
    pub roll_auto: bool,
    pub roll_provider: DsProvider,
    pub roll_provider_key: Option<String>,
    pub rollover_method: RolloverMethod,
    pub default_maxerrors: u32,

    /// Signer-default keys (`ksklife`, `zsklength`, `algorithm`, `random`,
    /// `usensec3`, `nsec3iter`, `nsec3salt`, `nsec3optout`, `endtime`,
    /// `lifespan-min`, `lifespan-max`, `archivedir`, `savekeys`,
    /// `kskcount`, `zskcount`) forwarded to the signer at initial-sign
    /// time (spec 4.I).
    pub signer_defaults: BTreeMap<String, String>,
}

impl Config {
    pub fn resolve(args: &DaemonArgs) -> Result<Self, ConfigError> {
        let file = match &args.dtconfig {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let loglevel = match &args.loglevel {
            Some(l) => *l,
            None => match file.get("roll_loglevel") {
                Some(s) => LogLevel::parse(s).ok_or_else(|| ConfigError::BadLogLevel(s.to_string()))?,
                None => LogLevel::Phase,
            },
        };

        let logtz = match args.logtz {
            Some(tz) => tz,
            None => match file.get("log_tz") {
                Some(s) => LogTz::parse(s).ok_or_else(|| ConfigError::BadLogTz(s.to_string()))?,
                None => LogTz::Gmt,
            },
        };

        let sleeptime = args
            .sleep
            .or_else(|| file.get("roll_sleeptime").and_then(|s| s.parse().ok()))
            .unwrap_or(DEFAULT_SLEEPTIME)
            .max(MIN_SLEEPTIME);

        let roll_provider = match file.get("roll_provider") {
            Some(s) => DsProvider::parse(s).ok_or_else(|| ConfigError::BadProvider(s.to_string()))?,
            None => DsProvider::default(),
        };

        let rollover_method = match file.get("roll_method") {
            Some(s) => RolloverMethod::parse(s)
                .ok_or_else(|| ConfigError::BadRolloverMethod(s.to_string()))?,
            None => RolloverMethod::default(),
        };

        let admin_email = file.get("admin-email").and_then(|s| {
            if s.eq_ignore_ascii_case("nomail") {
                None
            } else {
                Some(s.to_string())
            }
        });

        const SIGNER_DEFAULT_KEYS: &[&str] = &[
            "ksklife",
            "zsklife",
            "ksklength",
            "zsklength",
            "algorithm",
            "random",
            "usensec3",
            "nsec3iter",
            "nsec3salt",
            "nsec3optout",
            "endtime",
            "lifespan-min",
            "lifespan-max",
            "archivedir",
            "savekeys",
            "kskcount",
            "zskcount",
        ];
        let signer_defaults = SIGNER_DEFAULT_KEYS
            .iter()
            .filter_map(|k| file.get(k).map(|v| (k.to_string(), v.to_string())))
            .collect();

        let rrfile = args
            .rrfile
            .clone()
            .ok_or_else(|| ConfigError::BadOption("missing required -rrfile".to_string()))?;

        let directory = args.directory.clone().unwrap_or_else(|| {
            camino::Utf8PathBuf::from_path_buf(std::env::current_dir().unwrap_or_default())
                .unwrap_or_default()
        });

        Ok(Config {
            rrfile,
            directory,
            logfile: args
                .logfile
                .clone()
                .or_else(|| file.get("roll_logfile").map(Utf8PathBuf::from))
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LOGFILE)),
            loglevel,
            logtz,
            noreload: args.noreload,
            pidfile: args
                .pidfile
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PIDFILE)),
            lockfile: args
                .lockfile
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LOCKFILE)),
            sockfile: args
                .sockfile
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_SOCKFILE)),
            sleeptime,
            dtconfig: args.dtconfig.clone(),
            zonesigner: args
                .zonesigner
                .clone()
                .or_else(|| file.get("zonesigner").map(Utf8PathBuf::from))
                .unwrap_or_else(|| Utf8PathBuf::from("zonesigner")),
            autosign: args.autosign || !args.noautosign,
            singlerun: args.singlerun,
            foreground: args.foreground,
            alwayssign: args.alwayssign,
            username: args
                .username
                .clone()
                .or_else(|| file.get("roll_username").map(str::to_string)),
            realm: args.realm.clone(),
            zsargs: args.zsargs.clone().unwrap_or_default(),
            verbose: args.verbose,
            rndc: file.get("rndc").unwrap_or("rndc").to_string(),
            rndc_opts: file.get("rndcopts").unwrap_or("").to_string(),
            keyarch: Utf8PathBuf::from(file.get("keyarch").unwrap_or("keyarch")),
            rollchk: file.get("rollchk").map(Utf8PathBuf::from),
            admin_email,
            roll_auto: file.get("roll_auto").map(is_truthy).unwrap_or(false),
            roll_provider,
            roll_provider_key: file.get("roll_provider_key").map(str::to_string),
            rollover_method,
            default_maxerrors: file
                .get("zone_errors")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAXERRORS),
            signer_defaults,
        })
    }
}

fn is_truthy(s: &str) -> bool {
    matches!(s.trim(), "1" | "yes" | "true" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_skips_comments_and_blank_lines() {
        let text = "# a comment\n; also a comment\n\nroll_sleeptime 120\nrndc /usr/sbin/rndc\n";
        let cfg = FileConfig::parse(text);
        assert_eq!(cfg.get("roll_sleeptime"), Some("120"));
        assert_eq!(cfg.get("rndc"), Some("/usr/sbin/rndc"));
        assert_eq!(cfg.raw.len(), 2);
    }

    #[test]
    fn sleeptime_is_clamped_to_minimum() {
        let mut args = DaemonArgs::parse_from(["rollerd", "--rrfile", "/tmp/x.rrf"]);
        args.sleep = Some(1);
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.sleeptime, MIN_SLEEPTIME);
    }

    #[test]
    fn admin_email_nomail_sentinel_maps_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("dt.conf")).unwrap();
        std::fs::write(&path, "admin-email nomail\n").unwrap();
        let mut args = DaemonArgs::parse_from(["rollerd", "--rrfile", "/tmp/x.rrf"]);
        args.dtconfig = Some(path);
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.admin_email, None);
    }
}
