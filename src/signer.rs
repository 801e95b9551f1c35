//! Signer/reloader dispatcher (spec 4.I): maps a symbolic phase tag to
//! external `zonesigner` flags, merges per-zone and global `zsargs`,
//! force-injects `-zone`/`-krfile`, runs the signer, and separately runs
//! the nameserver reload command.
//!
//! Uses `tokio::process::Command` rather than the `std::process::Command`
//! `RollEntry::loadzone` already uses in `rollerd-records`, since a signer
//! run can take long enough that it shouldn't block a scan-loop worker
//! thread; the teacher reaches for the same async `Command` wherever it
//! shells out to an external tool (its `units::zone_signer` module).

use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;

use crate::error::{ReloadError, SignerError};

/// Maps a symbolic phase tag (spec.md §4.I table) to the signer flag(s)
/// it implies. `"ZSK phase 4"` is intentionally absent: the phase engine
/// decomposes it into two separate calls tagged `"ZSK phase 4a"`
/// (`-rollzsk`) and `"ZSK phase 4b"` (no flag, a plain sign).
pub fn signer_flags(tag: &str) -> &'static [&'static str] {
    match tag {
        "KSK phase 2" => &["-newpubksk"],
        "KSK phase 7" => &["-rollksk"],
        "ZSK phase 2" | "ZSK phase 3" => &["-usezskpub"],
        "ZSK phase 4a" => &["-rollzsk"],
        "always-sign" => &["-usezskpub"],
        "initial" => &["-genkeys"],
        _ => &[],
    }
}

/// Everything the dispatcher needs to build one signer invocation.
/// `zonefile`/`zonesigned` are owned since they're usually resolved
/// fresh from the keyrec's `zone` section (spec 4.I: "resolves
/// `zonefile`/`zonesigned` paths from the keyrec unless doing an
/// initial sign").
pub struct SignerRequest<'a> {
    pub zonename: &'a str,
    pub zonefile: Option<Utf8PathBuf>,
    pub zonesigned: Option<Utf8PathBuf>,
    pub keyrec_path: &'a Utf8Path,
    pub directory: &'a Utf8Path,
    pub global_zsargs: &'a str,
    pub per_zone_zsargs: &'a str,
    pub signonly: bool,
}

/// Runs the external signer for `tag` against `req` (spec 4.I). Returns
/// `Ok(())` on exit 0; any other outcome is a [`SignerError`] the caller
/// should fold into the zone's error counter rather than propagate.
pub async fn run_signer(
    zonesigner: &Utf8Path,
    dtconfig: Option<&Utf8Path>,
    tag: &str,
    req: &SignerRequest<'_>,
) -> Result<(), SignerError> {
    let mut args: Vec<String> = vec!["-rollmgr".to_string(), "pyrollerd".to_string()];
    if let Some(dtconfig) = dtconfig {
        args.push("-dtconfig".to_string());
        args.push(dtconfig.to_string());
    }

    for flag in signer_flags(tag) {
        args.push(flag.to_string());
    }

    args.extend(req.global_zsargs.split_whitespace().map(str::to_string));
    args.extend(req.per_zone_zsargs.split_whitespace().map(str::to_string));

    if !args.iter().any(|a| a == "-zone") {
        args.push("-zone".to_string());
        args.push(req.zonename.to_string());
    }
    if !args.iter().any(|a| a == "-krfile") {
        args.push("-krfile".to_string());
        args.push(req.keyrec_path.to_string());
    }
    if req.signonly {
        args.push("-signonly".to_string());
    }

    if let Some(zonefile) = &req.zonefile {
        args.push(zonefile.to_string());
    }
    if let Some(zonesigned) = &req.zonesigned {
        args.push(zonesigned.to_string());
    }

    let output = Command::new(zonesigner.as_std_path())
        .args(&args)
        .current_dir(req.directory.as_std_path())
        .output()
        .await
        .map_err(SignerError::Spawn)?;

    if output.status.success() {
        Ok(())
    } else {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(SignerError::NonZeroExit {
            status: output.status.code(),
            output: combined,
        })
    }
}

/// Runs `<rndc> <rndc_opts> reload <zonename>` (spec 4.I, 4.C
/// `loadzone`). Obeys `-noreload`/`roll_loadzone` by simply not being
/// called when the caller's configuration disables reloads.
pub async fn reload(rndc: &str, rndc_opts: &str, zonename: &str) -> Result<(), ReloadError> {
    let mut cmd = Command::new(rndc);
    if !rndc_opts.is_empty() {
        cmd.args(rndc_opts.split_whitespace());
    }
    cmd.arg("reload").arg(zonename);

    let status = cmd.status().await.map_err(ReloadError::Spawn)?;
    if status.success() {
        Ok(())
    } else {
        Err(ReloadError::NonZeroExit { status: status.code() })
    }
}

/// Runs `<keyarch> -dtconf <PATH> -zone <zonename> <keyrec> -verbose`
/// (spec §6 "External programs"), invoked once per successful KSK phase
/// 7 rollover to move obsolete key files out of active use.
pub async fn archive(
    keyarch: &Utf8Path,
    dtconfig: Option<&Utf8Path>,
    zonename: &str,
    keyrec_path: &Utf8Path,
) -> Result<(), SignerError> {
    let mut cmd = Command::new(keyarch.as_std_path());
    if let Some(dtconfig) = dtconfig {
        cmd.arg("-dtconf").arg(dtconfig.as_std_path());
    }
    cmd.arg("-zone").arg(zonename);
    cmd.arg(keyrec_path.as_std_path());
    cmd.arg("-verbose");

    let output = cmd.output().await.map_err(SignerError::Spawn)?;
    if output.status.success() {
        Ok(())
    } else {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(SignerError::NonZeroExit {
            status: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_match_the_spec_table() {
        assert_eq!(signer_flags("KSK phase 2"), &["-newpubksk"]);
        assert_eq!(signer_flags("KSK phase 7"), &["-rollksk"]);
        assert_eq!(signer_flags("ZSK phase 2"), &["-usezskpub"]);
        assert_eq!(signer_flags("ZSK phase 3"), &["-usezskpub"]);
        assert_eq!(signer_flags("ZSK phase 4a"), &["-rollzsk"]);
        assert_eq!(signer_flags("ZSK phase 4b"), &[] as &[&str]);
        assert_eq!(signer_flags("KSK phase 1"), &[] as &[&str]);
        assert_eq!(signer_flags("initial"), &["-genkeys"]);
    }
}
