//! Pre-launch steps: unpack the artifact, find a port, build the command.

use std::fs::{self, File};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::process::Command;

use crate::MatchError;

/// Distinguishes concurrent staging directories within one process.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Makes sure `<location>/<version>.zip` is unpacked into
/// `<location>/<version>_extracted/` and returns that directory.
///
/// Idempotent: an existing extracted directory is reused as-is. Extraction
/// writes to a staging directory first and renames it into place, so a
/// failed or interrupted unpack never leaves a partial directory behind.
///
/// # Errors
/// - [`MatchError::ArtifactMissing`] if the archive is absent or `version`
///   is not a plain file-name component.
/// - [`MatchError::Unpack`] if the archive is unreadable.
pub async fn ensure_unpacked(
    location: &Path,
    game: &str,
    version: &str,
) -> Result<PathBuf, MatchError> {
    if !is_plain_version(version) {
        return Err(MatchError::ArtifactMissing {
            game: game.to_string(),
            version: version.to_string(),
        });
    }

    let location = location.to_path_buf();
    let game = game.to_string();
    let version = version.to_string();
    tokio::task::spawn_blocking(move || unpack_blocking(&location, &game, &version))
        .await
        .map_err(|err| MatchError::Unpack(err.to_string()))?
}

fn is_plain_version(version: &str) -> bool {
    !version.is_empty() && !version.contains(['/', '\\']) && !version.contains("..")
}

fn unpack_blocking(location: &Path, game: &str, version: &str) -> Result<PathBuf, MatchError> {
    let target = location.join(format!("{version}_extracted"));
    if target.is_dir() {
        return Ok(target);
    }

    let archive_path = location.join(format!("{version}.zip"));
    if !archive_path.is_file() {
        return Err(MatchError::ArtifactMissing {
            game: game.to_string(),
            version: version.to_string(),
        });
    }

    let staging = location.join(format!(
        ".{version}_staging_{}_{}",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let extracted = File::open(&archive_path)
        .map_err(|err| MatchError::Unpack(err.to_string()))
        .and_then(|file| {
            zip::ZipArchive::new(file).map_err(|err| MatchError::Unpack(err.to_string()))
        })
        .and_then(|mut archive| {
            archive
                .extract(&staging)
                .map_err(|err| MatchError::Unpack(err.to_string()))
        });

    if let Err(err) = extracted {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }

    match fs::rename(&staging, &target) {
        Ok(()) => {
            tracing::info!(%game, %version, dir = %target.display(), "artifact unpacked");
            Ok(target)
        }
        // Another start unpacked the same version first.
        Err(_) if target.is_dir() => {
            let _ = fs::remove_dir_all(&staging);
            Ok(target)
        }
        Err(err) => {
            let _ = fs::remove_dir_all(&staging);
            Err(MatchError::Unpack(err.to_string()))
        }
    }
}

/// Asks the OS for a currently unused port on `bind_host`.
///
/// The probe socket is closed before returning, so another process could
/// take the port before the worker binds it.
pub async fn allocate_port(bind_host: IpAddr) -> Result<u16, MatchError> {
    let listener = tokio::net::TcpListener::bind((bind_host, 0))
        .await
        .map_err(MatchError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(MatchError::PortAllocation)?
        .port();
    Ok(port)
}

/// Builds the worker invocation:
/// `launch... --port P --player_count N --players p1 p2 ...`, run in
/// `workdir` with stdout and stderr captured.
pub fn worker_command(
    game: &str,
    launch: &[String],
    port: u16,
    roster: &[String],
    workdir: &Path,
) -> Result<Command, MatchError> {
    let (program, leading) = launch
        .split_first()
        .ok_or_else(|| MatchError::NoLaunchCommand(game.to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(leading)
        .arg("--port")
        .arg(port.to_string())
        .arg("--player_count")
        .arg(roster.len().to_string())
        .arg("--players")
        .args(roster)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    Ok(cmd)
}
