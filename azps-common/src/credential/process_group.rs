//! Termination of a child together with everything it started.
//!
//! The child is always a wrapper shell (`/bin/sh -c` or `cmd /c`), so killing
//! only its pid can leave PowerShell running. On Unix the child leads its own
//! process group and the whole group is signalled; on Windows `taskkill /T`
//! walks the process tree.

use std::io;

/// SIGKILL every process in group `pgid`.
///
/// A group that no longer exists is not an error. The caller's own group is
/// never signalled.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::{Pid, getpgrp};

    let pgid = Pid::from_raw(pgid as i32);
    if pgid == getpgrp() {
        return Ok(());
    }

    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}

/// Kill `pid` and its descendants.
#[cfg(unix)]
pub async fn kill_tree(pid: u32) -> io::Result<()> {
    kill_process_group(pid)
}

/// Kill `pid` and its descendants.
#[cfg(windows)]
pub async fn kill_tree(pid: u32) -> io::Result<()> {
    use std::process::Stdio;

    let status = tokio::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {}", status)))
    }
}

#[cfg(not(any(unix, windows)))]
pub async fn kill_tree(_pid: u32) -> io::Result<()> {
    Ok(())
}
