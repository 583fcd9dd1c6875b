//! Process-group plumbing for reliable child cleanup.
//!
//! A supervised shell may fork descendants that outlive a single-process
//! kill, so the child is started as the leader of its own process group and
//! termination targets the whole group. All kill paths are best-effort: a
//! group that vanished between detection and kill is not an error.

use tokio::process::{Child, Command};

/// Arranges for the child to become the leader of a new process group.
#[cfg(unix)]
pub(crate) fn spawn_in_own_group(command: &mut Command) {
    unsafe {
        command.pre_exec(|| {
            if unsafe { libc::setpgid(0, 0) } == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn spawn_in_own_group(_command: &mut Command) {}

/// Sends SIGKILL to the child's whole process group.
///
/// Tolerates a group that already exited: ESRCH and an unresolvable PGID
/// both count as success.
#[cfg(unix)]
pub(crate) fn kill_group(child: &Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pgid = unsafe { libc::getpgid(pid as libc::pid_t) };
    if pgid == -1 {
        return Ok(());
    }
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_child: &Child) -> std::io::Result<()> {
    Ok(())
}

/// Terminates the child and all descendants, then reaps the child.
///
/// Group kill first; on failure, falls back to killing just the tracked
/// child handle. Every error is swallowed here: by the time this runs the
/// invocation outcome (timeout or cancellation) is already decided.
pub(crate) async fn terminate_tree(child: &mut Child) {
    if let Err(e) = kill_group(child) {
        tracing::debug!(
            "Process group kill failed, falling back to child kill: {}",
            e
        );
    }
    if let Err(e) = child.kill().await {
        tracing::debug!("Child already exited before kill: {}", e);
    }
    if let Err(e) = child.wait().await {
        tracing::debug!("Failed to reap child after kill: {}", e);
    }
}
