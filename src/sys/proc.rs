//! `waitpid` status to process return-code conversion.

use nix::sys::wait::WaitStatus;

/// Maps a decoded wait status onto the return-code convention used throughout this crate:
/// `WIFSIGNALED -> -signo`, `WIFEXITED -> exit code`, `WIFSTOPPED -> stop signo`. Any other
/// status (`Continued`, `PtraceEvent`, ...) is not a terminal state and yields `None`.
pub fn compute_returncode(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, sig, _) => Some(-(sig as i32)),
        WaitStatus::Stopped(_, sig) => Some(sig as i32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    #[test]
    fn exited_maps_to_exit_code() {
        let pid = Pid::from_raw(1);
        assert_eq!(compute_returncode(WaitStatus::Exited(pid, 0)), Some(0));
        assert_eq!(compute_returncode(WaitStatus::Exited(pid, 7)), Some(7));
    }

    #[test]
    fn signaled_maps_to_negative_signal_number() {
        let pid = Pid::from_raw(1);
        let status = WaitStatus::Signaled(pid, Signal::SIGTERM, false);
        assert_eq!(compute_returncode(status), Some(-15));
    }

    #[test]
    fn stopped_maps_to_positive_signal_number() {
        let pid = Pid::from_raw(1);
        let status = WaitStatus::Stopped(pid, Signal::SIGSTOP);
        assert_eq!(compute_returncode(status), Some(19));
    }
}
