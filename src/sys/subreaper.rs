//! `PR_SET_CHILD_SUBREAPER` wrapper.
//!
//! Marking the process a subreaper causes orphaned descendants to reparent to it instead of to
//! PID 1, which is what lets the executor's reap loop pick up a container's grandchildren.

use anyhow::{bail, Result};

/// Sets or clears the calling process's subreaper flag.
pub fn set_subreaper(on: bool) -> Result<()> {
    let arg = if on { 1 } else { 0 };
    let rc = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, arg, 0, 0, 0) };
    if rc != 0 {
        bail!(
            "prctl(PR_SET_CHILD_SUBREAPER, {}) failed: {}",
            arg,
            std::io::Error::last_os_error()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_unset_subreaper_round_trip() {
        // Safe to flip in a test process: it only affects how *our* orphans reparent, and we
        // restore it before returning.
        set_subreaper(true).expect("set subreaper");
        set_subreaper(false).expect("unset subreaper");
    }
}
