pub use libc::rlim_t;

/// Raises the soft limit of open file descriptors to `target`, capped by the hard limit.
///
/// Every live session holds a socket, the default soft limit of many systems
/// is far below what a single unit opens.
pub fn raise_nofile(target: rlim_t) -> std::io::Result<()> {
    use std::{io, mem};

    // SAFETY: getrlimit/setrlimit only read and write the rlimit we own.
    unsafe {
        let mut lim: libc::rlimit = mem::zeroed();
        if libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) != 0 {
            return Err(io::Error::last_os_error());
        }

        let new_soft = target.min(lim.rlim_max);
        if lim.rlim_cur >= new_soft {
            tracing::debug!(
                current = lim.rlim_cur,
                new_soft,
                "nofile limit already high enough"
            );
            return Ok(());
        }

        let previous = lim.rlim_cur;
        lim.rlim_cur = new_soft;
        if libc::setrlimit(libc::RLIMIT_NOFILE, &lim) != 0 {
            return Err(io::Error::last_os_error());
        }
        tracing::info!(previous, new_soft, "raised nofile limit");
    }

    Ok(())
}
