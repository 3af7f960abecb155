//! Home directory lookup for `~user/path` output names

use std::path::PathBuf;

/// Resolves a user name to that user's home directory
///
/// Injected into the decoder so `~user` handling can be exercised without a
/// real password database. Any `Fn(&str) -> Option<PathBuf>` is a resolver.
pub trait HomeResolver {
    /// Home directory of `user`, or `None` when the user does not exist
    fn resolve_home(&self, user: &str) -> Option<PathBuf>;
}

impl<F> HomeResolver for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn resolve_home(&self, user: &str) -> Option<PathBuf> {
        self(user)
    }
}

/// Resolver backed by the system password database
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHomeResolver;

#[cfg(unix)]
impl HomeResolver for SystemHomeResolver {
    fn resolve_home(&self, user: &str) -> Option<PathBuf> {
        use std::ffi::{CStr, CString, OsStr};
        use std::os::unix::ffi::OsStrExt;

        // Buffer ceiling for very large passwd entries
        const MAX_BUF: usize = 1 << 20;

        let c_user = CString::new(user).ok()?;
        let mut buf: Vec<libc::c_char> = vec![0; 1024];

        loop {
            // SAFETY: passwd is plain old data; getpwnam_r fills it in and points
            // its string fields into `buf`, which outlives every read below.
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();

            let rc = unsafe {
                libc::getpwnam_r(
                    c_user.as_ptr(),
                    &mut pwd,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };

            if rc == libc::ERANGE && buf.len() < MAX_BUF {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() || pwd.pw_dir.is_null() {
                return None;
            }

            // SAFETY: pw_dir is a NUL-terminated string inside `buf`
            let dir = unsafe { CStr::from_ptr(pwd.pw_dir) };
            return Some(PathBuf::from(OsStr::from_bytes(dir.to_bytes())));
        }
    }
}

#[cfg(not(unix))]
impl HomeResolver for SystemHomeResolver {
    fn resolve_home(&self, _user: &str) -> Option<PathBuf> {
        None
    }
}
