// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, i.e., the settings file, the directory that houses
//! recorded size histories, and the home directories of local users.

use std::path::PathBuf;

/// Environment variable that overrides the settings file path.
pub const SETTINGS_ENV: &str = "BORG_SPACE_CONFIG";

/// Environment variable that overrides the history directory path.
pub const DATA_ENV: &str = "BORG_SPACE_DATA";

#[cfg(unix)]
const MAX_PASSWD_BUFFER: usize = 1 << 20;

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Determine absolute path to settings file.
///
/// Uses `$BORG_SPACE_CONFIG` when set, otherwise falls back to the XDG Base
/// Directory path `$XDG_CONFIG_HOME/borg-space/settings.toml`. Does not check
/// if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
/// - Return [`PathError::ShellExpansion`] if override cannot be expanded.
pub fn settings_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
        return expand(path);
    }

    dirs::config_dir()
        .map(|path| path.join("borg-space").join("settings.toml"))
        .ok_or(PathError::NoWayHome)
}

/// Determine absolute path to size history directory.
///
/// Uses `$BORG_SPACE_DATA` when set, otherwise falls back to the XDG Base
/// Directory path `$XDG_DATA_HOME/borg-space`. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
/// - Return [`PathError::ShellExpansion`] if override cannot be expanded.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn history_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(DATA_ENV) {
        return expand(path);
    }

    dirs::data_dir()
        .map(|path| path.join("borg-space"))
        .ok_or(PathError::NoWayHome)
}

/// Determine home directory of any user from the password database.
///
/// # Errors
///
/// - Return [`PathError::UnknownUser`] if user has no password database
///   entry.
#[cfg(unix)]
pub fn user_home_dir(user: &str) -> Result<PathBuf> {
    use std::{
        ffi::{CStr, CString, OsStr},
        mem::MaybeUninit,
        os::unix::ffi::OsStrExt,
        ptr,
    };

    let unknown = || PathError::UnknownUser { user: user.into() };
    let name = CString::new(user).map_err(|_| unknown())?;
    let mut buffer: Vec<libc::c_char> = vec![0; 1024];

    loop {
        let mut entry = MaybeUninit::<libc::passwd>::uninit();
        let mut found: *mut libc::passwd = ptr::null_mut();
        let code = unsafe {
            libc::getpwnam_r(
                name.as_ptr(),
                entry.as_mut_ptr(),
                buffer.as_mut_ptr(),
                buffer.len(),
                &mut found,
            )
        };

        // INVARIANT: Entry strings live in buffer, so grow it until they fit.
        if code == libc::ERANGE && buffer.len() < MAX_PASSWD_BUFFER {
            buffer.resize(buffer.len() * 2, 0);
            continue;
        }

        if code != 0 || found.is_null() {
            return Err(unknown());
        }

        // INVARIANT: Non-null result points at entry, whose pw_dir points into
        //   buffer, which outlives this borrow.
        let dir = unsafe { CStr::from_ptr((*found).pw_dir) };
        return Ok(PathBuf::from(OsStr::from_bytes(dir.to_bytes())));
    }
}

/// Determine home directory of any user from the password database.
#[cfg(not(unix))]
pub fn user_home_dir(user: &str) -> Result<PathBuf> {
    Err(PathError::UnknownUser { user: user.into() })
}

/// Perform shell expansion on user supplied path.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if a referenced variable is unset
///   or not valid unicode.
pub fn expand(path: impl AsRef<str>) -> Result<PathBuf> {
    Ok(PathBuf::from(shellexpand::full(path.as_ref())?.into_owned()))
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    ///
    /// # See Also
    ///
    /// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// User has no entry in the password database.
    #[error("cannot determine home directory of user {user:?}")]
    UnknownUser { user: String },

    /// Failed to perform shell expansion on path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
