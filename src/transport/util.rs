//! Path and shell helpers shared by the transport.

use std::borrow::Cow;

use shell_escape::unix::escape;

/// Expands a leading `~/` prefix to the user's home directory.
///
/// When `HOME` is unset the input is returned unchanged.
///
/// # Examples
///
/// ```
/// # use fuel_harness::transport::expand_tilde;
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Quotes `value` for interpolation into a remote shell command.
///
/// # Examples
///
/// ```
/// # use fuel_harness::transport::quote;
/// assert_eq!(quote("eth0"), "eth0");
/// assert_eq!(quote("a b"), "'a b'");
/// ```
#[must_use]
pub fn quote(value: &str) -> String {
    escape(Cow::Borrowed(value)).into_owned()
}
