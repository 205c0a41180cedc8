//! Path helpers shared by the SSH client and the host store.

/// Expands a leading `~` or `~/` to the user's home directory.
///
/// Without `HOME` the path comes back unchanged, so callers see the literal
/// tilde in any resulting error message.
///
/// # Examples
///
/// ```
/// # use rackhost::ssh::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/.rackhost/hosts"), format!("{home}/.rackhost/hosts"));
/// assert_eq!(expand_tilde("~"), home);
/// assert_eq!(expand_tilde("/srv/hosts"), "/srv/hosts");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    let Some(raw_home) = std::env::var_os("HOME") else {
        return path.to_owned();
    };
    let home = raw_home.to_string_lossy();
    if path == "~" {
        return home.into_owned();
    }
    path.strip_prefix("~/")
        .map_or_else(|| path.to_owned(), |rest| format!("{home}/{rest}"))
}
