//! POSIX shell quoting for remote command lines

/// Quote one argument so a POSIX shell passes it through literally
///
/// Arguments made only of safe characters are returned unchanged; anything
/// else is wrapped in single quotes, with embedded single quotes spliced as
/// `'"'"'`.
pub fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    let safe = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        return arg.to_string();
    }

    format!("'{}'", arg.replace('\'', r#"'"'"'"#))
}

/// Quote every argv element and join with spaces
pub fn shell_join(cmd: &[String]) -> String {
    cmd.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}
