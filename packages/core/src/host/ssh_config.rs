//! SSH config file parsing and writing
//!
//! Treats ~/.ssh/config as an ordered list of typed lines. Only `Host`
//! blocks are structured; every other line is carried verbatim so that
//! hand-edited content survives add and remove operations byte for byte.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::HostError;
use super::schema::{HostEntry, HostSpec};

/// Get the path to the user's SSH config file
pub fn get_ssh_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("config"))
}

/// One physical line of the config file
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigLine {
    Blank(String),
    Comment(String),
    HostHeader { raw: String, name: String },
    Directive { raw: String, key: String, value: String },
    Other(String),
}

impl ConfigLine {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ConfigLine::Blank(raw.to_string());
        }
        if trimmed.starts_with('#') {
            return ConfigLine::Comment(raw.to_string());
        }

        let Some((key, value)) = split_directive(trimmed) else {
            return ConfigLine::Other(raw.to_string());
        };

        if key.eq_ignore_ascii_case("host") {
            ConfigLine::HostHeader {
                raw: raw.to_string(),
                name: value.to_string(),
            }
        } else {
            ConfigLine::Directive {
                raw: raw.to_string(),
                key: key.to_ascii_lowercase(),
                value: value.to_string(),
            }
        }
    }

    fn raw(&self) -> &str {
        match self {
            ConfigLine::Blank(raw) | ConfigLine::Comment(raw) | ConfigLine::Other(raw) => raw,
            ConfigLine::HostHeader { raw, .. } | ConfigLine::Directive { raw, .. } => raw,
        }
    }

    fn is_trivia(&self) -> bool {
        matches!(self, ConfigLine::Blank(_) | ConfigLine::Comment(_))
    }

    fn is_blank(&self) -> bool {
        matches!(self, ConfigLine::Blank(_))
    }

    fn host_name(&self) -> Option<&str> {
        match self {
            ConfigLine::HostHeader { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Split `Key value` into its parts; the key must be a single word
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let end = line.find(char::is_whitespace)?;
    let (key, rest) = line.split_at(end);
    let value = rest.trim();
    let is_word = key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if key.is_empty() || value.is_empty() || !is_word {
        return None;
    }
    Some((key, value))
}

/// A directive value must be non-empty and fit on one line
fn check_value(key: &str, value: &str) -> Result<(), HostError> {
    if value.trim().is_empty() {
        return Err(HostError::InvalidConfig(format!("{key} cannot be empty")));
    }
    if value.contains(['\n', '\r']) {
        return Err(HostError::InvalidConfig(format!(
            "{key} must not contain line breaks"
        )));
    }
    Ok(())
}

/// Whole config file as typed lines plus its trailing-newline state
#[derive(Debug, Clone, Default)]
struct ConfigDocument {
    lines: Vec<ConfigLine>,
    trailing_newline: bool,
}

impl ConfigDocument {
    fn parse(content: &str) -> Self {
        if content.is_empty() {
            return Self::default();
        }
        let trailing_newline = content.ends_with('\n');
        let body = content.strip_suffix('\n').unwrap_or(content);
        Self {
            lines: body.split('\n').map(ConfigLine::parse).collect(),
            trailing_newline,
        }
    }

    fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(ConfigLine::raw)
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    fn hosts(&self) -> Vec<HostEntry> {
        let mut hosts: Vec<HostEntry> = Vec::new();
        for line in &self.lines {
            match line {
                ConfigLine::HostHeader { name, .. } => hosts.push(HostEntry::new(name.clone())),
                ConfigLine::Directive { key, value, .. } => {
                    if let Some(current) = hosts.last_mut() {
                        current.params.insert(key.clone(), value.clone());
                    }
                }
                _ => {}
            }
        }
        hosts
    }

    /// Remove the block opened by `Host <name>`
    ///
    /// The block runs up to the next `Host` line or EOF. Blank and comment
    /// lines at its tail are kept, since they lead into whatever follows.
    fn remove_block(&mut self, name: &str) -> bool {
        let Some(start) = self
            .lines
            .iter()
            .position(|line| line.host_name() == Some(name))
        else {
            return false;
        };

        let block_end = self.lines[start + 1..]
            .iter()
            .position(|line| line.host_name().is_some())
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.lines.len());

        let mut content_end = block_end;
        while content_end > start + 1 && self.lines[content_end - 1].is_trivia() {
            content_end -= 1;
        }
        // Trailing trivia is only kept when it carries a comment
        if !self.lines[content_end..block_end]
            .iter()
            .any(|line| !line.is_blank())
        {
            content_end = block_end;
        }

        self.lines.drain(start..content_end);

        if start >= self.lines.len() {
            while self.lines.last().is_some_and(ConfigLine::is_blank) {
                self.lines.pop();
            }
            self.trailing_newline = true;
        } else {
            while start > 0
                && start < self.lines.len()
                && self.lines[start - 1].is_blank()
                && self.lines[start].is_blank()
            {
                self.lines.remove(start);
            }
        }
        true
    }
}

/// Reader and editor for one SSH client config file
#[derive(Debug, Clone)]
pub struct SshConfigParser {
    config_path: PathBuf,
}

impl SshConfigParser {
    /// Parser bound to an explicit file
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Parser bound to ~/.ssh/config
    pub fn from_default_path() -> Result<Self, HostError> {
        get_ssh_config_path()
            .map(Self::new)
            .ok_or_else(|| HostError::SshConfigRead("Could not determine home directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn read_config(&self) -> Result<String, HostError> {
        if !self.config_path.exists() {
            tracing::debug!("No SSH config at {}", self.config_path.display());
            return Ok(String::new());
        }
        fs::read_to_string(&self.config_path).map_err(|e| {
            HostError::SshConfigRead(format!(
                "Failed to read {}: {}",
                self.config_path.display(),
                e
            ))
        })
    }

    fn write_config(&self, content: &str) -> Result<(), HostError> {
        if let Some(ssh_dir) = self.config_path.parent() {
            if !ssh_dir.as_os_str().is_empty() && !ssh_dir.exists() {
                fs::create_dir_all(ssh_dir).map_err(|e| {
                    HostError::SshConfigWrite(format!("Failed to create .ssh directory: {e}"))
                })?;

                // Set directory permissions to 700 on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(ssh_dir, fs::Permissions::from_mode(0o700)).map_err(
                        |e| HostError::SshConfigWrite(format!("Failed to set .ssh permissions: {e}")),
                    )?;
                }
            }
        }

        fs::write(&self.config_path, content).map_err(|e| {
            HostError::SshConfigWrite(format!(
                "Failed to write {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        // Owner-only access: the file is a host inventory
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.config_path, fs::Permissions::from_mode(0o600)).map_err(
                |e| HostError::SshConfigWrite(format!("Failed to set config permissions: {e}")),
            )?;
        }

        Ok(())
    }

    /// All `Host` blocks in file order
    pub fn list_hosts(&self) -> Result<Vec<HostEntry>, HostError> {
        Ok(ConfigDocument::parse(&self.read_config()?).hosts())
    }

    /// First block whose name matches exactly
    pub fn get_host(&self, name: &str) -> Result<Option<HostEntry>, HostError> {
        Ok(self
            .list_hosts()?
            .into_iter()
            .find(|host| host.name == name))
    }

    /// Append a new `Host` block
    ///
    /// Fails without touching the file if the name is already present.
    pub fn add_host(&self, spec: &HostSpec) -> Result<(), HostError> {
        if spec.name.is_empty() || spec.name.chars().any(char::is_whitespace) {
            return Err(HostError::InvalidConfig(format!(
                "Host name must be a single non-empty word, got '{}'",
                spec.name
            )));
        }
        check_value("HostName", &spec.hostname)?;
        check_value("User", &spec.user)?;
        if let Some(key) = &spec.identity_file {
            check_value("IdentityFile", key)?;
        }
        if spec.port == 0 {
            return Err(HostError::InvalidConfig("Port must be 1-65535".into()));
        }

        let mut content = self.read_config()?;
        if ConfigDocument::parse(&content)
            .hosts()
            .iter()
            .any(|host| host.name == spec.name)
        {
            return Err(HostError::AlreadyExists(spec.name.clone()));
        }

        if !content.is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            if !content.ends_with("\n\n") {
                content.push('\n');
            }
        }

        content.push_str(&format!("Host {}\n", spec.name));
        content.push_str(&format!("    HostName {}\n", spec.hostname));
        content.push_str(&format!("    User {}\n", spec.user));
        content.push_str(&format!("    Port {}\n", spec.port));
        if let Some(key) = &spec.identity_file {
            content.push_str(&format!("    IdentityFile {key}\n"));
        }

        self.write_config(&content)?;

        tracing::info!(
            "Added host '{}' to SSH config at {}",
            spec.name,
            self.config_path.display()
        );
        Ok(())
    }

    /// Remove the block for `name`
    ///
    /// Returns false and leaves the file untouched when no block matches.
    pub fn remove_host(&self, name: &str) -> Result<bool, HostError> {
        let mut document = ConfigDocument::parse(&self.read_config()?);
        if !document.remove_block(name) {
            return Ok(false);
        }

        self.write_config(&document.render())?;
        tracing::info!(
            "Removed host '{}' from SSH config at {}",
            name,
            self.config_path.display()
        );
        Ok(true)
    }
}
