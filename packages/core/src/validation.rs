//! Parameter validation
//!
//! Every check runs before any command is issued, so a bad argument never
//! leaves a half-created container behind.

use thiserror::Error;

pub const MIN_CTID: u32 = 100;
pub const MAX_CTID: u32 = 999_999_999;

/// A parameter failed its shape check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

pub fn validate_ctid(ctid: u32) -> Result<u32, ValidationError> {
    if !(MIN_CTID..=MAX_CTID).contains(&ctid) {
        return Err(ValidationError(format!(
            "CTID must be between {MIN_CTID} and {MAX_CTID}, got: {ctid}"
        )));
    }
    Ok(ctid)
}

/// Accept `"21-50"` (last-octet range) or `"192.168.1.100[/24]"`
pub fn validate_ip(ip: &str) -> Result<&str, ValidationError> {
    if let Some((start, end)) = parse_octet_range(ip) {
        if !(1..=254).contains(&start) || !(1..=254).contains(&end) {
            return Err(ValidationError(format!(
                "IP range octets must be 1-254, got: {ip}"
            )));
        }
        if start > end {
            return Err(ValidationError(format!(
                "IP range start must be <= end, got: {ip}"
            )));
        }
        return Ok(ip);
    }

    let (address, mask) = match ip.split_once('/') {
        Some((address, mask)) => (address, Some(mask)),
        None => (ip, None),
    };

    let octets: Vec<&str> = address.split('.').collect();
    let well_formed = octets.len() == 4
        && octets.iter().all(|o| is_short_number(o, 3))
        && mask.is_none_or(|m| is_short_number(m, 2));
    if !well_formed {
        return Err(ValidationError(format!(
            "Invalid IP format: {ip}. Use '21-50' or '192.168.1.100/24'"
        )));
    }

    if octets.iter().any(|o| o.parse::<u16>().map_or(true, |v| v > 255)) {
        return Err(ValidationError(format!("IP octets must be 0-255, got: {ip}")));
    }
    if let Some(mask) = mask {
        if mask.parse::<u8>().map_or(true, |m| m > 32) {
            return Err(ValidationError(format!("IP mask must be 0-32, got: {ip}")));
        }
    }
    Ok(ip)
}

/// Container hostname: a letter, then letters, digits or hyphens; 63 max
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError("Container name cannot be empty".into()));
    }
    if name.len() > 63 {
        return Err(ValidationError(format!(
            "Container name too long (max 63): {name}"
        )));
    }

    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError(format!(
            "Invalid container name: {name}. Must start with letter, contain only letters, digits, hyphens"
        )));
    }
    Ok(name)
}

/// Check whichever resource values are given
pub fn validate_resources(
    cores: Option<u32>,
    memory: Option<u32>,
    disk: Option<u32>,
) -> Result<(), ValidationError> {
    if let Some(cores) = cores {
        if !(1..=128).contains(&cores) {
            return Err(ValidationError(format!("Cores must be 1-128, got: {cores}")));
        }
    }
    if let Some(memory) = memory {
        if !(128..=1_048_576).contains(&memory) {
            return Err(ValidationError(format!(
                "Memory must be 128-1048576 MB, got: {memory}"
            )));
        }
    }
    if let Some(disk) = disk {
        if !(1..=10_240).contains(&disk) {
            return Err(ValidationError(format!(
                "Disk must be 1-10240 GB, got: {disk}"
            )));
        }
    }
    Ok(())
}

/// Split `"a-b"` where both sides are 1-3 digit numbers
pub(crate) fn parse_octet_range(text: &str) -> Option<(u16, u16)> {
    let (start, end) = text.split_once('-')?;
    if !is_short_number(start, 3) || !is_short_number(end, 3) {
        return None;
    }
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn is_short_number(text: &str, max_digits: usize) -> bool {
    !text.is_empty() && text.len() <= max_digits && text.bytes().all(|b| b.is_ascii_digit())
}
