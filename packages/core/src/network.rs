//! Address selection for new containers
//!
//! All probing runs through the bound executor, so with a remote host the
//! subnet and ping checks happen on the PVE host itself.

use serde::Serialize;
use thiserror::Error;

use crate::argv;
use crate::exec::{CommandExecutor, ExecError};
use crate::validation::{parse_octet_range, validate_ip};

/// Mask assumed when a full address is given without one
pub const DEFAULT_MASK: &str = "24";

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Cannot determine host network: {0}")]
    HostNetwork(String),

    #[error("No free IP in range {0}")]
    NoFreeIp(String),

    #[error("Invalid IP format: {0}. Use '21-50' or '192.168.1.100/24'")]
    InvalidFormat(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Addressing of the PVE host's default route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostNetwork {
    pub ip: String,
    pub mask: String,
    pub gateway: String,
    pub interface: String,
}

impl HostNetwork {
    /// First three octets of the host address
    pub fn subnet(&self) -> String {
        subnet_of(&self.ip)
    }
}

/// Static addressing chosen for a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIp {
    pub address: String,
    pub mask: String,
    pub gateway: String,
}

impl ResolvedIp {
    /// `address/mask`, as `pct create --net0 ip=` expects
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.mask)
    }
}

pub struct Network<'a> {
    executor: &'a dyn CommandExecutor,
    ping_timeout: f64,
}

impl<'a> Network<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, ping_timeout: f64) -> Self {
        Self {
            executor,
            ping_timeout,
        }
    }

    /// Read gateway, interface, address and mask from `ip`
    pub fn host_network(&self) -> Result<HostNetwork, NetworkError> {
        let route = self
            .executor
            .run(&argv!["ip", "route", "show", "default"], false)?;
        let (gateway, interface) = parse_default_route(&route.stdout)
            .ok_or_else(|| NetworkError::HostNetwork("no default route".into()))?;

        let addr = self
            .executor
            .run(&argv!["ip", "-o", "addr", "show", interface], false)?;
        let (ip, mask) = parse_inet(&addr.stdout).ok_or_else(|| {
            NetworkError::HostNetwork(format!("no IPv4 address on {interface}"))
        })?;

        Ok(HostNetwork {
            ip,
            mask,
            gateway,
            interface,
        })
    }

    /// Whether something answers at `ip`
    pub fn ping(&self, ip: &str) -> Result<bool, NetworkError> {
        let wait = (self.ping_timeout.ceil() as u64).max(1);
        let result = self
            .executor
            .run(&argv!["ping", "-c", "1", "-W", wait, ip], false)?;
        Ok(result.success())
    }

    /// Turn a `--ip` argument into concrete addressing
    ///
    /// `"21-50"` picks the first address in the host subnet that does not
    /// answer a ping. A full address keeps its mask (default /24) and gets
    /// the `.1` of its subnet as gateway.
    pub fn resolve_ip(&self, arg: &str) -> Result<ResolvedIp, NetworkError> {
        if let Some((start, end)) = parse_octet_range(arg) {
            validate_ip(arg).map_err(|_| NetworkError::InvalidFormat(arg.to_string()))?;
            let host = self.host_network()?;
            let address = self
                .find_free_ip(start, end, &host.subnet())?
                .ok_or_else(|| NetworkError::NoFreeIp(arg.to_string()))?;
            tracing::info!("Selected free address {address}");
            return Ok(ResolvedIp {
                address,
                mask: host.mask,
                gateway: host.gateway,
            });
        }

        let (address, mask) = match arg.split_once('/') {
            Some((address, mask)) => (address, mask),
            None => (arg, DEFAULT_MASK),
        };
        let well_formed = address.split('.').count() == 4
            && address.chars().all(|c| c.is_ascii_digit() || c == '.')
            && !mask.is_empty()
            && mask.chars().all(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(NetworkError::InvalidFormat(arg.to_string()));
        }

        Ok(ResolvedIp {
            address: address.to_string(),
            mask: mask.to_string(),
            gateway: format!("{}.1", subnet_of(address)),
        })
    }

    /// First address in `subnet.start..=subnet.end` with no ping reply
    pub fn find_free_ip(
        &self,
        start: u16,
        end: u16,
        subnet: &str,
    ) -> Result<Option<String>, NetworkError> {
        for octet in start..=end {
            let ip = format!("{subnet}.{octet}");
            if !self.ping(&ip)? {
                return Ok(Some(ip));
            }
            tracing::debug!("{ip} is in use");
        }
        Ok(None)
    }

    /// Every free address in `a-b` (host subnet) or `x.y.z.a-b`
    pub fn list_free_ips(&self, range: &str) -> Result<Vec<String>, NetworkError> {
        let (subnet, octets) = match range.rsplit_once('.') {
            Some((subnet, octets)) if subnet.split('.').count() == 3 => {
                (Some(subnet.to_string()), octets)
            }
            Some(_) => return Err(NetworkError::InvalidFormat(range.to_string())),
            None => (None, range),
        };
        let invalid = || NetworkError::InvalidFormat(range.to_string());
        validate_ip(octets).map_err(|_| invalid())?;
        if let Some(subnet) = &subnet {
            validate_ip(&format!("{subnet}.1")).map_err(|_| invalid())?;
        }
        let (start, end) = parse_octet_range(octets).ok_or_else(invalid)?;

        let subnet = match subnet {
            Some(subnet) => subnet,
            None => self.host_network()?.subnet(),
        };

        let mut free = Vec::new();
        for octet in start..=end {
            let ip = format!("{subnet}.{octet}");
            if !self.ping(&ip)? {
                free.push(ip);
            }
        }
        Ok(free)
    }
}

fn subnet_of(ip: &str) -> String {
    ip.split('.').take(3).collect::<Vec<_>>().join(".")
}

/// `default via 192.168.1.1 dev vmbr0 ...` → (gateway, interface)
fn parse_default_route(stdout: &str) -> Option<(String, String)> {
    stdout.lines().find_map(|line| {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.first() != Some(&"default") {
            return None;
        }
        let after = |key: &str| {
            words
                .iter()
                .position(|w| *w == key)
                .and_then(|i| words.get(i + 1))
                .map(|w| w.to_string())
        };
        Some((after("via")?, after("dev")?))
    })
}

/// `2: vmbr0    inet 192.168.1.10/24 brd ...` → (address, mask)
fn parse_inet(stdout: &str) -> Option<(String, String)> {
    let mut words = stdout.split_whitespace();
    while let Some(word) = words.next() {
        if word == "inet" {
            let (ip, mask) = words.next()?.split_once('/')?;
            return Some((ip.to_string(), mask.to_string()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandResult;
    use crate::exec::scripted::{ScriptedExecutor, issued};

    fn host_stub() -> ScriptedExecutor {
        ScriptedExecutor::new()
            .ok(
                &["ip", "route", "show", "default"],
                "default via 192.168.1.1 dev vmbr0 proto kernel onlink\n",
            )
            .ok(
                &["ip", "-o", "addr", "show", "vmbr0"],
                "5: vmbr0    inet 192.168.1.10/24 brd 192.168.1.255 scope global vmbr0\\       valid_lft forever\n",
            )
    }

    /// Every ping gets no reply
    fn all_free(executor: ScriptedExecutor) -> ScriptedExecutor {
        executor.fail(&["ping"])
    }

    #[test]
    fn host_network_parses_route_and_addr() {
        let executor = host_stub();
        let network = Network::new(&executor, 1.0);
        let host = network.host_network().unwrap();
        assert_eq!(host.gateway, "192.168.1.1");
        assert_eq!(host.interface, "vmbr0");
        assert_eq!(host.ip, "192.168.1.10");
        assert_eq!(host.mask, "24");
        assert_eq!(host.subnet(), "192.168.1");
    }

    #[test]
    fn missing_default_route_is_an_error() {
        let executor = ScriptedExecutor::new();
        let network = Network::new(&executor, 1.0);
        assert!(matches!(
            network.host_network(),
            Err(NetworkError::HostNetwork(_))
        ));
    }

    #[test]
    fn range_resolves_within_host_subnet() {
        for (start, end) in [(21, 50), (1, 1), (200, 254)] {
            let executor = all_free(host_stub());
            let network = Network::new(&executor, 1.0);
            let resolved = network.resolve_ip(&format!("{start}-{end}")).unwrap();

            assert!(resolved.address.starts_with("192.168.1."));
            let last: u16 = resolved.address.rsplit('.').next().unwrap().parse().unwrap();
            assert!((start..=end).contains(&last));
            assert_eq!(resolved.mask, "24");
            assert_eq!(resolved.gateway, "192.168.1.1");
        }
    }

    #[test]
    fn range_skips_addresses_in_use() {
        let executor = host_stub()
            .on(
                &["ping", "-c", "1", "-W", "1", "192.168.1.21"],
                CommandResult::new(0, "", ""),
            )
            .fail(&["ping"]);
        let network = Network::new(&executor, 1.0);
        assert_eq!(network.resolve_ip("21-50").unwrap().address, "192.168.1.22");
    }

    #[test]
    fn full_range_in_use_is_no_free_ip() {
        // unmatched pings succeed, so every address answers
        let executor = host_stub();
        let network = Network::new(&executor, 1.0);
        assert!(matches!(
            network.resolve_ip("21-23"),
            Err(NetworkError::NoFreeIp(_))
        ));
    }

    #[test]
    fn full_address_passes_through() {
        let executor = ScriptedExecutor::new();
        let calls = executor.calls();
        let network = Network::new(&executor, 1.0);

        let resolved = network.resolve_ip("192.168.1.100/24").unwrap();
        assert_eq!(resolved.address, "192.168.1.100");
        assert_eq!(resolved.mask, "24");
        assert_eq!(resolved.gateway, "192.168.1.1");
        assert_eq!(resolved.cidr(), "192.168.1.100/24");
        assert!(calls.borrow().is_empty());

        let resolved = network.resolve_ip("10.20.30.40/16").unwrap();
        assert_eq!(resolved.mask, "16");
        assert_eq!(resolved.gateway, "10.20.30.1");
    }

    #[test]
    fn bare_address_defaults_to_slash_24() {
        let executor = ScriptedExecutor::new();
        let network = Network::new(&executor, 1.0);
        assert_eq!(network.resolve_ip("10.0.0.7").unwrap().mask, "24");
    }

    #[test]
    fn garbage_is_invalid_format() {
        let executor = ScriptedExecutor::new();
        let network = Network::new(&executor, 1.0);
        for arg in ["dhcp", "10.0.0", "a-b", "10.0.0.1/"] {
            assert!(
                matches!(network.resolve_ip(arg), Err(NetworkError::InvalidFormat(_))),
                "{arg}"
            );
        }
    }

    #[test]
    fn list_free_ips_with_explicit_subnet() {
        let executor = ScriptedExecutor::new()
            .on(&["ping", "-c", "1", "-W", "2", "10.0.5.3"], CommandResult::new(0, "", ""))
            .fail(&["ping"]);
        let calls = executor.calls();
        let network = Network::new(&executor, 1.5);

        let free = network.list_free_ips("10.0.5.2-4").unwrap();
        assert_eq!(free, vec!["10.0.5.2", "10.0.5.4"]);
        assert!(!issued(&calls, &["ip", "route"]));
    }

    #[test]
    fn list_free_ips_with_host_subnet() {
        let executor = all_free(host_stub());
        let network = Network::new(&executor, 1.0);
        assert_eq!(
            network.list_free_ips("30-31").unwrap(),
            vec!["192.168.1.30", "192.168.1.31"]
        );
    }

    #[test]
    fn list_free_ips_rejects_bad_range() {
        let executor = ScriptedExecutor::new();
        let network = Network::new(&executor, 1.0);
        assert!(network.list_free_ips("10.0.2-4").is_err());
        assert!(network.list_free_ips("nope").is_err());
    }

    #[test]
    fn list_free_ips_rejects_out_of_range_octets_before_pinging() {
        let executor = all_free(host_stub());
        let calls = executor.calls();
        let network = Network::new(&executor, 1.0);

        for range in ["10.0.5.254-300", "10.0.5.50-21", "250-300", "50-21", "0-5", "10.0.999.1-5"] {
            assert!(
                matches!(network.list_free_ips(range), Err(NetworkError::InvalidFormat(_))),
                "{range}"
            );
        }
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn resolve_rejects_reversed_range() {
        let executor = all_free(host_stub());
        let calls = executor.calls();
        let network = Network::new(&executor, 1.0);
        assert!(matches!(
            network.resolve_ip("50-21"),
            Err(NetworkError::InvalidFormat(_))
        ));
        assert!(calls.borrow().is_empty());
    }
}
