//! Reachable addresses for the operator to hand out.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use url::Url;

use crate::routing::RouteToken;

/// Non-loopback IPv4 addresses of the local interfaces.
pub fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => lan_ipv4(interfaces.iter().map(|iface| iface.ip())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to enumerate network interfaces");
            Vec::new()
        }
    }
}

/// Sorted, de-duplicated non-loopback IPv4 addresses from `ips`.
fn lan_ipv4(ips: impl IntoIterator<Item = IpAddr>) -> Vec<Ipv4Addr> {
    ips.into_iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Hosts to advertise for a listener bound to `bind`.
///
/// A specific bind address is advertised as-is. The unspecified address
/// expands to every LAN IPv4 address, or loopback on a machine without one.
pub fn advertised_hosts(bind: IpAddr) -> Vec<IpAddr> {
    if !bind.is_unspecified() {
        return vec![bind];
    }

    let lan: Vec<IpAddr> = local_ipv4_addresses().into_iter().map(IpAddr::V4).collect();
    if lan.is_empty() {
        vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]
    } else {
        lan
    }
}

/// `http://<host>:<port>/<token>` for each host.
pub fn local_urls(hosts: &[IpAddr], port: u16, route: &RouteToken) -> Vec<Url> {
    hosts
        .iter()
        .filter_map(|host| {
            let url = format!("http://{}{}", SocketAddr::new(*host, port), route.path());
            Url::parse(&url)
                .map_err(|e| tracing::warn!(host = %host, error = %e, "Skipping unusable address"))
                .ok()
        })
        .collect()
}

/// The tunnel's public base URL with the route appended.
pub fn public_url(base: &Url, route: &RouteToken) -> Result<Url, url::ParseError> {
    base.join(route.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_addresses_are_listed_once() {
        let ips = [
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
        ];
        assert_eq!(
            lan_ipv4(ips),
            vec![Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(192, 168, 1, 20)]
        );
    }

    #[test]
    fn specific_bind_is_advertised_as_is() {
        let bind: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(advertised_hosts(bind), vec![bind]);
    }

    #[test]
    fn unspecified_bind_never_advertises_nothing() {
        let hosts = advertised_hosts(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(!hosts.is_empty());
        assert!(hosts.iter().all(|h| h.is_ipv4() && !h.is_unspecified()));
    }

    #[test]
    fn every_url_shares_the_route() {
        let route = RouteToken::generate();
        let hosts: Vec<IpAddr> = vec![
            "192.168.1.10".parse().unwrap(),
            "10.0.0.3".parse().unwrap(),
            "::1".parse().unwrap(),
        ];
        let mut urls = local_urls(&hosts, 41234, &route);
        urls.push(public_url(&Url::parse("https://abc123.ngrok.app").unwrap(), &route).unwrap());

        assert_eq!(urls.len(), 4);
        assert_eq!(urls[0].as_str(), format!("http://192.168.1.10:41234/{route}"));
        assert_eq!(urls[2].as_str(), format!("http://[::1]:41234/{route}"));
        assert_eq!(urls[3].as_str(), format!("https://abc123.ngrok.app/{route}"));
        assert!(urls.iter().all(|u| u.path() == route.path()));
    }
}
