use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use serde::Serialize;

pub const SERVICE_TYPE: &str = "_qlab._tcp.local.";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAdvert {
    pub service_type: String,
    pub instance_name: String,
    pub address: IpAddr,
    pub port: u16,
}

impl ServiceAdvert {
    pub fn new(host_name: &str, address: IpAddr, port: u16) -> Self {
        Self {
            service_type: SERVICE_TYPE.to_string(),
            instance_name: format!("{}.{}", host_name, SERVICE_TYPE),
            address,
            port,
        }
    }

    /// Advert for this machine's LAN address.
    pub fn for_lan(host_name: &str, port: u16) -> Self {
        Self::new(host_name, lan_ip(), port)
    }
}

/// Address of the interface that would route to the outside world. No packet
/// is sent; falls back to loopback when there is no route.
pub fn lan_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or_else(|e| {
        log::debug!("No LAN route ({}), advertising loopback.", e);
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_name_is_qualified() {
        let advert = ServiceAdvert::new("Cue Bridge", IpAddr::V4(Ipv4Addr::new(192, 168, 0, 4)), 53000);
        assert_eq!(advert.instance_name, "Cue Bridge._qlab._tcp.local.");
        assert_eq!(advert.service_type, SERVICE_TYPE);
        assert_eq!(advert.port, 53000);
    }

    #[test]
    fn lan_ip_is_ipv4() {
        assert!(lan_ip().is_ipv4());
    }
}
