use std::fmt;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::bits::{bit, read_fixed_size_string, test_bit, write_fixed_size_string, write_padding_bytes};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFP10_PHY_PORT_LENGTH: usize = 48;
pub const OFP12_PORT_LENGTH: usize = 64;
pub const OFP_MAX_PORT_NAME_LEN: usize = 16;

/// Ports are 32 bit throughout this crate. OpenFlow 1.0 reserved ports
/// (0xff00 and up) map onto the same offsets below 0xffffffff.
pub const OFPP_MAX: u32 = 0xffff_ff00;
pub const OFPP_IN_PORT: u32 = 0xffff_fff8;
pub const OFPP_TABLE: u32 = 0xffff_fff9;
pub const OFPP_NORMAL: u32 = 0xffff_fffa;
pub const OFPP_FLOOD: u32 = 0xffff_fffb;
pub const OFPP_ALL: u32 = 0xffff_fffc;
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;
pub const OFPP_LOCAL: u32 = 0xffff_fffe;
pub const OFPP_ANY: u32 = 0xffff_ffff;

pub const OFPP10_MAX: u16 = 0xff00;
pub const OFPP10_NONE: u16 = 0xffff;

/// Widen an OpenFlow 1.0 port number.
pub fn port_from_of10(port: u16) -> u32 {
    if port >= OFPP10_MAX {
        0xffff_0000 | port as u32
    } else {
        port as u32
    }
}

/// Narrow a port number to its OpenFlow 1.0 encoding.
pub fn port_to_of10(port: u32) -> u16 {
    if port >= OFPP_MAX {
        (port & 0xffff) as u16
    } else {
        port as u16
    }
}

/// Port numbers with their reserved meanings spelled out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(u32),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    Controller,
    Local,
    Any,
}

impl PseudoPort {
    pub fn of_port(p: u32) -> PseudoPort {
        match p {
            OFPP_IN_PORT => PseudoPort::InPort,
            OFPP_TABLE => PseudoPort::Table,
            OFPP_NORMAL => PseudoPort::Normal,
            OFPP_FLOOD => PseudoPort::Flood,
            OFPP_ALL => PseudoPort::AllPorts,
            OFPP_CONTROLLER => PseudoPort::Controller,
            OFPP_LOCAL => PseudoPort::Local,
            OFPP_ANY => PseudoPort::Any,
            p => PseudoPort::PhysicalPort(p),
        }
    }

    pub fn port(self) -> u32 {
        match self {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OFPP_IN_PORT,
            PseudoPort::Table => OFPP_TABLE,
            PseudoPort::Normal => OFPP_NORMAL,
            PseudoPort::Flood => OFPP_FLOOD,
            PseudoPort::AllPorts => OFPP_ALL,
            PseudoPort::Controller => OFPP_CONTROLLER,
            PseudoPort::Local => OFPP_LOCAL,
            PseudoPort::Any => OFPP_ANY,
        }
    }
}

impl fmt::Display for PseudoPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PseudoPort::PhysicalPort(p) => write!(f, "{}", p),
            PseudoPort::InPort => write!(f, "in_port"),
            PseudoPort::Table => write!(f, "table"),
            PseudoPort::Normal => write!(f, "normal"),
            PseudoPort::Flood => write!(f, "flood"),
            PseudoPort::AllPorts => write!(f, "all"),
            PseudoPort::Controller => write!(f, "controller"),
            PseudoPort::Local => write!(f, "local"),
            PseudoPort::Any => write!(f, "any"),
        }
    }
}

/// Spanning tree state of an OpenFlow 1.0 port.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StpState {
    Listen = 0,
    Learn = 1,
    Forward = 2,
    Block = 3,
}

impl Default for StpState {
    fn default() -> StpState {
        StpState::Listen
    }
}

/// Current state of a physical port. Not configurable by the controller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortState {
    pub down: bool,
    /// 1.0 only.
    pub stp_state: StpState,
    /// 1.2 and later.
    pub blocked: bool,
    /// 1.2 and later.
    pub live: bool,
}

impl PortState {
    fn of_int(version: OfpVersion, d: u32) -> PortState {
        let d64 = d as u64;
        match version {
            OfpVersion::Of10 => PortState {
                down: test_bit(0, d64),
                stp_state: match (d >> 8) & 3 {
                    0 => StpState::Listen,
                    1 => StpState::Learn,
                    2 => StpState::Forward,
                    _ => StpState::Block,
                },
                blocked: false,
                live: false,
            },
            _ => PortState {
                down: test_bit(0, d64),
                stp_state: StpState::Listen,
                blocked: test_bit(1, d64),
                live: test_bit(2, d64),
            },
        }
    }

    fn to_int(self, version: OfpVersion) -> u32 {
        let d = bit(0, 0, self.down);
        match version {
            OfpVersion::Of10 => d as u32 | (self.stp_state as u32) << 8,
            _ => bit(2, bit(1, d, self.blocked), self.live) as u32,
        }
    }
}

/// Features of physical ports available in a datapath.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortFeatures {
    pub f_10mbhd: bool,
    pub f_10mbfd: bool,
    pub f_100mbhd: bool,
    pub f_100mbfd: bool,
    pub f_1gbhd: bool,
    pub f_1gbfd: bool,
    pub f_10gbfd: bool,
    pub f_40gbfd: bool,
    pub f_100gbfd: bool,
    pub f_1tbfd: bool,
    pub other: bool,
    pub copper: bool,
    pub fiber: bool,
    pub autoneg: bool,
    pub pause: bool,
    pub pause_asym: bool,
}

impl PortFeatures {
    /// The medium and negotiation bits moved up by four in 1.2.
    fn medium_shift(version: OfpVersion) -> u64 {
        if version == OfpVersion::Of10 {
            7
        } else {
            11
        }
    }

    fn of_int(version: OfpVersion, d: u32) -> PortFeatures {
        let d = d as u64;
        let m = PortFeatures::medium_shift(version);
        let oxm = version.is_oxm();
        PortFeatures {
            f_10mbhd: test_bit(0, d),
            f_10mbfd: test_bit(1, d),
            f_100mbhd: test_bit(2, d),
            f_100mbfd: test_bit(3, d),
            f_1gbhd: test_bit(4, d),
            f_1gbfd: test_bit(5, d),
            f_10gbfd: test_bit(6, d),
            f_40gbfd: oxm && test_bit(7, d),
            f_100gbfd: oxm && test_bit(8, d),
            f_1tbfd: oxm && test_bit(9, d),
            other: oxm && test_bit(10, d),
            copper: test_bit(m, d),
            fiber: test_bit(m + 1, d),
            autoneg: test_bit(m + 2, d),
            pause: test_bit(m + 3, d),
            pause_asym: test_bit(m + 4, d),
        }
    }

    fn to_int(self, version: OfpVersion) -> u32 {
        let m = PortFeatures::medium_shift(version);
        let mut d = 0;
        d = bit(0, d, self.f_10mbhd);
        d = bit(1, d, self.f_10mbfd);
        d = bit(2, d, self.f_100mbhd);
        d = bit(3, d, self.f_100mbfd);
        d = bit(4, d, self.f_1gbhd);
        d = bit(5, d, self.f_1gbfd);
        d = bit(6, d, self.f_10gbfd);
        if version.is_oxm() {
            d = bit(7, d, self.f_40gbfd);
            d = bit(8, d, self.f_100gbfd);
            d = bit(9, d, self.f_1tbfd);
            d = bit(10, d, self.other);
        }
        d = bit(m, d, self.copper);
        d = bit(m + 1, d, self.fiber);
        d = bit(m + 2, d, self.autoneg);
        d = bit(m + 3, d, self.pause);
        d = bit(m + 4, d, self.pause_asym);
        d as u32
    }
}

/// Flags to indicate behavior of the physical port.
///
/// These flags are used both to describe the current configuration of a physical port,
/// and to configure a port's behavior. `no_stp`, `no_recv_stp` and `no_flood`
/// only exist in 1.0.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
    pub down: bool,
    pub no_stp: bool,
    pub no_recv: bool,
    pub no_recv_stp: bool,
    pub no_flood: bool,
    pub no_fwd: bool,
    pub no_packet_in: bool,
}

impl PortConfig {
    fn of_int(version: OfpVersion, d: u32) -> PortConfig {
        let d = d as u64;
        let of10 = version == OfpVersion::Of10;
        PortConfig {
            down: test_bit(0, d),
            no_stp: of10 && test_bit(1, d),
            no_recv: test_bit(2, d),
            no_recv_stp: of10 && test_bit(3, d),
            no_flood: of10 && test_bit(4, d),
            no_fwd: test_bit(5, d),
            no_packet_in: test_bit(6, d),
        }
    }

    fn to_int(self, version: OfpVersion) -> u32 {
        let of10 = version == OfpVersion::Of10;
        let mut d = 0;
        d = bit(0, d, self.down);
        d = bit(1, d, of10 && self.no_stp);
        d = bit(2, d, self.no_recv);
        d = bit(3, d, of10 && self.no_recv_stp);
        d = bit(4, d, of10 && self.no_flood);
        d = bit(5, d, self.no_fwd);
        d = bit(6, d, self.no_packet_in);
        d as u32
    }
}

/// Description of a physical port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortDesc {
    version: OfpVersion,
    pub port_no: u32,
    pub hw_addr: [u8; 6],
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
    /// kbps, 1.2 and later.
    pub curr_speed: u32,
    /// kbps, 1.2 and later.
    pub max_speed: u32,
}

impl PortDesc {
    pub fn new(version: OfpVersion, port_no: u32, hw_addr: [u8; 6], name: &str) -> PortDesc {
        PortDesc {
            version,
            port_no,
            hw_addr,
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Versioned for PortDesc {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for PortDesc {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 => OFP10_PHY_PORT_LENGTH,
            OfpVersion::Of12 | OfpVersion::Of13 => OFP12_PORT_LENGTH,
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("port description")?;
        if v == OfpVersion::Of10 {
            bytes.write_u16::<BigEndian>(port_to_of10(self.port_no))?;
            bytes.extend_from_slice(&self.hw_addr);
        } else {
            bytes.write_u32::<BigEndian>(self.port_no)?;
            write_padding_bytes(bytes, 4);
            bytes.extend_from_slice(&self.hw_addr);
            write_padding_bytes(bytes, 2);
        }
        write_fixed_size_string(bytes, &self.name, OFP_MAX_PORT_NAME_LEN)?;
        bytes.write_u32::<BigEndian>(self.config.to_int(v))?;
        bytes.write_u32::<BigEndian>(self.state.to_int(v))?;
        bytes.write_u32::<BigEndian>(self.curr.to_int(v))?;
        bytes.write_u32::<BigEndian>(self.advertised.to_int(v))?;
        bytes.write_u32::<BigEndian>(self.supported.to_int(v))?;
        bytes.write_u32::<BigEndian>(self.peer.to_int(v))?;
        if v != OfpVersion::Of10 {
            bytes.write_u32::<BigEndian>(self.curr_speed)?;
            bytes.write_u32::<BigEndian>(self.max_speed)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("port description")?;
        let len = self.length();
        if buf.len() < len {
            return Err(OfpError::bad_length("port description", buf.len(), len));
        }
        let mut bytes = Cursor::new(buf);
        let mut hw_addr = [0; 6];
        if v == OfpVersion::Of10 {
            self.port_no = port_from_of10(bytes.read_u16::<BigEndian>()?);
            bytes.read_exact(&mut hw_addr)?;
        } else {
            self.port_no = bytes.read_u32::<BigEndian>()?;
            bytes.read_u32::<BigEndian>()?;
            bytes.read_exact(&mut hw_addr)?;
            bytes.read_u16::<BigEndian>()?;
        }
        self.hw_addr = hw_addr;
        self.name = read_fixed_size_string(&mut bytes, OFP_MAX_PORT_NAME_LEN)?;
        self.config = PortConfig::of_int(v, bytes.read_u32::<BigEndian>()?);
        self.state = PortState::of_int(v, bytes.read_u32::<BigEndian>()?);
        self.curr = PortFeatures::of_int(v, bytes.read_u32::<BigEndian>()?);
        self.advertised = PortFeatures::of_int(v, bytes.read_u32::<BigEndian>()?);
        self.supported = PortFeatures::of_int(v, bytes.read_u32::<BigEndian>()?);
        self.peer = PortFeatures::of_int(v, bytes.read_u32::<BigEndian>()?);
        if v == OfpVersion::Of10 {
            self.curr_speed = 0;
            self.max_speed = 0;
        } else {
            self.curr_speed = bytes.read_u32::<BigEndian>()?;
            self.max_speed = bytes.read_u32::<BigEndian>()?;
        }
        Ok(())
    }
}

/// Port descriptions as carried in features replies and port-desc stats.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortList {
    version: OfpVersion,
    ports: Vec<PortDesc>,
}

impl PortList {
    pub fn new(version: OfpVersion) -> PortList {
        PortList {
            version,
            ports: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<PortDesc> {
        self.ports.iter()
    }

    pub fn add_port(&mut self, mut port: PortDesc) -> &mut PortDesc {
        port.set_version(self.version);
        self.ports.retain(|p| p.port_no != port.port_no);
        self.ports.push(port);
        let last = self.ports.len() - 1;
        &mut self.ports[last]
    }

    pub fn get_port(&self, port_no: u32) -> Result<&PortDesc> {
        self.ports
            .iter()
            .find(|p| p.port_no == port_no)
            .ok_or_else(|| OfpError::NotFound(format!("port {}", port_no)))
    }

    pub fn drop_port(&mut self, port_no: u32) -> Result<PortDesc> {
        match self.ports.iter().position(|p| p.port_no == port_no) {
            Some(i) => Ok(self.ports.remove(i)),
            None => Err(OfpError::NotFound(format!("port {}", port_no))),
        }
    }
}

impl Versioned for PortList {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for p in &mut self.ports {
            p.set_version(version);
        }
    }
}

impl OfpWire for PortList {
    fn length(&self) -> usize {
        self.ports.iter().map(|p| p.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for p in &self.ports {
            p.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.ports.clear();
        let size = PortDesc::new(self.version, 0, [0; 6], "").length();
        if size == 0 {
            return Err(OfpError::bad_version(self.version, "port list"));
        }
        if buf.len() % size != 0 {
            return Err(OfpError::bad_length("port list", buf.len(), buf.len() / size * size));
        }
        for chunk in buf.chunks(size) {
            let mut port = PortDesc::new(self.version, 0, [0; 6], "");
            port.unpack(chunk)?;
            self.ports.push(port);
        }
        debug!("unpacked {} port description(s)", self.ports.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_port_mapping() {
        assert_eq!(port_from_of10(6), 6);
        assert_eq!(port_from_of10(0xfffd), OFPP_CONTROLLER);
        assert_eq!(port_to_of10(OFPP_CONTROLLER), 0xfffd);
        assert_eq!(port_to_of10(OFPP_ANY), OFPP10_NONE);
        assert_eq!(PseudoPort::of_port(OFPP_FLOOD), PseudoPort::Flood);
        assert_eq!(PseudoPort::of_port(3).port(), 3);
    }

    fn sample(version: OfpVersion) -> PortDesc {
        let mut p = PortDesc::new(version, 2, [0, 1, 2, 3, 4, 5], "eth2");
        p.config.no_recv = true;
        p.state.down = true;
        p.curr.f_1gbfd = true;
        p.curr.copper = true;
        p.supported.autoneg = true;
        p
    }

    #[test]
    fn of10_phy_port() {
        let p = sample(OfpVersion::Of10);
        let bytes = p.to_bytes().unwrap();
        assert_eq!(bytes.len(), OFP10_PHY_PORT_LENGTH);
        assert_eq!(&bytes[0..2], &[0, 2]);
        assert_eq!(&bytes[8..12], b"eth2");
        // copper is bit 7 in 1.0
        assert_eq!(&bytes[32..36], &[0, 0, 0, 0xa0]);
        let mut back = PortDesc::new(OfpVersion::Of10, 0, [0; 6], "");
        back.unpack(&bytes).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn of13_port() {
        let mut p = sample(OfpVersion::Of13);
        p.curr.f_40gbfd = true;
        p.curr_speed = 1_000_000;
        let bytes = p.to_bytes().unwrap();
        assert_eq!(bytes.len(), OFP12_PORT_LENGTH);
        // copper is bit 11 in 1.2+
        assert_eq!(&bytes[40..44], &[0, 0, 0x08, 0xa0]);
        let mut back = PortDesc::new(OfpVersion::Of13, 0, [0; 6], "");
        back.unpack(&bytes).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn port_list() {
        let mut list = PortList::new(OfpVersion::Of12);
        list.add_port(sample(OfpVersion::Of10));
        list.add_port(PortDesc::new(OfpVersion::Of12, 7, [0; 6], "eth7"));
        assert_eq!(list.length(), 128);
        let bytes = list.to_bytes().unwrap();
        let mut back = PortList::new(OfpVersion::Of12);
        back.unpack(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get_port(7).unwrap().name, "eth7");
        assert!(back.get_port(8).unwrap_err().is_not_found());
        assert!(matches!(
            back.unpack(&bytes[..100]),
            Err(OfpError::BadLength { .. })
        ));
    }
}
