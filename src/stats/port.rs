use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::check_length;
use crate::bits::write_padding_bytes;
use crate::ofp_error::Result;
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};
use crate::port::{port_from_of10, port_to_of10, OFPP_ANY};

const OFP_PORT_STATS_REQUEST_LENGTH: usize = 8;
const OFP10_PORT_STATS_LENGTH: usize = 104;
const OFP13_PORT_STATS_LENGTH: usize = 112;

/// Port number plus padding, 8 bytes in every version.
pub(super) fn write_port_no(bytes: &mut Vec<u8>, version: OfpVersion, port_no: u32) -> Result<()> {
    if version == OfpVersion::Of10 {
        bytes.write_u16::<BigEndian>(port_to_of10(port_no))?;
        write_padding_bytes(bytes, 6);
    } else {
        bytes.write_u32::<BigEndian>(port_no)?;
        write_padding_bytes(bytes, 4);
    }
    Ok(())
}

pub(super) fn read_port_no(bytes: &mut Cursor<&[u8]>, version: OfpVersion) -> Result<u32> {
    let port_no = if version == OfpVersion::Of10 {
        port_from_of10(bytes.read_u16::<BigEndian>()?)
    } else {
        bytes.read_u32::<BigEndian>()?
    };
    bytes.set_position(8);
    Ok(port_no)
}

/// Ask for the counters of one port, or all of them with `OFPP_ANY`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatsRequest {
    version: OfpVersion,
    pub port_no: u32,
}

impl PortStatsRequest {
    pub fn new(version: OfpVersion, port_no: u32) -> PortStatsRequest {
        PortStatsRequest { version, port_no }
    }

    pub fn all(version: OfpVersion) -> PortStatsRequest {
        PortStatsRequest::new(version, OFPP_ANY)
    }
}

impl Versioned for PortStatsRequest {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for PortStatsRequest {
    fn length(&self) -> usize {
        OFP_PORT_STATS_REQUEST_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("port stats request")?;
        write_port_no(bytes, v, self.port_no)
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("port stats request")?;
        check_length("port stats request", buf, OFP_PORT_STATS_REQUEST_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.port_no = read_port_no(&mut bytes, v)?;
        Ok(())
    }
}

/// A received/transmitted pair of counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransmissionCounter {
    pub rx: u64,
    pub tx: u64,
}

/// Counters of a single port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStats {
    version: OfpVersion,
    pub port_no: u32,
    pub packets: TransmissionCounter,
    pub bytes: TransmissionCounter,
    pub dropped: TransmissionCounter,
    pub errors: TransmissionCounter,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
    /// 1.3 only.
    pub duration_sec: u32,
    /// 1.3 only.
    pub duration_nsec: u32,
}

impl PortStats {
    pub fn new(version: OfpVersion, port_no: u32) -> PortStats {
        PortStats {
            version,
            port_no,
            packets: TransmissionCounter::default(),
            bytes: TransmissionCounter::default(),
            dropped: TransmissionCounter::default(),
            errors: TransmissionCounter::default(),
            rx_frame_err: 0,
            rx_over_err: 0,
            rx_crc_err: 0,
            collisions: 0,
            duration_sec: 0,
            duration_nsec: 0,
        }
    }
}

impl Versioned for PortStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for PortStats {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 | OfpVersion::Of12 => OFP10_PORT_STATS_LENGTH,
            OfpVersion::Of13 => OFP13_PORT_STATS_LENGTH,
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("port stats")?;
        write_port_no(bytes, v, self.port_no)?;
        for c in &[self.packets, self.bytes, self.dropped, self.errors] {
            bytes.write_u64::<BigEndian>(c.rx)?;
            bytes.write_u64::<BigEndian>(c.tx)?;
        }
        bytes.write_u64::<BigEndian>(self.rx_frame_err)?;
        bytes.write_u64::<BigEndian>(self.rx_over_err)?;
        bytes.write_u64::<BigEndian>(self.rx_crc_err)?;
        bytes.write_u64::<BigEndian>(self.collisions)?;
        if v == OfpVersion::Of13 {
            bytes.write_u32::<BigEndian>(self.duration_sec)?;
            bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("port stats")?;
        check_length("port stats", buf, self.length())?;
        let mut bytes = Cursor::new(buf);
        self.port_no = read_port_no(&mut bytes, v)?;
        let mut counter = || -> Result<TransmissionCounter> {
            Ok(TransmissionCounter {
                rx: bytes.read_u64::<BigEndian>()?,
                tx: bytes.read_u64::<BigEndian>()?,
            })
        };
        self.packets = counter()?;
        self.bytes = counter()?;
        self.dropped = counter()?;
        self.errors = counter()?;
        self.rx_frame_err = bytes.read_u64::<BigEndian>()?;
        self.rx_over_err = bytes.read_u64::<BigEndian>()?;
        self.rx_crc_err = bytes.read_u64::<BigEndian>()?;
        self.collisions = bytes.read_u64::<BigEndian>()?;
        if v == OfpVersion::Of13 {
            self.duration_sec = bytes.read_u32::<BigEndian>()?;
            self.duration_nsec = bytes.read_u32::<BigEndian>()?;
        } else {
            self.duration_sec = 0;
            self.duration_nsec = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::OFPP_LOCAL;

    #[test]
    fn request_port_width() {
        let req = PortStatsRequest::new(OfpVersion::Of10, OFPP_LOCAL);
        assert_eq!(req.to_bytes().unwrap(), vec![0xff, 0xfe, 0, 0, 0, 0, 0, 0]);
        let req = PortStatsRequest::all(OfpVersion::Of13);
        assert_eq!(req.to_bytes().unwrap(), vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);

        let mut back = PortStatsRequest::all(OfpVersion::Of10);
        back.unpack(&[0, 7, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(back.port_no, 7);
    }

    #[test]
    fn stats_sizes_per_version() {
        for &(v, len) in &[
            (OfpVersion::Of10, 104),
            (OfpVersion::Of12, 104),
            (OfpVersion::Of13, 112),
        ] {
            let mut stats = PortStats::new(v, 3);
            stats.packets = TransmissionCounter { rx: 10, tx: 20 };
            stats.collisions = 1;
            if v == OfpVersion::Of13 {
                stats.duration_sec = 60;
            }
            let bytes = stats.to_bytes().unwrap();
            assert_eq!(bytes.len(), len);
            assert_eq!(stats.length(), len);
            let mut back = PortStats::new(v, 0);
            back.unpack(&bytes).unwrap();
            assert_eq!(back, stats);
        }
    }

    #[test]
    fn short_stats() {
        let mut stats = PortStats::new(OfpVersion::Of13, 0);
        assert!(stats.unpack(&[0; 104]).is_err());
    }
}
