use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::check_length;
use crate::bits::write_padding_bytes;
use crate::ofp_error::Result;
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};
use crate::port::{port_from_of10, port_to_of10, OFPP_ANY};

pub const OFPQ_ALL: u32 = 0xffff_ffff;

const OFP_QUEUE_STATS_REQUEST_LENGTH: usize = 8;
const OFP10_QUEUE_STATS_LENGTH: usize = 32;
const OFP13_QUEUE_STATS_LENGTH: usize = 40;

/// `{port_no: u16, pad[2]}` in 1.0, a plain u32 afterwards.
fn write_port(bytes: &mut Vec<u8>, version: OfpVersion, port_no: u32) -> Result<()> {
    if version == OfpVersion::Of10 {
        bytes.write_u16::<BigEndian>(port_to_of10(port_no))?;
        write_padding_bytes(bytes, 2);
    } else {
        bytes.write_u32::<BigEndian>(port_no)?;
    }
    Ok(())
}

fn read_port(bytes: &mut Cursor<&[u8]>, version: OfpVersion) -> Result<u32> {
    if version == OfpVersion::Of10 {
        let port_no = port_from_of10(bytes.read_u16::<BigEndian>()?);
        bytes.read_u16::<BigEndian>()?;
        Ok(port_no)
    } else {
        Ok(bytes.read_u32::<BigEndian>()?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueStatsRequest {
    version: OfpVersion,
    pub port_no: u32,
    pub queue_id: u32,
}

impl QueueStatsRequest {
    pub fn new(version: OfpVersion, port_no: u32, queue_id: u32) -> QueueStatsRequest {
        QueueStatsRequest {
            version,
            port_no,
            queue_id,
        }
    }

    /// Every queue on every port.
    pub fn all(version: OfpVersion) -> QueueStatsRequest {
        QueueStatsRequest::new(version, OFPP_ANY, OFPQ_ALL)
    }
}

impl Versioned for QueueStatsRequest {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for QueueStatsRequest {
    fn length(&self) -> usize {
        OFP_QUEUE_STATS_REQUEST_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("queue stats request")?;
        write_port(bytes, v, self.port_no)?;
        bytes.write_u32::<BigEndian>(self.queue_id)?;
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("queue stats request")?;
        check_length("queue stats request", buf, OFP_QUEUE_STATS_REQUEST_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.port_no = read_port(&mut bytes, v)?;
        self.queue_id = bytes.read_u32::<BigEndian>()?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueStats {
    version: OfpVersion,
    pub port_no: u32,
    pub queue_id: u32,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    /// 1.3 only.
    pub duration_sec: u32,
    /// 1.3 only.
    pub duration_nsec: u32,
}

impl QueueStats {
    pub fn new(version: OfpVersion, port_no: u32, queue_id: u32) -> QueueStats {
        QueueStats {
            version,
            port_no,
            queue_id,
            tx_bytes: 0,
            tx_packets: 0,
            tx_errors: 0,
            duration_sec: 0,
            duration_nsec: 0,
        }
    }
}

impl Versioned for QueueStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for QueueStats {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 | OfpVersion::Of12 => OFP10_QUEUE_STATS_LENGTH,
            OfpVersion::Of13 => OFP13_QUEUE_STATS_LENGTH,
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("queue stats")?;
        write_port(bytes, v, self.port_no)?;
        bytes.write_u32::<BigEndian>(self.queue_id)?;
        bytes.write_u64::<BigEndian>(self.tx_bytes)?;
        bytes.write_u64::<BigEndian>(self.tx_packets)?;
        bytes.write_u64::<BigEndian>(self.tx_errors)?;
        if v == OfpVersion::Of13 {
            bytes.write_u32::<BigEndian>(self.duration_sec)?;
            bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("queue stats")?;
        check_length("queue stats", buf, self.length())?;
        let mut bytes = Cursor::new(buf);
        self.port_no = read_port(&mut bytes, v)?;
        self.queue_id = bytes.read_u32::<BigEndian>()?;
        self.tx_bytes = bytes.read_u64::<BigEndian>()?;
        self.tx_packets = bytes.read_u64::<BigEndian>()?;
        self.tx_errors = bytes.read_u64::<BigEndian>()?;
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

    #[test]
    fn request_layouts() {
        let req = QueueStatsRequest::new(OfpVersion::Of10, 1, 2);
        assert_eq!(req.to_bytes().unwrap(), vec![0, 1, 0, 0, 0, 0, 0, 2]);
        let req = QueueStatsRequest::all(OfpVersion::Of12);
        assert_eq!(req.to_bytes().unwrap(), vec![0xff; 8]);
        let mut back = QueueStatsRequest::all(OfpVersion::Of10);
        back.unpack(&[0xff, 0xff, 0, 0, 0xff, 0xff, 0xff, 0xff]).unwrap();
        assert_eq!(back.port_no, OFPP_ANY);
        assert_eq!(back.queue_id, OFPQ_ALL);
    }

    #[test]
    fn stats_layouts() {
        let mut stats = QueueStats::new(OfpVersion::Of13, 2, 1);
        stats.tx_packets = 9;
        stats.duration_nsec = 500;
        let bytes = stats.to_bytes().unwrap();
        assert_eq!(bytes.len(), 40);
        let mut back = QueueStats::new(OfpVersion::Of13, 0, 0);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, stats);

        stats.set_version(OfpVersion::Of10);
        stats.duration_nsec = 0;
        let bytes = stats.to_bytes().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..8], &[0, 2, 0, 0, 0, 0, 0, 1]);
        let mut back = QueueStats::new(OfpVersion::Of10, 0, 0);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, stats);
    }
}
