use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::check_length;
use crate::bits::write_padding_bytes;
use crate::meter::require_of13;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFPM_ALL: u32 = 0xffff_ffff;

const OFP_METER_STATS_REQUEST_LENGTH: usize = 8;
const OFP_METER_STATS_LENGTH: usize = 40;
const OFP_METER_BAND_STATS_LENGTH: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterStatsRequest {
    version: OfpVersion,
    pub meter_id: u32,
}

impl MeterStatsRequest {
    pub fn new(version: OfpVersion, meter_id: u32) -> MeterStatsRequest {
        MeterStatsRequest { version, meter_id }
    }
}

impl Versioned for MeterStatsRequest {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for MeterStatsRequest {
    fn length(&self) -> usize {
        OFP_METER_STATS_REQUEST_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_of13(self.version, "meter stats request")?;
        bytes.write_u32::<BigEndian>(self.meter_id)?;
        write_padding_bytes(bytes, 4);
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_of13(self.version, "meter stats request")?;
        check_length("meter stats request", buf, OFP_METER_STATS_REQUEST_LENGTH)?;
        self.meter_id = Cursor::new(buf).read_u32::<BigEndian>()?;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MeterBandStats {
    pub packet_band_count: u64,
    pub byte_band_count: u64,
}

impl OfpWire for MeterBandStats {
    fn length(&self) -> usize {
        OFP_METER_BAND_STATS_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.packet_band_count)?;
        bytes.write_u64::<BigEndian>(self.byte_band_count)?;
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        check_length("meter band stats", buf, OFP_METER_BAND_STATS_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.packet_band_count = bytes.read_u64::<BigEndian>()?;
        self.byte_band_count = bytes.read_u64::<BigEndian>()?;
        Ok(())
    }
}

/// Band counters in configuration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeterBandStatsArray {
    bands: Vec<MeterBandStats>,
}

impl MeterBandStatsArray {
    pub fn new() -> MeterBandStatsArray {
        MeterBandStatsArray::default()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn push(&mut self, band: MeterBandStats) {
        self.bands.push(band);
    }

    pub fn get(&self, index: usize) -> Result<&MeterBandStats> {
        let len = self.bands.len();
        self.bands
            .get(index)
            .ok_or(OfpError::OutOfRange { index, len })
    }

    pub fn iter(&self) -> std::slice::Iter<MeterBandStats> {
        self.bands.iter()
    }
}

impl OfpWire for MeterBandStatsArray {
    fn length(&self) -> usize {
        self.bands.len() * OFP_METER_BAND_STATS_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for b in &self.bands {
            b.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() % OFP_METER_BAND_STATS_LENGTH != 0 {
            return Err(OfpError::bad_length(
                "meter band stats",
                buf.len(),
                buf.len() - buf.len() % OFP_METER_BAND_STATS_LENGTH,
            ));
        }
        self.bands.clear();
        for chunk in buf.chunks(OFP_METER_BAND_STATS_LENGTH) {
            let mut band = MeterBandStats::default();
            band.unpack(chunk)?;
            self.bands.push(band);
        }
        Ok(())
    }
}

/// Counters of one meter (1.3 only).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterStats {
    version: OfpVersion,
    pub meter_id: u32,
    pub flow_count: u32,
    pub packet_in_count: u64,
    pub byte_in_count: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub band_stats: MeterBandStatsArray,
}

impl MeterStats {
    pub fn new(version: OfpVersion, meter_id: u32) -> MeterStats {
        MeterStats {
            version,
            meter_id,
            flow_count: 0,
            packet_in_count: 0,
            byte_in_count: 0,
            duration_sec: 0,
            duration_nsec: 0,
            band_stats: MeterBandStatsArray::new(),
        }
    }
}

impl Versioned for MeterStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for MeterStats {
    fn length(&self) -> usize {
        OFP_METER_STATS_LENGTH + self.band_stats.length()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_of13(self.version, "meter stats")?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("meter stats", len, u16::max_value() as usize));
        }
        bytes.write_u32::<BigEndian>(self.meter_id)?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        write_padding_bytes(bytes, 6);
        bytes.write_u32::<BigEndian>(self.flow_count)?;
        bytes.write_u64::<BigEndian>(self.packet_in_count)?;
        bytes.write_u64::<BigEndian>(self.byte_in_count)?;
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        self.band_stats.marshal(bytes)
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_of13(self.version, "meter stats")?;
        check_length("meter stats", buf, OFP_METER_STATS_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.meter_id = bytes.read_u32::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < OFP_METER_STATS_LENGTH || len > buf.len() {
            return Err(OfpError::bad_length("meter stats", len, buf.len()));
        }
        bytes.set_position(12);
        self.flow_count = bytes.read_u32::<BigEndian>()?;
        self.packet_in_count = bytes.read_u64::<BigEndian>()?;
        self.byte_in_count = bytes.read_u64::<BigEndian>()?;
        self.duration_sec = bytes.read_u32::<BigEndian>()?;
        self.duration_nsec = bytes.read_u32::<BigEndian>()?;
        self.band_stats.unpack(&buf[OFP_METER_STATS_LENGTH..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_stats_with_bands() {
        let mut stats = MeterStats::new(OfpVersion::Of13, 1);
        stats.flow_count = 2;
        stats.band_stats.push(MeterBandStats {
            packet_band_count: 3,
            byte_band_count: 300,
        });
        stats.band_stats.push(MeterBandStats::default());
        assert_eq!(stats.length(), 72);
        let bytes = stats.to_bytes().unwrap();
        assert_eq!(&bytes[..6], &[0, 0, 0, 1, 0, 72]);
        let mut back = MeterStats::new(OfpVersion::Of13, 0);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, stats);
        assert_eq!(back.band_stats.get(0).unwrap().byte_band_count, 300);
        assert!(back.band_stats.get(2).is_err());
    }

    #[test]
    fn meters_need_of13() {
        let stats = MeterStats::new(OfpVersion::Of12, 1);
        assert!(matches!(stats.to_bytes(), Err(OfpError::BadVersion { .. })));
        let req = MeterStatsRequest::new(OfpVersion::Of13, OFPM_ALL);
        assert_eq!(req.to_bytes().unwrap(), vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
    }

    #[test]
    fn ragged_bands() {
        let mut bytes = MeterStats::new(OfpVersion::Of13, 1).to_bytes().unwrap();
        bytes.extend_from_slice(&[0; 8]);
        bytes[5] = 48;
        let mut back = MeterStats::new(OfpVersion::Of13, 0);
        assert!(back.unpack(&bytes).is_err());
    }
}
