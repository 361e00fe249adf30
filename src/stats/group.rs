use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use super::{check_length, require_oxm};
use crate::bits::write_padding_bytes;
use crate::bucket::{BucketCounter, BucketList, OFPG_ALL, OFP_BUCKET_COUNTER_LENGTH};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFPGT_ALL: u8 = 0;
pub const OFPGT_SELECT: u8 = 1;
pub const OFPGT_INDIRECT: u8 = 2;
pub const OFPGT_FF: u8 = 3;

const OFP_GROUP_STATS_REQUEST_LENGTH: usize = 8;
const OFP12_GROUP_STATS_LENGTH: usize = 32;
const OFP13_GROUP_STATS_LENGTH: usize = 40;
const OFP_GROUP_DESC_STATS_LENGTH: usize = 8;
const OFP_GROUP_FEATURES_STATS_LENGTH: usize = 40;

fn read_length(what: &'static str, buf: &[u8], min: usize) -> Result<usize> {
    check_length(what, buf, min)?;
    let len = Cursor::new(buf).read_u16::<BigEndian>()? as usize;
    if len < min || len > buf.len() {
        return Err(OfpError::bad_length(what, len, buf.len()));
    }
    Ok(len)
}

fn write_length(what: &'static str, bytes: &mut Vec<u8>, len: usize) -> Result<()> {
    if len > u16::max_value() as usize {
        return Err(OfpError::bad_length(what, len, u16::max_value() as usize));
    }
    bytes.write_u16::<BigEndian>(len as u16)?;
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStatsRequest {
    version: OfpVersion,
    pub group_id: u32,
}

impl GroupStatsRequest {
    pub fn new(version: OfpVersion, group_id: u32) -> GroupStatsRequest {
        GroupStatsRequest { version, group_id }
    }

    pub fn all(version: OfpVersion) -> GroupStatsRequest {
        GroupStatsRequest::new(version, OFPG_ALL)
    }
}

impl Versioned for GroupStatsRequest {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for GroupStatsRequest {
    fn length(&self) -> usize {
        OFP_GROUP_STATS_REQUEST_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_oxm(self.version, "group stats request")?;
        bytes.write_u32::<BigEndian>(self.group_id)?;
        write_padding_bytes(bytes, 4);
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_oxm(self.version, "group stats request")?;
        check_length("group stats request", buf, OFP_GROUP_STATS_REQUEST_LENGTH)?;
        self.group_id = Cursor::new(buf).read_u32::<BigEndian>()?;
        Ok(())
    }
}

/// Counters of one group, followed by the counters of each of its buckets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStats {
    version: OfpVersion,
    pub group_id: u32,
    pub ref_count: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    /// 1.3 only.
    pub duration_sec: u32,
    /// 1.3 only.
    pub duration_nsec: u32,
    pub bucket_stats: Vec<BucketCounter>,
}

impl GroupStats {
    pub fn new(version: OfpVersion, group_id: u32) -> GroupStats {
        GroupStats {
            version,
            group_id,
            ref_count: 0,
            packet_count: 0,
            byte_count: 0,
            duration_sec: 0,
            duration_nsec: 0,
            bucket_stats: vec![],
        }
    }

    /// Seed one counter per bucket from the bookkeeping kept on `buckets`.
    pub fn with_buckets(version: OfpVersion, group_id: u32, buckets: &BucketList) -> GroupStats {
        let mut stats = GroupStats::new(version, group_id);
        stats.bucket_stats = buckets
            .iter()
            .map(|b| BucketCounter::new(b.packet_count, b.byte_count))
            .collect();
        stats
    }

    fn header_length(&self) -> usize {
        if self.version == OfpVersion::Of13 {
            OFP13_GROUP_STATS_LENGTH
        } else {
            OFP12_GROUP_STATS_LENGTH
        }
    }
}

impl Versioned for GroupStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for GroupStats {
    fn length(&self) -> usize {
        if !self.version.is_oxm() {
            return 0;
        }
        self.header_length() + self.bucket_stats.len() * OFP_BUCKET_COUNTER_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_oxm(self.version, "group stats")?;
        write_length("group stats", bytes, self.length())?;
        write_padding_bytes(bytes, 2);
        bytes.write_u32::<BigEndian>(self.group_id)?;
        bytes.write_u32::<BigEndian>(self.ref_count)?;
        write_padding_bytes(bytes, 4);
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        if self.version == OfpVersion::Of13 {
            bytes.write_u32::<BigEndian>(self.duration_sec)?;
            bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        }
        for c in &self.bucket_stats {
            c.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_oxm(self.version, "group stats")?;
        let header = self.header_length();
        let len = read_length("group stats", buf, header)?;
        if (len - header) % OFP_BUCKET_COUNTER_LENGTH != 0 {
            return Err(OfpError::bad_length("group stats", len, header));
        }
        let mut bytes = Cursor::new(buf);
        bytes.set_position(4);
        self.group_id = bytes.read_u32::<BigEndian>()?;
        self.ref_count = bytes.read_u32::<BigEndian>()?;
        bytes.read_u32::<BigEndian>()?;
        self.packet_count = bytes.read_u64::<BigEndian>()?;
        self.byte_count = bytes.read_u64::<BigEndian>()?;
        if self.version == OfpVersion::Of13 {
            self.duration_sec = bytes.read_u32::<BigEndian>()?;
            self.duration_nsec = bytes.read_u32::<BigEndian>()?;
        } else {
            self.duration_sec = 0;
            self.duration_nsec = 0;
        }
        self.bucket_stats.clear();
        for chunk in buf[header..len].chunks(OFP_BUCKET_COUNTER_LENGTH) {
            let mut c = BucketCounter::default();
            c.unpack(chunk)?;
            self.bucket_stats.push(c);
        }
        Ok(())
    }
}

/// A group's type, id and buckets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDescStats {
    version: OfpVersion,
    pub group_type: u8,
    pub group_id: u32,
    pub buckets: BucketList,
}

impl GroupDescStats {
    pub fn new(version: OfpVersion, group_type: u8, group_id: u32) -> GroupDescStats {
        GroupDescStats {
            version,
            group_type,
            group_id,
            buckets: BucketList::new(version),
        }
    }
}

impl Versioned for GroupDescStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.buckets.set_version(version);
    }
}

impl OfpWire for GroupDescStats {
    fn length(&self) -> usize {
        OFP_GROUP_DESC_STATS_LENGTH + self.buckets.length()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_oxm(self.version, "group desc stats")?;
        write_length("group desc stats", bytes, self.length())?;
        bytes.write_u8(self.group_type)?;
        write_padding_bytes(bytes, 1);
        bytes.write_u32::<BigEndian>(self.group_id)?;
        self.buckets.marshal(bytes)
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_oxm(self.version, "group desc stats")?;
        let len = read_length("group desc stats", buf, OFP_GROUP_DESC_STATS_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        bytes.set_position(2);
        self.group_type = bytes.read_u8()?;
        bytes.read_u8()?;
        self.group_id = bytes.read_u32::<BigEndian>()?;
        let raw = &buf[OFP_GROUP_DESC_STATS_LENGTH..len];
        self.buckets.unpack(raw)?;
        if self.buckets.length() != raw.len() {
            return Err(OfpError::bad_length("group desc buckets", raw.len(), self.buckets.length()));
        }
        debug!("group 0x{:x} has {} bucket(s)", self.group_id, self.buckets.len());
        Ok(())
    }
}

/// What the switch's group table supports, indexed by `OFPGT_*`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupFeaturesStats {
    pub types: u32,
    pub capabilities: u32,
    pub max_groups: [u32; 4],
    pub actions: [u32; 4],
}

impl OfpWire for GroupFeaturesStats {
    fn length(&self) -> usize {
        OFP_GROUP_FEATURES_STATS_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(self.types)?;
        bytes.write_u32::<BigEndian>(self.capabilities)?;
        for m in self.max_groups.iter().chain(self.actions.iter()) {
            bytes.write_u32::<BigEndian>(*m)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        check_length("group features", buf, OFP_GROUP_FEATURES_STATS_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.types = bytes.read_u32::<BigEndian>()?;
        self.capabilities = bytes.read_u32::<BigEndian>()?;
        for m in self.max_groups.iter_mut() {
            *m = bytes.read_u32::<BigEndian>()?;
        }
        for a in self.actions.iter_mut() {
            *a = bytes.read_u32::<BigEndian>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_stats_with_bucket_counters() {
        let mut buckets = BucketList::new(OfpVersion::Of13);
        buckets.append_output(1, 1).unwrap().packet_count = 7;
        buckets.append_output(1, 2).unwrap().byte_count = 64;
        let mut stats = GroupStats::with_buckets(OfpVersion::Of13, 5, &buckets);
        stats.ref_count = 2;
        assert_eq!(stats.length(), 40 + 2 * 16);
        let bytes = stats.to_bytes().unwrap();
        assert_eq!(&bytes[..2], &[0, 72]);
        let mut back = GroupStats::new(OfpVersion::Of13, 0);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, stats);
        assert_eq!(back.bucket_stats[0], BucketCounter::new(7, 0));
    }

    #[test]
    fn of12_group_stats_header() {
        let stats = GroupStats::new(OfpVersion::Of12, 1);
        assert_eq!(stats.to_bytes().unwrap().len(), 32);
        assert!(GroupStats::new(OfpVersion::Of10, 1).to_bytes().is_err());
    }

    #[test]
    fn group_stats_ragged_counters() {
        let mut bytes = GroupStats::new(OfpVersion::Of12, 1).to_bytes().unwrap();
        bytes.extend_from_slice(&[0; 8]);
        bytes[1] = 40;
        let mut back = GroupStats::new(OfpVersion::Of12, 0);
        assert!(matches!(back.unpack(&bytes), Err(OfpError::BadLength { .. })));
    }

    #[test]
    fn group_desc() {
        let mut desc = GroupDescStats::new(OfpVersion::Of12, OFPGT_SELECT, 9);
        desc.buckets.append_output(10, 3).unwrap();
        let bytes = desc.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8 + 32);
        assert_eq!(&bytes[..8], &[0, 40, 1, 0, 0, 0, 0, 9]);
        let mut back = GroupDescStats::new(OfpVersion::Of12, 0, 0);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn group_features() {
        let f = GroupFeaturesStats {
            types: 0xf,
            capabilities: 1,
            max_groups: [1, 2, 3, 4],
            actions: [0, 0, 0, 1],
        };
        let bytes = f.to_bytes().unwrap();
        assert_eq!(bytes.len(), 40);
        let mut back = GroupFeaturesStats::default();
        back.unpack(&bytes).unwrap();
        assert_eq!(back, f);
    }
}
