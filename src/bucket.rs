use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::action::ActionBody;
use crate::action_list::ActionList;
use crate::bits::write_padding_bytes;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};
use crate::port::OFPP_ANY;

/// `{len, weight, watch_port, watch_group, pad[4]}`
pub const OFP_BUCKET_HEADER_LENGTH: usize = 16;
pub const OFP_BUCKET_COUNTER_LENGTH: usize = 16;

pub const OFPG_MAX: u32 = 0xffff_ff00;
pub const OFPG_ALL: u32 = 0xffff_fffc;
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// A weighted action array inside a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    version: OfpVersion,
    pub weight: u16,
    pub watch_port: u32,
    pub watch_group: u32,
    pub actions: ActionList,
    /// Statistics bookkeeping, not part of the bucket's wire format.
    pub packet_count: u64,
    /// Statistics bookkeeping, not part of the bucket's wire format.
    pub byte_count: u64,
}

impl Bucket {
    pub fn new(version: OfpVersion, weight: u16, watch_port: u32, watch_group: u32) -> Bucket {
        Bucket {
            version,
            weight,
            watch_port,
            watch_group,
            actions: ActionList::new(version),
            packet_count: 0,
            byte_count: 0,
        }
    }

    fn check_version(version: OfpVersion) -> Result<()> {
        if version.is_oxm() {
            Ok(())
        } else {
            Err(OfpError::bad_version(version, "group bucket"))
        }
    }

    /// Decode the bucket at the front of `buf`.
    pub fn parse(version: OfpVersion, buf: &[u8]) -> Result<Bucket> {
        Bucket::check_version(version)?;
        if buf.len() < OFP_BUCKET_HEADER_LENGTH {
            return Err(OfpError::bad_length("bucket header", buf.len(), OFP_BUCKET_HEADER_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < OFP_BUCKET_HEADER_LENGTH || len > buf.len() {
            return Err(OfpError::bad_length("bucket", len, buf.len()));
        }
        let mut bucket = Bucket::new(version, 0, OFPP_ANY, OFPG_ANY);
        bucket.weight = bytes.read_u16::<BigEndian>()?;
        bucket.watch_port = bytes.read_u32::<BigEndian>()?;
        bucket.watch_group = bytes.read_u32::<BigEndian>()?;
        let raw = &buf[OFP_BUCKET_HEADER_LENGTH..len];
        bucket.actions.unpack(raw)?;
        if bucket.actions.length() != raw.len() {
            return Err(OfpError::bad_length("bucket actions", raw.len(), bucket.actions.length()));
        }
        Ok(bucket)
    }
}

impl Versioned for Bucket {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.actions.set_version(version);
    }
}

impl OfpWire for Bucket {
    fn length(&self) -> usize {
        OFP_BUCKET_HEADER_LENGTH + self.actions.length()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        Bucket::check_version(self.version)?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("bucket", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(len as u16)?;
        bytes.write_u16::<BigEndian>(self.weight)?;
        bytes.write_u32::<BigEndian>(self.watch_port)?;
        bytes.write_u32::<BigEndian>(self.watch_group)?;
        write_padding_bytes(bytes, 4);
        self.actions.marshal(bytes)
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        *self = Bucket::parse(self.version, buf)?;
        Ok(())
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "bucket(weight={}, watch_port=0x{:x}, watch_group=0x{:x}, actions={})",
            self.weight, self.watch_port, self.watch_group, self.actions
        )
    }
}

/// Buckets of a group, in wire order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketList {
    version: OfpVersion,
    buckets: Vec<Bucket>,
}

impl BucketList {
    pub fn new(version: OfpVersion) -> BucketList {
        BucketList {
            version,
            buckets: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<Bucket> {
        self.buckets.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<Bucket> {
        self.buckets.iter_mut()
    }

    /// Append an empty bucket and return it for filling in its actions.
    pub fn append(&mut self, weight: u16, watch_port: u32, watch_group: u32) -> Result<&mut Bucket> {
        Bucket::check_version(self.version)?;
        self.buckets
            .push(Bucket::new(self.version, weight, watch_port, watch_group));
        let last = self.buckets.len() - 1;
        Ok(&mut self.buckets[last])
    }

    pub fn append_bucket(&mut self, mut bucket: Bucket) -> Result<&mut Bucket> {
        Bucket::check_version(self.version)?;
        bucket.set_version(self.version);
        self.buckets.push(bucket);
        let last = self.buckets.len() - 1;
        Ok(&mut self.buckets[last])
    }

    pub fn get(&self, index: usize) -> Result<&Bucket> {
        let len = self.buckets.len();
        self.buckets
            .get(index)
            .ok_or(OfpError::OutOfRange { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Bucket> {
        let len = self.buckets.len();
        self.buckets
            .get_mut(index)
            .ok_or(OfpError::OutOfRange { index, len })
    }

    pub fn remove(&mut self, index: usize) -> Result<Bucket> {
        if index >= self.buckets.len() {
            return Err(OfpError::OutOfRange {
                index,
                len: self.buckets.len(),
            });
        }
        Ok(self.buckets.remove(index))
    }

    /// Convenience for the common single-output bucket.
    pub fn append_output(&mut self, weight: u16, port: u32) -> Result<&mut Bucket> {
        let bucket = self.append(weight, OFPP_ANY, OFPG_ANY)?;
        bucket
            .actions
            .append(ActionBody::Output { port, max_len: 0 })?;
        Ok(bucket)
    }
}

impl Versioned for BucketList {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for b in &mut self.buckets {
            b.set_version(version);
        }
    }
}

impl OfpWire for BucketList {
    fn length(&self) -> usize {
        self.buckets.iter().map(|b| b.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for b in &self.buckets {
            b.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.buckets.clear();
        if buf.len() < OFP_BUCKET_HEADER_LENGTH {
            return Ok(());
        }
        let mut offset = 0;
        while offset < buf.len() {
            let bucket = Bucket::parse(self.version, &buf[offset..])?;
            offset += bucket.length();
            self.buckets.push(bucket);
        }
        debug!("unpacked {} bucket(s) from {} byte(s)", self.buckets.len(), buf.len());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a BucketList {
    type Item = &'a Bucket;
    type IntoIter = std::slice::Iter<'a, Bucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.iter()
    }
}

/// Per bucket counters as reported in group stats.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketCounter {
    pub packet_count: u64,
    pub byte_count: u64,
}

impl BucketCounter {
    pub fn new(packet_count: u64, byte_count: u64) -> BucketCounter {
        BucketCounter {
            packet_count,
            byte_count,
        }
    }
}

impl OfpWire for BucketCounter {
    fn length(&self) -> usize {
        OFP_BUCKET_COUNTER_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() < OFP_BUCKET_COUNTER_LENGTH {
            return Err(OfpError::bad_length("bucket counter", buf.len(), OFP_BUCKET_COUNTER_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        self.packet_count = bytes.read_u64::<BigEndian>()?;
        self.byte_count = bytes.read_u64::<BigEndian>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_weighted_buckets() {
        let mut list = BucketList::new(OfpVersion::Of13);
        list.append_output(0x0800, 1).unwrap();
        list.append_output(0x0800, 2).unwrap();
        assert_eq!(list.length(), 2 * (16 + 16));

        let bytes = list.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0, 32, 0x08, 0x00]);
        let mut back = BucketList::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        for (i, b) in back.iter().enumerate() {
            assert_eq!(b.weight, 0x0800);
            assert_eq!(b.actions.output_ports(), vec![i as u32 + 1]);
        }
        assert_eq!(back, list);
    }

    #[test]
    fn no_buckets_in_of10() {
        let mut list = BucketList::new(OfpVersion::Of10);
        assert!(matches!(
            list.append(1, OFPP_ANY, OFPG_ANY),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(list.is_empty());
    }

    #[test]
    fn bad_bucket_lengths() {
        let mut list = BucketList::new(OfpVersion::Of12);
        let mut header = vec![0, 8, 0, 1];
        header.extend_from_slice(&[0; 12]);
        assert!(matches!(list.unpack(&header), Err(OfpError::BadLength { .. })));
        header[1] = 24;
        assert!(matches!(list.unpack(&header), Err(OfpError::BadLength { .. })));
        header[1] = 16;
        list.unpack(&header).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.get(0).unwrap().actions.is_empty());
        assert!(matches!(list.get(1), Err(OfpError::OutOfRange { index: 1, len: 1 })));
    }

    #[test]
    fn counter() {
        let c = BucketCounter::new(5, 640);
        let bytes = c.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);
        let mut back = BucketCounter::default();
        back.unpack(&bytes).unwrap();
        assert_eq!(back, c);
    }
}
