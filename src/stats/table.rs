use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::check_length;
use crate::bits::{read_fixed_size_string, write_fixed_size_string, write_padding_bytes};
use crate::ofp_error::Result;
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFP_MAX_TABLE_NAME_LEN: usize = 32;

const OFP10_TABLE_STATS_LENGTH: usize = 64;
const OFP12_TABLE_STATS_LENGTH: usize = 128;
const OFP13_TABLE_STATS_LENGTH: usize = 24;

/// Per table counters. 1.0 and 1.2 also describe the table's capabilities;
/// 1.3 moved those to table features and only keeps the counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    version: OfpVersion,
    pub table_id: u8,
    /// 1.0 and 1.2.
    pub name: String,
    /// 1.2 only.
    pub match_fields: u64,
    /// 32 bit `OFPFW_*` flags in 1.0, an OXM bitmap in 1.2.
    pub wildcards: u64,
    /// 1.2 only.
    pub write_actions: u32,
    /// 1.2 only.
    pub apply_actions: u32,
    /// 1.2 only.
    pub write_setfields: u64,
    /// 1.2 only.
    pub apply_setfields: u64,
    /// 1.2 only.
    pub metadata_match: u64,
    /// 1.2 only.
    pub metadata_write: u64,
    /// 1.2 only.
    pub instructions: u32,
    /// 1.2 only.
    pub config: u32,
    /// 1.0 and 1.2.
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl TableStats {
    pub fn new(version: OfpVersion, table_id: u8) -> TableStats {
        TableStats {
            version,
            table_id,
            name: String::new(),
            match_fields: 0,
            wildcards: 0,
            write_actions: 0,
            apply_actions: 0,
            write_setfields: 0,
            apply_setfields: 0,
            metadata_match: 0,
            metadata_write: 0,
            instructions: 0,
            config: 0,
            max_entries: 0,
            active_count: 0,
            lookup_count: 0,
            matched_count: 0,
        }
    }

    fn marshal_of12_capabilities(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.match_fields)?;
        bytes.write_u64::<BigEndian>(self.wildcards)?;
        bytes.write_u32::<BigEndian>(self.write_actions)?;
        bytes.write_u32::<BigEndian>(self.apply_actions)?;
        bytes.write_u64::<BigEndian>(self.write_setfields)?;
        bytes.write_u64::<BigEndian>(self.apply_setfields)?;
        bytes.write_u64::<BigEndian>(self.metadata_match)?;
        bytes.write_u64::<BigEndian>(self.metadata_write)?;
        bytes.write_u32::<BigEndian>(self.instructions)?;
        bytes.write_u32::<BigEndian>(self.config)?;
        Ok(())
    }

    fn unpack_of12_capabilities(&mut self, bytes: &mut Cursor<&[u8]>) -> Result<()> {
        self.match_fields = bytes.read_u64::<BigEndian>()?;
        self.wildcards = bytes.read_u64::<BigEndian>()?;
        self.write_actions = bytes.read_u32::<BigEndian>()?;
        self.apply_actions = bytes.read_u32::<BigEndian>()?;
        self.write_setfields = bytes.read_u64::<BigEndian>()?;
        self.apply_setfields = bytes.read_u64::<BigEndian>()?;
        self.metadata_match = bytes.read_u64::<BigEndian>()?;
        self.metadata_write = bytes.read_u64::<BigEndian>()?;
        self.instructions = bytes.read_u32::<BigEndian>()?;
        self.config = bytes.read_u32::<BigEndian>()?;
        Ok(())
    }
}

impl Versioned for TableStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for TableStats {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 => OFP10_TABLE_STATS_LENGTH,
            OfpVersion::Of12 => OFP12_TABLE_STATS_LENGTH,
            OfpVersion::Of13 => OFP13_TABLE_STATS_LENGTH,
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("table stats")?;
        bytes.write_u8(self.table_id)?;
        match v {
            OfpVersion::Of10 => {
                write_padding_bytes(bytes, 3);
                write_fixed_size_string(bytes, &self.name, OFP_MAX_TABLE_NAME_LEN)?;
                bytes.write_u32::<BigEndian>(self.wildcards as u32)?;
                bytes.write_u32::<BigEndian>(self.max_entries)?;
            }
            OfpVersion::Of12 => {
                write_padding_bytes(bytes, 7);
                write_fixed_size_string(bytes, &self.name, OFP_MAX_TABLE_NAME_LEN)?;
                self.marshal_of12_capabilities(bytes)?;
                bytes.write_u32::<BigEndian>(self.max_entries)?;
            }
            _ => write_padding_bytes(bytes, 3),
        }
        bytes.write_u32::<BigEndian>(self.active_count)?;
        bytes.write_u64::<BigEndian>(self.lookup_count)?;
        bytes.write_u64::<BigEndian>(self.matched_count)?;
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("table stats")?;
        check_length("table stats", buf, self.length())?;
        *self = TableStats::new(v, buf[0]);
        let mut bytes = Cursor::new(buf);
        match v {
            OfpVersion::Of10 => {
                bytes.set_position(4);
                self.name = read_fixed_size_string(&mut bytes, OFP_MAX_TABLE_NAME_LEN)?;
                self.wildcards = bytes.read_u32::<BigEndian>()? as u64;
                self.max_entries = bytes.read_u32::<BigEndian>()?;
            }
            OfpVersion::Of12 => {
                bytes.set_position(8);
                self.name = read_fixed_size_string(&mut bytes, OFP_MAX_TABLE_NAME_LEN)?;
                self.unpack_of12_capabilities(&mut bytes)?;
                self.max_entries = bytes.read_u32::<BigEndian>()?;
            }
            _ => bytes.set_position(4),
        }
        self.active_count = bytes.read_u32::<BigEndian>()?;
        self.lookup_count = bytes.read_u64::<BigEndian>()?;
        self.matched_count = bytes.read_u64::<BigEndian>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(version: OfpVersion) -> TableStats {
        let mut t = TableStats::new(version, 1);
        t.active_count = 4;
        t.lookup_count = 100;
        t.matched_count = 90;
        if version != OfpVersion::Of13 {
            t.name = "classifier".to_string();
            t.max_entries = 1024;
            t.wildcards = 0x3f_ffff;
        }
        if version == OfpVersion::Of12 {
            t.match_fields = 0xff;
            t.instructions = 0x3e;
            t.config = 3;
        }
        t
    }

    #[test]
    fn sizes_and_round_trip() {
        for &(v, len) in &[
            (OfpVersion::Of10, 64),
            (OfpVersion::Of12, 128),
            (OfpVersion::Of13, 24),
        ] {
            let t = sample(v);
            let bytes = t.to_bytes().unwrap();
            assert_eq!(bytes.len(), len);
            let mut back = TableStats::new(v, 0);
            back.unpack(&bytes).unwrap();
            assert_eq!(back, t);
        }
    }

    #[test]
    fn of10_name_offset() {
        let bytes = sample(OfpVersion::Of10).to_bytes().unwrap();
        assert_eq!(&bytes[4..14], b"classifier");
        assert_eq!(bytes[14], 0);
    }
}
