use std::io::Cursor;

use super::check_length;
use crate::bits::{read_fixed_size_string, write_fixed_size_string};
use crate::ofp_error::Result;
use crate::ofp_wire::OfpWire;

pub const DESC_STR_LEN: usize = 256;
pub const SERIAL_NUM_LEN: usize = 32;

const OFP_DESC_STATS_LENGTH: usize = 3 * DESC_STR_LEN + SERIAL_NUM_LEN + DESC_STR_LEN;

/// Switch description strings. Identical in all versions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescStats {
    pub manufacturer_desc: String,
    pub hardware_desc: String,
    pub software_desc: String,
    pub serial_number: String,
    pub datapath_desc: String,
}

impl OfpWire for DescStats {
    fn length(&self) -> usize {
        OFP_DESC_STATS_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        write_fixed_size_string(bytes, &self.manufacturer_desc, DESC_STR_LEN)?;
        write_fixed_size_string(bytes, &self.hardware_desc, DESC_STR_LEN)?;
        write_fixed_size_string(bytes, &self.software_desc, DESC_STR_LEN)?;
        write_fixed_size_string(bytes, &self.serial_number, SERIAL_NUM_LEN)?;
        write_fixed_size_string(bytes, &self.datapath_desc, DESC_STR_LEN)?;
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        check_length("desc stats", buf, OFP_DESC_STATS_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.manufacturer_desc = read_fixed_size_string(&mut bytes, DESC_STR_LEN)?;
        self.hardware_desc = read_fixed_size_string(&mut bytes, DESC_STR_LEN)?;
        self.software_desc = read_fixed_size_string(&mut bytes, DESC_STR_LEN)?;
        self.serial_number = read_fixed_size_string(&mut bytes, SERIAL_NUM_LEN)?;
        self.datapath_desc = read_fixed_size_string(&mut bytes, DESC_STR_LEN)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desc_layout() {
        let desc = DescStats {
            manufacturer_desc: "rofl".to_string(),
            hardware_desc: "soft switch".to_string(),
            software_desc: "0.3".to_string(),
            serial_number: "None".to_string(),
            datapath_desc: "dp0".to_string(),
        };
        let bytes = desc.to_bytes().unwrap();
        assert_eq!(bytes.len(), 1056);
        assert_eq!(&bytes[768..772], b"None");
        let mut back = DescStats::default();
        back.unpack(&bytes).unwrap();
        assert_eq!(back, desc);
        assert!(back.unpack(&bytes[..1000]).is_err());
    }
}
