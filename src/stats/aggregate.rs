use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::check_length;
use super::flow::FlowStatsRequest;
use crate::bits::write_padding_bytes;
use crate::ofp_error::Result;
use crate::ofp_wire::OfpWire;

const OFP_AGGREGATE_STATS_LENGTH: usize = 24;

/// Aggregate requests share the flow stats request layout.
pub type AggregateStatsRequest = FlowStatsRequest;

/// Totals over every flow matched by an aggregate request. The layout is
/// the same in all versions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

impl OfpWire for AggregateStats {
    fn length(&self) -> usize {
        OFP_AGGREGATE_STATS_LENGTH
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        bytes.write_u32::<BigEndian>(self.flow_count)?;
        write_padding_bytes(bytes, 4);
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        check_length("aggregate stats", buf, OFP_AGGREGATE_STATS_LENGTH)?;
        let mut bytes = Cursor::new(buf);
        self.packet_count = bytes.read_u64::<BigEndian>()?;
        self.byte_count = bytes.read_u64::<BigEndian>()?;
        self.flow_count = bytes.read_u32::<BigEndian>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_layout() {
        let stats = AggregateStats {
            packet_count: 1,
            byte_count: 2,
            flow_count: 3,
        };
        let bytes = stats.to_bytes().unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[16..20], &[0, 0, 0, 3]);
        let mut back = AggregateStats::default();
        back.unpack(&bytes).unwrap();
        assert_eq!(back, stats);
        assert!(back.unpack(&bytes[..20]).is_err());
    }
}
