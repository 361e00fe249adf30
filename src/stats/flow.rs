use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::check_length;
use crate::action_list::ActionList;
use crate::bucket::OFPG_ANY;
use crate::bits::write_padding_bytes;
use crate::instruction::InstructionList;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_match::{Match, OFP10_MATCH_LENGTH};
use crate::ofp_wire::{OfpWire, Versioned};
use crate::port::{port_from_of10, port_to_of10, OFPP_ANY};

const OFP10_FLOW_STATS_REQUEST_LENGTH: usize = OFP10_MATCH_LENGTH + 4;
const OFP12_FLOW_STATS_REQUEST_HEADER_LENGTH: usize = 32;
const OFP10_FLOW_STATS_HEADER_LENGTH: usize = 48 + OFP10_MATCH_LENGTH;
const OFP12_FLOW_STATS_HEADER_LENGTH: usize = 48;

pub const OFPTT_ALL: u8 = 0xff;

/// Body of a flow (and aggregate) stats request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStatsRequest {
    version: OfpVersion,
    pub table_id: u8,
    pub out_port: u32,
    /// 1.2 and later.
    pub out_group: u32,
    /// 1.2 and later.
    pub cookie: u64,
    /// 1.2 and later.
    pub cookie_mask: u64,
    pub pattern: Match,
}

impl FlowStatsRequest {
    /// A request for all flows of all tables.
    pub fn new(version: OfpVersion) -> FlowStatsRequest {
        FlowStatsRequest {
            version,
            table_id: OFPTT_ALL,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            cookie: 0,
            cookie_mask: 0,
            pattern: Match::new(version),
        }
    }
}

impl Versioned for FlowStatsRequest {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.pattern.set_version(version);
    }
}

impl OfpWire for FlowStatsRequest {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 => OFP10_FLOW_STATS_REQUEST_LENGTH,
            OfpVersion::Of12 | OfpVersion::Of13 => {
                OFP12_FLOW_STATS_REQUEST_HEADER_LENGTH + self.pattern.length()
            }
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        match self.version.check_known("flow stats request")? {
            OfpVersion::Of10 => {
                self.pattern.marshal(bytes)?;
                bytes.write_u8(self.table_id)?;
                write_padding_bytes(bytes, 1);
                bytes.write_u16::<BigEndian>(port_to_of10(self.out_port))?;
            }
            _ => {
                bytes.write_u8(self.table_id)?;
                write_padding_bytes(bytes, 3);
                bytes.write_u32::<BigEndian>(self.out_port)?;
                bytes.write_u32::<BigEndian>(self.out_group)?;
                write_padding_bytes(bytes, 4);
                bytes.write_u64::<BigEndian>(self.cookie)?;
                bytes.write_u64::<BigEndian>(self.cookie_mask)?;
                self.pattern.marshal(bytes)?;
            }
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        match self.version.check_known("flow stats request")? {
            OfpVersion::Of10 => {
                check_length("flow stats request", buf, OFP10_FLOW_STATS_REQUEST_LENGTH)?;
                self.pattern.unpack(&buf[..OFP10_MATCH_LENGTH])?;
                let mut bytes = Cursor::new(&buf[OFP10_MATCH_LENGTH..]);
                self.table_id = bytes.read_u8()?;
                bytes.read_u8()?;
                self.out_port = port_from_of10(bytes.read_u16::<BigEndian>()?);
                self.out_group = OFPG_ANY;
                self.cookie = 0;
                self.cookie_mask = 0;
            }
            _ => {
                check_length("flow stats request", buf, OFP12_FLOW_STATS_REQUEST_HEADER_LENGTH)?;
                let mut bytes = Cursor::new(buf);
                self.table_id = bytes.read_u8()?;
                bytes.set_position(4);
                self.out_port = bytes.read_u32::<BigEndian>()?;
                self.out_group = bytes.read_u32::<BigEndian>()?;
                bytes.read_u32::<BigEndian>()?;
                self.cookie = bytes.read_u64::<BigEndian>()?;
                self.cookie_mask = bytes.read_u64::<BigEndian>()?;
                self.pattern
                    .unpack(&buf[OFP12_FLOW_STATS_REQUEST_HEADER_LENGTH..])?;
            }
        }
        Ok(())
    }
}

/// One flow entry of a flow stats reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStats {
    version: OfpVersion,
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    /// 1.3 only.
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
    /// 1.0 only.
    pub actions: ActionList,
    /// 1.2 and later.
    pub instructions: InstructionList,
}

impl FlowStats {
    pub fn new(version: OfpVersion) -> FlowStats {
        FlowStats {
            version,
            table_id: 0,
            duration_sec: 0,
            duration_nsec: 0,
            priority: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            cookie: 0,
            packet_count: 0,
            byte_count: 0,
            pattern: Match::new(version),
            actions: ActionList::new(version),
            instructions: InstructionList::new(version),
        }
    }

    fn marshal_counters(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        Ok(())
    }

    fn unpack_counters(&mut self, bytes: &mut Cursor<&[u8]>) -> Result<()> {
        self.cookie = bytes.read_u64::<BigEndian>()?;
        self.packet_count = bytes.read_u64::<BigEndian>()?;
        self.byte_count = bytes.read_u64::<BigEndian>()?;
        Ok(())
    }
}

impl Versioned for FlowStats {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.pattern.set_version(version);
        self.actions.set_version(version);
        self.instructions.set_version(version);
    }
}

impl OfpWire for FlowStats {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 => OFP10_FLOW_STATS_HEADER_LENGTH + self.actions.length(),
            OfpVersion::Of12 | OfpVersion::Of13 => {
                OFP12_FLOW_STATS_HEADER_LENGTH
                    + self.pattern.length()
                    + self.instructions.length()
            }
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let v = self.version.check_known("flow stats")?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("flow stats", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(len as u16)?;
        bytes.write_u8(self.table_id)?;
        write_padding_bytes(bytes, 1);
        if v == OfpVersion::Of10 {
            self.pattern.marshal(bytes)?;
        }
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout)?;
        bytes.write_u16::<BigEndian>(self.hard_timeout)?;
        if v == OfpVersion::Of13 {
            bytes.write_u16::<BigEndian>(self.flags)?;
            write_padding_bytes(bytes, 4);
        } else {
            write_padding_bytes(bytes, 6);
        }
        self.marshal_counters(bytes)?;
        if v == OfpVersion::Of10 {
            self.actions.marshal(bytes)
        } else {
            self.pattern.marshal(bytes)?;
            self.instructions.marshal(bytes)
        }
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let v = self.version.check_known("flow stats")?;
        let header = if v == OfpVersion::Of10 {
            OFP10_FLOW_STATS_HEADER_LENGTH
        } else {
            OFP12_FLOW_STATS_HEADER_LENGTH
        };
        check_length("flow stats", buf, header)?;
        let mut bytes = Cursor::new(buf);
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < header || len > buf.len() {
            return Err(OfpError::bad_length("flow stats", len, buf.len()));
        }
        self.table_id = bytes.read_u8()?;
        bytes.read_u8()?;
        if v == OfpVersion::Of10 {
            self.pattern.unpack(&buf[4..4 + OFP10_MATCH_LENGTH])?;
            bytes.set_position((4 + OFP10_MATCH_LENGTH) as u64);
        }
        self.duration_sec = bytes.read_u32::<BigEndian>()?;
        self.duration_nsec = bytes.read_u32::<BigEndian>()?;
        self.priority = bytes.read_u16::<BigEndian>()?;
        self.idle_timeout = bytes.read_u16::<BigEndian>()?;
        self.hard_timeout = bytes.read_u16::<BigEndian>()?;
        self.flags = if v == OfpVersion::Of13 {
            bytes.read_u16::<BigEndian>()?
        } else {
            0
        };
        bytes.set_position((header - 24) as u64);
        self.unpack_counters(&mut bytes)?;

        if v == OfpVersion::Of10 {
            let raw = &buf[header..len];
            self.actions.unpack(raw)?;
            if self.actions.length() != raw.len() {
                return Err(OfpError::bad_length("flow stats actions", raw.len(), self.actions.length()));
            }
            self.instructions.clear();
        } else {
            self.pattern.unpack(&buf[header..len])?;
            let offset = header + self.pattern.length();
            if offset > len {
                return Err(OfpError::bad_length("flow stats match", len - header, self.pattern.length()));
            }
            let raw = &buf[offset..len];
            self.instructions.unpack(raw)?;
            if self.instructions.length() != raw.len() {
                return Err(OfpError::bad_length(
                    "flow stats instructions",
                    raw.len(),
                    self.instructions.length(),
                ));
            }
            self.actions.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionBody;
    use crate::instruction::InstructionType;

    #[test]
    fn of10_request_layout() {
        let mut req = FlowStatsRequest::new(OfpVersion::Of10);
        req.pattern.set_in_port(1).unwrap();
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[40..44], &[0xff, 0, 0xff, 0xff]);
        let mut back = FlowStatsRequest::new(OfpVersion::Of10);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn of13_request_layout() {
        let mut req = FlowStatsRequest::new(OfpVersion::Of13);
        req.table_id = 1;
        req.cookie = 0x10;
        req.cookie_mask = 0xff;
        req.pattern.set_eth_type(0x0806).unwrap();
        // 32 + pad8(4 + 6)
        assert_eq!(req.length(), 48);
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.len(), 48);
        let mut back = FlowStatsRequest::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn of10_flow_stats() {
        let mut fs = FlowStats::new(OfpVersion::Of10);
        fs.priority = 100;
        fs.packet_count = 3;
        fs.pattern.set_eth_type(0x0800).unwrap();
        fs.actions
            .append(ActionBody::Output { port: 2, max_len: 0 })
            .unwrap();
        assert_eq!(fs.length(), 96);
        let bytes = fs.to_bytes().unwrap();
        assert_eq!(&bytes[..2], &[0, 96]);
        let mut back = FlowStats::new(OfpVersion::Of10);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, fs);
    }

    #[test]
    fn of13_flow_stats() {
        let mut fs = FlowStats::new(OfpVersion::Of13);
        fs.table_id = 2;
        fs.flags = 1;
        fs.byte_count = 1500;
        fs.pattern.set_in_port(4).unwrap();
        fs.instructions
            .actions_mut(InstructionType::ApplyActions)
            .unwrap()
            .append(ActionBody::Output { port: 5, max_len: 0 })
            .unwrap();
        // 48 + 16 (match) + 24 (apply actions)
        assert_eq!(fs.length(), 88);
        let bytes = fs.to_bytes().unwrap();
        assert_eq!(bytes.len(), 88);
        let mut back = FlowStats::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, fs);

        let mut short = bytes.clone();
        short[1] = 40;
        assert!(matches!(back.unpack(&short), Err(OfpError::BadLength { .. })));
    }
}
