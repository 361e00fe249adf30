use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::action_list::ActionList;
use crate::bits::write_padding_bytes;
use crate::bucket::OFPG_ANY;
use crate::instruction::InstructionList;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_match::{Match, OFP10_MATCH_LENGTH};
use crate::ofp_wire::{OfpWire, Versioned};
use crate::port::{port_from_of10, port_to_of10, PseudoPort, OFPP_ANY};

/// `ofp_flow_mod` minus header and match in 1.0.
const OFP10_FLOW_MOD_LENGTH: usize = 24;
/// `ofp_flow_mod` minus header and match in 1.2 and 1.3.
const OFP12_FLOW_MOD_LENGTH: usize = 40;

const OFP_NO_BUFFER: u32 = 0xffff_ffff;

const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;
const OFPFF_CHECK_OVERLAP: u16 = 1 << 1;
const OFPFF_RESET_COUNTS: u16 = 1 << 2;

/// Type of modification to perform on a flow table.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCmd {
    AddFlow = 0,
    ModFlow = 1,
    ModStrictFlow = 2,
    DeleteFlow = 3,
    DeleteStrictFlow = 4,
}

impl FlowModCmd {
    fn of_int(cmd: u16) -> Result<FlowModCmd> {
        match cmd {
            0 => Ok(FlowModCmd::AddFlow),
            1 => Ok(FlowModCmd::ModFlow),
            2 => Ok(FlowModCmd::ModStrictFlow),
            3 => Ok(FlowModCmd::DeleteFlow),
            4 => Ok(FlowModCmd::DeleteStrictFlow),
            c => Err(OfpError::NotFound(format!("flow mod command {}", c))),
        }
    }
}

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(self) -> u16 {
        match self {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// Represents modifications to a flow table from the controller.
///
/// 1.0 flow mods carry `actions`; 1.2 and later carry `instructions` and
/// address a specific table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    version: OfpVersion,
    pub command: FlowModCmd,
    pub pattern: Match,
    pub priority: u16,
    pub cookie: u64,
    /// 1.2 and later.
    pub cookie_mask: u64,
    /// 1.2 and later.
    pub table_id: u8,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub notify_when_removed: bool,
    pub check_overlap: bool,
    /// 1.3 only.
    pub reset_counts: bool,
    pub apply_to_packet: Option<u32>,
    pub out_port: Option<PseudoPort>,
    /// 1.2 and later.
    pub out_group: u32,
    pub actions: ActionList,
    pub instructions: InstructionList,
}

impl FlowMod {
    pub fn new(version: OfpVersion, command: FlowModCmd) -> FlowMod {
        FlowMod {
            version,
            command,
            pattern: Match::new(version),
            priority: 0x8000,
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            notify_when_removed: false,
            check_overlap: false,
            reset_counts: false,
            apply_to_packet: None,
            out_port: None,
            out_group: OFPG_ANY,
            actions: ActionList::new(version),
            instructions: InstructionList::new(version),
        }
    }

    fn flags_to_int(&self) -> u16 {
        let mut flags = 0;
        if self.notify_when_removed {
            flags |= OFPFF_SEND_FLOW_REM;
        }
        if self.check_overlap {
            flags |= OFPFF_CHECK_OVERLAP;
        }
        if self.reset_counts && self.version == OfpVersion::Of13 {
            flags |= OFPFF_RESET_COUNTS;
        }
        flags
    }

    fn set_flags(&mut self, flags: u16) {
        self.notify_when_removed = flags & OFPFF_SEND_FLOW_REM != 0;
        self.check_overlap = flags & OFPFF_CHECK_OVERLAP != 0;
        self.reset_counts = self.version == OfpVersion::Of13 && flags & OFPFF_RESET_COUNTS != 0;
    }

    fn buffer_id(&self) -> u32 {
        self.apply_to_packet.unwrap_or(OFP_NO_BUFFER)
    }

    fn set_buffer_id(&mut self, buffer_id: u32) {
        self.apply_to_packet = match buffer_id {
            OFP_NO_BUFFER => None,
            n => Some(n),
        };
    }

    fn out_port_int(&self) -> u32 {
        self.out_port.map(PseudoPort::port).unwrap_or(OFPP_ANY)
    }

    fn set_out_port_int(&mut self, port: u32) {
        self.out_port = match port {
            OFPP_ANY => None,
            p => Some(PseudoPort::of_port(p)),
        };
    }

    /// Outputs to `OFPP_TABLE` only make sense for packet outs.
    fn check_no_table_output(actions: &ActionList) -> Result<()> {
        if actions
            .output_ports()
            .iter()
            .any(|p| PseudoPort::of_port(*p) == PseudoPort::Table)
        {
            return Err(OfpError::BadPrerequisite {
                field: "output".to_string(),
                requires: "a port other than OFPP_TABLE in an installed flow".to_string(),
            });
        }
        Ok(())
    }

    fn marshal_of10(&self, bytes: &mut Vec<u8>) -> Result<()> {
        FlowMod::check_no_table_output(&self.actions)?;
        self.pattern.marshal(bytes)?;
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u16::<BigEndian>(self.command as u16)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout.to_int())?;
        bytes.write_u16::<BigEndian>(self.hard_timeout.to_int())?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u32::<BigEndian>(self.buffer_id())?;
        bytes.write_u16::<BigEndian>(port_to_of10(self.out_port_int()))?;
        bytes.write_u16::<BigEndian>(self.flags_to_int())?;
        self.actions.marshal(bytes)
    }

    fn marshal_of12(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for i in self.instructions.iter() {
            if let Some(actions) = i.actions() {
                FlowMod::check_no_table_output(actions)?;
            }
        }
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(self.cookie_mask)?;
        bytes.write_u8(self.table_id)?;
        bytes.write_u8(self.command as u8)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout.to_int())?;
        bytes.write_u16::<BigEndian>(self.hard_timeout.to_int())?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u32::<BigEndian>(self.buffer_id())?;
        bytes.write_u32::<BigEndian>(self.out_port_int())?;
        bytes.write_u32::<BigEndian>(self.out_group)?;
        bytes.write_u16::<BigEndian>(self.flags_to_int())?;
        write_padding_bytes(bytes, 2);
        self.pattern.marshal(bytes)?;
        self.instructions.marshal(bytes)
    }

    fn unpack_of10(&mut self, buf: &[u8]) -> Result<()> {
        let header = OFP10_MATCH_LENGTH + OFP10_FLOW_MOD_LENGTH;
        if buf.len() < header {
            return Err(OfpError::bad_length("ofp10_flow_mod", buf.len(), header));
        }
        self.pattern.unpack(&buf[..OFP10_MATCH_LENGTH])?;
        let mut bytes = Cursor::new(&buf[OFP10_MATCH_LENGTH..]);
        self.cookie = bytes.read_u64::<BigEndian>()?;
        self.command = FlowModCmd::of_int(bytes.read_u16::<BigEndian>()?)?;
        self.idle_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        self.hard_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        self.priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        self.set_buffer_id(buffer_id);
        let out_port = port_from_of10(bytes.read_u16::<BigEndian>()?);
        self.set_out_port_int(out_port);
        let flags = bytes.read_u16::<BigEndian>()?;
        self.set_flags(flags);
        let raw = &buf[header..];
        self.actions.unpack(raw)?;
        if self.actions.length() != raw.len() {
            return Err(OfpError::bad_length("flow mod actions", raw.len(), self.actions.length()));
        }
        self.instructions.clear();
        Ok(())
    }

    fn unpack_of12(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() < OFP12_FLOW_MOD_LENGTH {
            return Err(OfpError::bad_length("ofp_flow_mod", buf.len(), OFP12_FLOW_MOD_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        self.cookie = bytes.read_u64::<BigEndian>()?;
        self.cookie_mask = bytes.read_u64::<BigEndian>()?;
        self.table_id = bytes.read_u8()?;
        self.command = FlowModCmd::of_int(bytes.read_u8()? as u16)?;
        self.idle_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        self.hard_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        self.priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        self.set_buffer_id(buffer_id);
        let out_port = bytes.read_u32::<BigEndian>()?;
        self.set_out_port_int(out_port);
        self.out_group = bytes.read_u32::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        self.set_flags(flags);

        self.pattern.unpack(&buf[OFP12_FLOW_MOD_LENGTH..])?;
        let offset = OFP12_FLOW_MOD_LENGTH + self.pattern.length();
        if offset > buf.len() {
            return Err(OfpError::bad_length(
                "flow mod match",
                buf.len() - OFP12_FLOW_MOD_LENGTH,
                self.pattern.length(),
            ));
        }
        let raw = &buf[offset..];
        self.instructions.unpack(raw)?;
        if self.instructions.length() != raw.len() {
            return Err(OfpError::bad_length(
                "flow mod instructions",
                raw.len(),
                self.instructions.length(),
            ));
        }
        self.actions.clear();
        Ok(())
    }
}

impl Versioned for FlowMod {
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

impl OfpWire for FlowMod {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 => {
                OFP10_MATCH_LENGTH + OFP10_FLOW_MOD_LENGTH + self.actions.length()
            }
            OfpVersion::Of12 | OfpVersion::Of13 => {
                OFP12_FLOW_MOD_LENGTH + self.pattern.length() + self.instructions.length()
            }
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        match self.version.check_known("flow mod")? {
            OfpVersion::Of10 => self.marshal_of10(bytes),
            _ => self.marshal_of12(bytes),
        }
    }

    /// `buf` is the message body; actions or instructions run to its end.
    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        match self.version.check_known("flow mod")? {
            OfpVersion::Of10 => self.unpack_of10(buf),
            _ => self.unpack_of12(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionBody;
    use crate::instruction::InstructionType;
    use crate::port::{OFPP_CONTROLLER, OFPP_TABLE};

    #[test]
    fn of10_flow_mod() {
        let mut fm = FlowMod::new(OfpVersion::Of10, FlowModCmd::AddFlow);
        fm.pattern.set_in_port(1).unwrap();
        fm.idle_timeout = Timeout::ExpiresAfter(10);
        fm.notify_when_removed = true;
        fm.actions
            .append(ActionBody::Output { port: 2, max_len: 0 })
            .unwrap();
        assert_eq!(fm.length(), 72);
        let bytes = fm.to_bytes().unwrap();
        assert_eq!(bytes.len(), 72);
        // command, idle, hard
        assert_eq!(&bytes[48..54], &[0, 0, 0, 10, 0, 0]);
        // buffer id, out port, flags
        assert_eq!(&bytes[56..64], &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0, 1]);

        let mut back = FlowMod::new(OfpVersion::Of10, FlowModCmd::DeleteFlow);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, fm);
    }

    #[test]
    fn of13_flow_mod() {
        let mut fm = FlowMod::new(OfpVersion::Of13, FlowModCmd::ModStrictFlow);
        fm.table_id = 3;
        fm.reset_counts = true;
        fm.apply_to_packet = Some(7);
        fm.out_port = Some(PseudoPort::Controller);
        fm.pattern.set_eth_type(0x0800).unwrap();
        fm.instructions
            .actions_mut(InstructionType::ApplyActions)
            .unwrap()
            .append(ActionBody::Output {
                port: OFPP_CONTROLLER,
                max_len: 128,
            })
            .unwrap();
        // 40 + 16 (match) + 24 (apply actions)
        assert_eq!(fm.length(), 80);
        let bytes = fm.to_bytes().unwrap();
        assert_eq!(bytes[16], 3);
        assert_eq!(bytes[17], 2);
        assert_eq!(&bytes[28..32], &[0xff, 0xff, 0xff, 0xfd]);
        assert_eq!(&bytes[36..38], &[0, 4]);

        let mut back = FlowMod::new(OfpVersion::Of13, FlowModCmd::AddFlow);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, fm);
    }

    #[test]
    fn output_to_table_is_rejected() {
        let mut fm = FlowMod::new(OfpVersion::Of10, FlowModCmd::AddFlow);
        fm.actions
            .append(ActionBody::Output {
                port: OFPP_TABLE,
                max_len: 0,
            })
            .unwrap();
        assert!(matches!(fm.to_bytes(), Err(OfpError::BadPrerequisite { .. })));
    }

    #[test]
    fn trailing_garbage() {
        let fm = FlowMod::new(OfpVersion::Of12, FlowModCmd::DeleteFlow);
        let mut bytes = fm.to_bytes().unwrap();
        assert_eq!(bytes.len(), 48);
        bytes.extend_from_slice(&[0, 1, 0, 2]);
        let mut back = FlowMod::new(OfpVersion::Of12, FlowModCmd::AddFlow);
        assert!(back.unpack(&bytes).is_err());
    }

    #[test]
    fn bad_command() {
        let mut bytes = FlowMod::new(OfpVersion::Of13, FlowModCmd::AddFlow)
            .to_bytes()
            .unwrap();
        bytes[17] = 9;
        let mut back = FlowMod::new(OfpVersion::Of13, FlowModCmd::AddFlow);
        assert!(back.unpack(&bytes).unwrap_err().is_not_found());
    }
}
