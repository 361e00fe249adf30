use log::debug;

use crate::flow_mod::{FlowMod, FlowModCmd};
use crate::group_mod::{GroupMod, GroupModCmd, GroupType};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFPT_FLOW_MOD: u8 = 14;
/// 1.2 and later; the same code is `OFPT_PORT_MOD` in 1.0.
pub const OFPT_GROUP_MOD: u8 = 15;

/// OpenFlow Message
///
/// Version-agnostic API for handling OpenFlow messages at the byte-buffer level.
pub trait OfpMessage: Sized {
    /// Return the byte-size of a message, header included.
    fn size_of(&self) -> usize;
    /// Create an `OfpHeader` for the given transaction id and OpenFlow message.
    fn header_of(&self, xid: u32) -> Result<OfpHeader>;
    /// Return a marshaled buffer containing an OpenFlow header and the message.
    fn marshal(&self, xid: u32) -> Result<Vec<u8>>;
    /// Returns a pair `(u32, OfpMessage)` of the transaction id and OpenFlow message parsed from
    /// the given OpenFlow header `header`, and message body `buf`.
    fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(u32, Self)>;
}

/// The messages whose bodies are built from actions, instructions,
/// matches and buckets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    FlowMod(FlowMod),
    GroupMod(GroupMod),
}

impl Message {
    pub fn version(&self) -> OfpVersion {
        match *self {
            Message::FlowMod(ref fm) => fm.version(),
            Message::GroupMod(ref gm) => gm.version(),
        }
    }

    fn msg_code(&self) -> u8 {
        match *self {
            Message::FlowMod(_) => OFPT_FLOW_MOD,
            Message::GroupMod(_) => OFPT_GROUP_MOD,
        }
    }

    fn body_length(&self) -> usize {
        match *self {
            Message::FlowMod(ref fm) => fm.length(),
            Message::GroupMod(ref gm) => gm.length(),
        }
    }

    /// Parse a complete message, header included, from the front of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<(u32, Message)> {
        let header = OfpHeader::parse(buf)?;
        let len = header.length();
        if len < OfpHeader::size() || len > buf.len() {
            return Err(OfpError::bad_length("ofp_header", len, buf.len()));
        }
        Message::parse(&header, &buf[OfpHeader::size()..len])
    }
}

impl OfpMessage for Message {
    fn size_of(&self) -> usize {
        OfpHeader::size() + self.body_length()
    }

    fn header_of(&self, xid: u32) -> Result<OfpHeader> {
        let version = self.version().check_known("message")?;
        let len = self.size_of();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("message", len, u16::max_value() as usize));
        }
        Ok(OfpHeader::new(version.wire(), self.msg_code(), len as u16, xid))
    }

    fn marshal(&self, xid: u32) -> Result<Vec<u8>> {
        let header = self.header_of(xid)?;
        let mut bytes = Vec::with_capacity(header.length());
        OfpHeader::marshal(&mut bytes, header)?;
        match *self {
            Message::FlowMod(ref fm) => fm.marshal(&mut bytes)?,
            Message::GroupMod(ref gm) => gm.marshal(&mut bytes)?,
        }
        Ok(bytes)
    }

    fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(u32, Message)> {
        let version = header.version().check_known("message")?;
        let msg = match header.type_code() {
            OFPT_FLOW_MOD => {
                let mut fm = FlowMod::new(version, FlowModCmd::AddFlow);
                fm.unpack(buf)?;
                Message::FlowMod(fm)
            }
            OFPT_GROUP_MOD if version.is_oxm() => {
                let mut gm = GroupMod::new(version, GroupModCmd::AddGroup, GroupType::All, 0);
                gm.unpack(buf)?;
                Message::GroupMod(gm)
            }
            t => {
                return Err(OfpError::NotFound(format!(
                    "message type {} in OpenFlow {}",
                    t, version
                )))
            }
        };
        debug!("parsed message type {}, xid {}", header.type_code(), header.xid());
        Ok((header.xid(), msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionBody;
    use crate::instruction::InstructionType;

    #[test]
    fn flow_mod_message() {
        let mut fm = FlowMod::new(OfpVersion::Of13, FlowModCmd::AddFlow);
        fm.pattern.set_in_port(1).unwrap();
        fm.instructions
            .actions_mut(InstructionType::ApplyActions)
            .unwrap()
            .append(ActionBody::Output { port: 2, max_len: 0 })
            .unwrap();
        let msg = Message::FlowMod(fm);
        let bytes = msg.marshal(0x42).unwrap();
        assert_eq!(bytes.len(), msg.size_of());
        assert_eq!(&bytes[..4], &[4, OFPT_FLOW_MOD, 0, 88]);

        let (xid, back) = Message::from_bytes(&bytes).unwrap();
        assert_eq!(xid, 0x42);
        assert_eq!(back, msg);
    }

    #[test]
    fn group_mod_message() {
        let mut gm = GroupMod::new(OfpVersion::Of12, GroupModCmd::AddGroup, GroupType::All, 3);
        gm.buckets.append_output(0, 1).unwrap();
        let msg = Message::GroupMod(gm);
        let bytes = msg.marshal(1).unwrap();
        assert_eq!(&bytes[..4], &[3, OFPT_GROUP_MOD, 0, 48]);
        let (_, back) = Message::from_bytes(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn port_mod_is_not_group_mod_in_of10() {
        let bytes = [1, OFPT_GROUP_MOD, 0, 8, 0, 0, 0, 1];
        assert!(Message::from_bytes(&bytes).unwrap_err().is_not_found());
    }

    #[test]
    fn truncated_message() {
        let bytes = [4, OFPT_FLOW_MOD, 0, 64, 0, 0, 0, 1];
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(OfpError::BadLength { .. })
        ));
    }
}
