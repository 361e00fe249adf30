use std::fmt;
use std::io::{Cursor, Read};
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::warn;

use crate::bits::{pad_to_8, write_padding_bytes};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};
use crate::oxm::OxmField;
use crate::port::{port_from_of10, port_to_of10, PseudoPort};

/// Size of the smallest action, and of every fixed action header.
pub const OFP_ACTION_HEADER_LENGTH: usize = 8;
const OFP_ACTION_TL_LENGTH: usize = 4;

pub const OFP10AT_OUTPUT: u16 = 0;
pub const OFP10AT_SET_VLAN_VID: u16 = 1;
pub const OFP10AT_SET_VLAN_PCP: u16 = 2;
pub const OFP10AT_STRIP_VLAN: u16 = 3;
pub const OFP10AT_SET_DL_SRC: u16 = 4;
pub const OFP10AT_SET_DL_DST: u16 = 5;
pub const OFP10AT_SET_NW_SRC: u16 = 6;
pub const OFP10AT_SET_NW_DST: u16 = 7;
pub const OFP10AT_SET_NW_TOS: u16 = 8;
pub const OFP10AT_SET_TP_SRC: u16 = 9;
pub const OFP10AT_SET_TP_DST: u16 = 10;
pub const OFP10AT_ENQUEUE: u16 = 11;
pub const OFP10AT_VENDOR: u16 = 0xffff;

pub const OFPAT_OUTPUT: u16 = 0;
pub const OFPAT_COPY_TTL_OUT: u16 = 11;
pub const OFPAT_COPY_TTL_IN: u16 = 12;
pub const OFPAT_SET_MPLS_TTL: u16 = 15;
pub const OFPAT_DEC_MPLS_TTL: u16 = 16;
pub const OFPAT_PUSH_VLAN: u16 = 17;
pub const OFPAT_POP_VLAN: u16 = 18;
pub const OFPAT_PUSH_MPLS: u16 = 19;
pub const OFPAT_POP_MPLS: u16 = 20;
pub const OFPAT_SET_QUEUE: u16 = 21;
pub const OFPAT_GROUP: u16 = 22;
pub const OFPAT_SET_NW_TTL: u16 = 23;
pub const OFPAT_DEC_NW_TTL: u16 = 24;
pub const OFPAT_SET_FIELD: u16 = 25;
pub const OFPAT_PUSH_PBB: u16 = 26;
pub const OFPAT_POP_PBB: u16 = 27;
pub const OFPAT_EXPERIMENTER: u16 = 0xffff;

/// Version independent action kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionType {
    Output,
    SetVlanVid,
    SetVlanPcp,
    StripVlan,
    SetDlSrc,
    SetDlDst,
    SetNwSrc,
    SetNwDst,
    SetNwTos,
    SetTpSrc,
    SetTpDst,
    Enqueue,
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl,
    DecMplsTtl,
    PushVlan,
    PopVlan,
    PushMpls,
    PopMpls,
    SetQueue,
    Group,
    SetNwTtl,
    DecNwTtl,
    SetField,
    PushPbb,
    PopPbb,
    Vendor,
    Experimenter,
    Unknown,
}

const OF10_CODES: &[(ActionType, u16)] = &[
    (ActionType::Output, OFP10AT_OUTPUT),
    (ActionType::SetVlanVid, OFP10AT_SET_VLAN_VID),
    (ActionType::SetVlanPcp, OFP10AT_SET_VLAN_PCP),
    (ActionType::StripVlan, OFP10AT_STRIP_VLAN),
    (ActionType::SetDlSrc, OFP10AT_SET_DL_SRC),
    (ActionType::SetDlDst, OFP10AT_SET_DL_DST),
    (ActionType::SetNwSrc, OFP10AT_SET_NW_SRC),
    (ActionType::SetNwDst, OFP10AT_SET_NW_DST),
    (ActionType::SetNwTos, OFP10AT_SET_NW_TOS),
    (ActionType::SetTpSrc, OFP10AT_SET_TP_SRC),
    (ActionType::SetTpDst, OFP10AT_SET_TP_DST),
    (ActionType::Enqueue, OFP10AT_ENQUEUE),
    (ActionType::Vendor, OFP10AT_VENDOR),
];

// PBB push/pop are the trailing two entries and only exist in 1.3.
const OF13_CODES: &[(ActionType, u16)] = &[
    (ActionType::Output, OFPAT_OUTPUT),
    (ActionType::CopyTtlOut, OFPAT_COPY_TTL_OUT),
    (ActionType::CopyTtlIn, OFPAT_COPY_TTL_IN),
    (ActionType::SetMplsTtl, OFPAT_SET_MPLS_TTL),
    (ActionType::DecMplsTtl, OFPAT_DEC_MPLS_TTL),
    (ActionType::PushVlan, OFPAT_PUSH_VLAN),
    (ActionType::PopVlan, OFPAT_POP_VLAN),
    (ActionType::PushMpls, OFPAT_PUSH_MPLS),
    (ActionType::PopMpls, OFPAT_POP_MPLS),
    (ActionType::SetQueue, OFPAT_SET_QUEUE),
    (ActionType::Group, OFPAT_GROUP),
    (ActionType::SetNwTtl, OFPAT_SET_NW_TTL),
    (ActionType::DecNwTtl, OFPAT_DEC_NW_TTL),
    (ActionType::SetField, OFPAT_SET_FIELD),
    (ActionType::Experimenter, OFPAT_EXPERIMENTER),
    (ActionType::PushPbb, OFPAT_PUSH_PBB),
    (ActionType::PopPbb, OFPAT_POP_PBB),
];

fn code_table(version: OfpVersion) -> &'static [(ActionType, u16)] {
    match version {
        OfpVersion::Of10 => OF10_CODES,
        OfpVersion::Of12 => &OF13_CODES[..OF13_CODES.len() - 2],
        OfpVersion::Of13 => OF13_CODES,
        OfpVersion::Unknown => &[],
    }
}

impl ActionType {
    /// Decode a wire type code. Version is checked before the code.
    pub fn from_code(version: OfpVersion, code: u16) -> Option<ActionType> {
        code_table(version)
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(t, _)| *t)
    }

    /// Wire type code under `version`, `None` when the action does not exist there.
    pub fn code(self, version: OfpVersion) -> Option<u16> {
        code_table(version)
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, c)| *c)
    }

    pub fn supported_in(self, version: OfpVersion) -> bool {
        match self {
            ActionType::Unknown => version != OfpVersion::Unknown,
            t => t.code(version).is_some(),
        }
    }

    /// Exact wire length of fixed size actions.
    pub fn fixed_length(self, version: OfpVersion) -> Option<usize> {
        use self::ActionType::*;
        match self {
            Output if version == OfpVersion::Of10 => Some(8),
            Output | SetDlSrc | SetDlDst | Enqueue => Some(16),
            SetField | Vendor | Experimenter | Unknown => None,
            _ => Some(OFP_ACTION_HEADER_LENGTH),
        }
    }

    pub fn name(self) -> &'static str {
        use self::ActionType::*;
        match self {
            Output => "output",
            SetVlanVid => "set_vlan_vid",
            SetVlanPcp => "set_vlan_pcp",
            StripVlan => "strip_vlan",
            SetDlSrc => "set_dl_src",
            SetDlDst => "set_dl_dst",
            SetNwSrc => "set_nw_src",
            SetNwDst => "set_nw_dst",
            SetNwTos => "set_nw_tos",
            SetTpSrc => "set_tp_src",
            SetTpDst => "set_tp_dst",
            Enqueue => "enqueue",
            CopyTtlOut => "copy_ttl_out",
            CopyTtlIn => "copy_ttl_in",
            SetMplsTtl => "set_mpls_ttl",
            DecMplsTtl => "dec_mpls_ttl",
            PushVlan => "push_vlan",
            PopVlan => "pop_vlan",
            PushMpls => "push_mpls",
            PopMpls => "pop_mpls",
            SetQueue => "set_queue",
            Group => "group",
            SetNwTtl => "set_nw_ttl",
            DecNwTtl => "dec_nw_ttl",
            SetField => "set_field",
            PushPbb => "push_pbb",
            PopPbb => "pop_pbb",
            Vendor => "vendor",
            Experimenter => "experimenter",
            Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Payload of an action. Ports are always 32 bit; see `port::port_to_of10`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionBody {
    Output { port: u32, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc([u8; 6]),
    SetDlDst([u8; 6]),
    SetNwSrc(Ipv4Addr),
    SetNwDst(Ipv4Addr),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    Enqueue { port: u32, queue_id: u32 },
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl(u8),
    DecMplsTtl,
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    PopMpls(u16),
    SetQueue(u32),
    Group(u32),
    SetNwTtl(u8),
    DecNwTtl,
    SetField(OxmField),
    PushPbb(u16),
    PopPbb,
    Vendor { vendor: u32, body: Vec<u8> },
    Experimenter { experimenter: u32, body: Vec<u8> },
    /// A type code this crate does not know, kept verbatim.
    Unknown { type_code: u16, body: Vec<u8> },
}

impl ActionBody {
    pub fn action_type(&self) -> ActionType {
        use self::ActionBody::*;
        match *self {
            Output { .. } => ActionType::Output,
            SetVlanVid(_) => ActionType::SetVlanVid,
            SetVlanPcp(_) => ActionType::SetVlanPcp,
            StripVlan => ActionType::StripVlan,
            SetDlSrc(_) => ActionType::SetDlSrc,
            SetDlDst(_) => ActionType::SetDlDst,
            SetNwSrc(_) => ActionType::SetNwSrc,
            SetNwDst(_) => ActionType::SetNwDst,
            SetNwTos(_) => ActionType::SetNwTos,
            SetTpSrc(_) => ActionType::SetTpSrc,
            SetTpDst(_) => ActionType::SetTpDst,
            Enqueue { .. } => ActionType::Enqueue,
            CopyTtlOut => ActionType::CopyTtlOut,
            CopyTtlIn => ActionType::CopyTtlIn,
            SetMplsTtl(_) => ActionType::SetMplsTtl,
            DecMplsTtl => ActionType::DecMplsTtl,
            PushVlan(_) => ActionType::PushVlan,
            PopVlan => ActionType::PopVlan,
            PushMpls(_) => ActionType::PushMpls,
            PopMpls(_) => ActionType::PopMpls,
            SetQueue(_) => ActionType::SetQueue,
            Group(_) => ActionType::Group,
            SetNwTtl(_) => ActionType::SetNwTtl,
            DecNwTtl => ActionType::DecNwTtl,
            SetField(_) => ActionType::SetField,
            PushPbb(_) => ActionType::PushPbb,
            PopPbb => ActionType::PopPbb,
            Vendor { .. } => ActionType::Vendor,
            Experimenter { .. } => ActionType::Experimenter,
            Unknown { .. } => ActionType::Unknown,
        }
    }
}

/// Actions associated with flows and packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    version: OfpVersion,
    body: ActionBody,
}

impl Action {
    /// Fails with `BadVersion` when `body` has no encoding in `version`.
    pub fn new(version: OfpVersion, body: ActionBody) -> Result<Action> {
        let action = Action { version, body };
        action.check_version()?;
        Ok(action)
    }

    pub fn output(version: OfpVersion, port: u32, max_len: u16) -> Result<Action> {
        Action::new(version, ActionBody::Output { port, max_len })
    }

    pub fn set_field(version: OfpVersion, oxm: OxmField) -> Result<Action> {
        Action::new(version, ActionBody::SetField(oxm))
    }

    fn check_version(&self) -> Result<()> {
        self.version.check_known("action")?;
        let typ = self.body.action_type();
        if !typ.supported_in(self.version) {
            return Err(OfpError::bad_version(self.version, format!("action {}", typ)));
        }
        if let ActionBody::SetField(ref oxm) = self.body {
            if let Some(t) = oxm.oxm_type() {
                if !t.supported_in(self.version) {
                    return Err(OfpError::bad_version(
                        self.version,
                        format!("set_field on {}", t),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn body(&self) -> &ActionBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ActionBody {
        &mut self.body
    }

    pub fn into_body(self) -> ActionBody {
        self.body
    }

    pub fn action_type(&self) -> ActionType {
        self.body.action_type()
    }

    /// The wire type code under the action's version.
    pub fn type_code(&self) -> Result<u16> {
        match self.body {
            ActionBody::Unknown { type_code, .. } => Ok(type_code),
            _ => {
                let typ = self.action_type();
                typ.code(self.version).ok_or_else(|| {
                    OfpError::bad_version(self.version, format!("action {}", typ))
                })
            }
        }
    }

    /// Destination port of an `Output` action.
    pub fn output_port(&self) -> Option<u32> {
        match self.body {
            ActionBody::Output { port, .. } => Some(port),
            _ => None,
        }
    }

    /// Decode the action at the front of `buf`. Bytes past the declared
    /// length are left alone.
    ///
    /// Type codes overlap across versions (1.0 enqueue and 1.2 copy TTL out
    /// are both 11), so `version` picks the table.
    pub fn parse(version: OfpVersion, buf: &[u8]) -> Result<Action> {
        version.check_known("action")?;
        if buf.len() < OFP_ACTION_HEADER_LENGTH {
            return Err(OfpError::bad_length("action header", buf.len(), OFP_ACTION_HEADER_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        let code = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < OFP_ACTION_HEADER_LENGTH || len > buf.len() {
            return Err(OfpError::bad_length("action", len, buf.len()));
        }
        if len % 8 != 0 {
            return Err(OfpError::bad_length("action (not 8 byte aligned)", len, pad_to_8(len)));
        }

        let typ = match ActionType::from_code(version, code) {
            Some(t) => t,
            None => {
                warn!(
                    "unknown action type {} for OpenFlow {}, keeping {} opaque bytes",
                    code, version, len
                );
                let body = buf[OFP_ACTION_TL_LENGTH..len].to_vec();
                return Ok(Action {
                    version,
                    body: ActionBody::Unknown {
                        type_code: code,
                        body,
                    },
                });
            }
        };
        if let Some(fixed) = typ.fixed_length(version) {
            if len != fixed {
                return Err(OfpError::bad_length(typ.name(), len, fixed));
            }
        }

        let of10 = version == OfpVersion::Of10;
        let body = match typ {
            ActionType::Output => {
                if of10 {
                    let port = port_from_of10(bytes.read_u16::<BigEndian>()?);
                    let max_len = bytes.read_u16::<BigEndian>()?;
                    ActionBody::Output { port, max_len }
                } else {
                    let port = bytes.read_u32::<BigEndian>()?;
                    let max_len = bytes.read_u16::<BigEndian>()?;
                    ActionBody::Output { port, max_len }
                }
            }
            ActionType::SetVlanVid => ActionBody::SetVlanVid(bytes.read_u16::<BigEndian>()?),
            ActionType::SetVlanPcp => ActionBody::SetVlanPcp(bytes.read_u8()?),
            ActionType::StripVlan => ActionBody::StripVlan,
            ActionType::SetDlSrc => ActionBody::SetDlSrc(read_mac(&mut bytes)?),
            ActionType::SetDlDst => ActionBody::SetDlDst(read_mac(&mut bytes)?),
            ActionType::SetNwSrc => {
                ActionBody::SetNwSrc(Ipv4Addr::from(bytes.read_u32::<BigEndian>()?))
            }
            ActionType::SetNwDst => {
                ActionBody::SetNwDst(Ipv4Addr::from(bytes.read_u32::<BigEndian>()?))
            }
            ActionType::SetNwTos => ActionBody::SetNwTos(bytes.read_u8()?),
            ActionType::SetTpSrc => ActionBody::SetTpSrc(bytes.read_u16::<BigEndian>()?),
            ActionType::SetTpDst => ActionBody::SetTpDst(bytes.read_u16::<BigEndian>()?),
            ActionType::Enqueue => {
                let port = port_from_of10(bytes.read_u16::<BigEndian>()?);
                let mut pad = [0; 6];
                bytes.read_exact(&mut pad)?;
                let queue_id = bytes.read_u32::<BigEndian>()?;
                ActionBody::Enqueue { port, queue_id }
            }
            ActionType::CopyTtlOut => ActionBody::CopyTtlOut,
            ActionType::CopyTtlIn => ActionBody::CopyTtlIn,
            ActionType::SetMplsTtl => ActionBody::SetMplsTtl(bytes.read_u8()?),
            ActionType::DecMplsTtl => ActionBody::DecMplsTtl,
            ActionType::PushVlan => ActionBody::PushVlan(bytes.read_u16::<BigEndian>()?),
            ActionType::PopVlan => ActionBody::PopVlan,
            ActionType::PushMpls => ActionBody::PushMpls(bytes.read_u16::<BigEndian>()?),
            ActionType::PopMpls => ActionBody::PopMpls(bytes.read_u16::<BigEndian>()?),
            ActionType::SetQueue => ActionBody::SetQueue(bytes.read_u32::<BigEndian>()?),
            ActionType::Group => ActionBody::Group(bytes.read_u32::<BigEndian>()?),
            ActionType::SetNwTtl => ActionBody::SetNwTtl(bytes.read_u8()?),
            ActionType::DecNwTtl => ActionBody::DecNwTtl,
            ActionType::SetField => {
                let oxm = OxmField::parse(&buf[OFP_ACTION_TL_LENGTH..len])?;
                let expected = set_field_length(&oxm);
                if len != expected {
                    return Err(OfpError::bad_length("set_field", len, expected));
                }
                ActionBody::SetField(oxm)
            }
            ActionType::PushPbb => ActionBody::PushPbb(bytes.read_u16::<BigEndian>()?),
            ActionType::PopPbb => ActionBody::PopPbb,
            ActionType::Vendor => ActionBody::Vendor {
                vendor: bytes.read_u32::<BigEndian>()?,
                body: buf[OFP_ACTION_HEADER_LENGTH..len].to_vec(),
            },
            ActionType::Experimenter => ActionBody::Experimenter {
                experimenter: bytes.read_u32::<BigEndian>()?,
                body: buf[OFP_ACTION_HEADER_LENGTH..len].to_vec(),
            },
            ActionType::Unknown => ActionBody::Unknown {
                type_code: code,
                body: buf[OFP_ACTION_TL_LENGTH..len].to_vec(),
            },
        };
        Ok(Action { version, body })
    }
}

fn read_mac(bytes: &mut Cursor<&[u8]>) -> Result<[u8; 6]> {
    let mut mac = [0; 6];
    bytes.read_exact(&mut mac)?;
    Ok(mac)
}

fn set_field_length(oxm: &OxmField) -> usize {
    pad_to_8(OFP_ACTION_TL_LENGTH + oxm.length())
}

impl Versioned for Action {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for Action {
    fn length(&self) -> usize {
        match self.body {
            ActionBody::SetField(ref oxm) => set_field_length(oxm),
            ActionBody::Vendor { ref body, .. } | ActionBody::Experimenter { ref body, .. } => {
                pad_to_8(OFP_ACTION_HEADER_LENGTH + body.len())
            }
            ActionBody::Unknown { ref body, .. } => pad_to_8(OFP_ACTION_TL_LENGTH + body.len()),
            ref b => b
                .action_type()
                .fixed_length(self.version)
                .unwrap_or(OFP_ACTION_HEADER_LENGTH),
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        self.check_version()?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("action", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(self.type_code()?)?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        match self.body {
            ActionBody::Output { port, max_len } => {
                if self.version == OfpVersion::Of10 {
                    bytes.write_u16::<BigEndian>(port_to_of10(port))?;
                    bytes.write_u16::<BigEndian>(max_len)?;
                } else {
                    bytes.write_u32::<BigEndian>(port)?;
                    bytes.write_u16::<BigEndian>(max_len)?;
                    write_padding_bytes(bytes, 6);
                }
            }
            ActionBody::StripVlan
            | ActionBody::CopyTtlOut
            | ActionBody::CopyTtlIn
            | ActionBody::DecMplsTtl
            | ActionBody::PopVlan
            | ActionBody::DecNwTtl
            | ActionBody::PopPbb => write_padding_bytes(bytes, 4),
            ActionBody::SetVlanPcp(v)
            | ActionBody::SetNwTos(v)
            | ActionBody::SetMplsTtl(v)
            | ActionBody::SetNwTtl(v) => {
                bytes.write_u8(v)?;
                write_padding_bytes(bytes, 3);
            }
            ActionBody::SetVlanVid(v)
            | ActionBody::SetTpSrc(v)
            | ActionBody::SetTpDst(v)
            | ActionBody::PushVlan(v)
            | ActionBody::PushMpls(v)
            | ActionBody::PopMpls(v)
            | ActionBody::PushPbb(v) => {
                bytes.write_u16::<BigEndian>(v)?;
                write_padding_bytes(bytes, 2);
            }
            ActionBody::SetDlSrc(mac) | ActionBody::SetDlDst(mac) => {
                bytes.extend_from_slice(&mac);
                write_padding_bytes(bytes, 6);
            }
            ActionBody::SetNwSrc(addr) | ActionBody::SetNwDst(addr) => {
                bytes.write_u32::<BigEndian>(u32::from(addr))?;
            }
            ActionBody::Enqueue { port, queue_id } => {
                bytes.write_u16::<BigEndian>(port_to_of10(port))?;
                write_padding_bytes(bytes, 6);
                bytes.write_u32::<BigEndian>(queue_id)?;
            }
            ActionBody::SetQueue(v) | ActionBody::Group(v) => {
                bytes.write_u32::<BigEndian>(v)?;
            }
            ActionBody::SetField(ref oxm) => {
                oxm.marshal(bytes)?;
                write_padding_bytes(bytes, len - OFP_ACTION_TL_LENGTH - oxm.length());
            }
            ActionBody::Vendor { vendor: id, ref body }
            | ActionBody::Experimenter {
                experimenter: id,
                ref body,
            } => {
                bytes.write_u32::<BigEndian>(id)?;
                bytes.extend_from_slice(body);
                write_padding_bytes(bytes, len - OFP_ACTION_HEADER_LENGTH - body.len());
            }
            ActionBody::Unknown { ref body, .. } => {
                bytes.extend_from_slice(body);
                write_padding_bytes(bytes, len - OFP_ACTION_TL_LENGTH - body.len());
            }
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        *self = Action::parse(self.version, buf)?;
        Ok(())
    }
}

fn fmt_mac(f: &mut fmt::Formatter, mac: &[u8; 6]) -> fmt::Result {
    write!(
        f,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.action_type())?;
        match self.body {
            ActionBody::Output { port, max_len } => {
                write!(f, "(port={}, max_len={})", PseudoPort::of_port(port), max_len)
            }
            ActionBody::Enqueue { port, queue_id } => {
                write!(f, "(port={}, queue_id={})", PseudoPort::of_port(port), queue_id)
            }
            ActionBody::SetDlSrc(ref mac) | ActionBody::SetDlDst(ref mac) => {
                write!(f, "(")?;
                fmt_mac(f, mac)?;
                write!(f, ")")
            }
            ActionBody::SetNwSrc(addr) | ActionBody::SetNwDst(addr) => write!(f, "({})", addr),
            ActionBody::SetVlanPcp(v)
            | ActionBody::SetNwTos(v)
            | ActionBody::SetMplsTtl(v)
            | ActionBody::SetNwTtl(v) => write!(f, "({})", v),
            ActionBody::SetVlanVid(v) | ActionBody::SetTpSrc(v) | ActionBody::SetTpDst(v) => {
                write!(f, "({})", v)
            }
            ActionBody::PushVlan(v)
            | ActionBody::PushMpls(v)
            | ActionBody::PopMpls(v)
            | ActionBody::PushPbb(v) => write!(f, "(ethertype=0x{:04x})", v),
            ActionBody::SetQueue(v) | ActionBody::Group(v) => write!(f, "({})", v),
            ActionBody::SetField(ref oxm) => write!(f, "({})", oxm),
            ActionBody::Vendor { vendor: id, ref body }
            | ActionBody::Experimenter {
                experimenter: id,
                ref body,
            } => write!(f, "(id=0x{:08x}, {} byte(s))", id, body.len()),
            ActionBody::Unknown {
                type_code,
                ref body,
            } => write!(f, "(type={}, {} byte(s))", type_code, body.len()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oxm::OxmType;
    use crate::port::OFPP_CONTROLLER;

    #[test]
    fn of10_output_bytes() {
        let a = Action::output(OfpVersion::Of10, 6, 0).unwrap();
        assert_eq!(a.length(), 8);
        assert_eq!(a.to_bytes().unwrap(), vec![0, 0, 0, 8, 0, 6, 0, 0]);
    }

    #[test]
    fn of13_output_bytes() {
        let a = Action::output(OfpVersion::Of13, OFPP_CONTROLLER, 0xffff).unwrap();
        assert_eq!(a.length(), 16);
        assert_eq!(
            a.to_bytes().unwrap(),
            vec![0, 0, 0, 16, 0xff, 0xff, 0xff, 0xfd, 0xff, 0xff, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn of10_reserved_port_narrowing() {
        let a = Action::output(OfpVersion::Of10, OFPP_CONTROLLER, 128).unwrap();
        let bytes = a.to_bytes().unwrap();
        assert_eq!(&bytes[4..6], &[0xff, 0xfd]);
        let back = Action::parse(OfpVersion::Of10, &bytes).unwrap();
        assert_eq!(back.output_port(), Some(OFPP_CONTROLLER));
    }

    #[test]
    fn code_11_depends_on_version() {
        let enqueue = [0, 11, 0, 16, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 7];
        let a = Action::parse(OfpVersion::Of10, &enqueue).unwrap();
        assert_eq!(
            a.body(),
            &ActionBody::Enqueue {
                port: 3,
                queue_id: 7
            }
        );

        let copy_ttl_out = [0, 11, 0, 8, 0, 0, 0, 0];
        let a = Action::parse(OfpVersion::Of12, &copy_ttl_out).unwrap();
        assert_eq!(a.action_type(), ActionType::CopyTtlOut);
        assert!(matches!(
            Action::parse(OfpVersion::Of10, &copy_ttl_out),
            Err(OfpError::BadLength { .. })
        ));
    }

    #[test]
    fn fixed_length_mismatch() {
        let bytes = [0, 0, 0, 16, 0, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Action::parse(OfpVersion::Of10, &bytes),
            Err(OfpError::BadLength { .. })
        ));
        assert!(matches!(
            Action::parse(OfpVersion::Of10, &[0, 0, 0, 0, 0, 6, 0, 0]),
            Err(OfpError::BadLength { .. })
        ));
        assert!(matches!(
            Action::parse(OfpVersion::Of10, &[0, 0, 0, 8, 0, 6]),
            Err(OfpError::BadLength { .. })
        ));
    }

    #[test]
    fn set_field_padding() {
        let oxm = OxmField::from_uint(OxmType::VlanVid, 0x1000 | 10);
        let a = Action::set_field(OfpVersion::Of12, oxm).unwrap();
        // 4 + 6 padded up to 16
        assert_eq!(a.length(), 16);
        let bytes = a.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0, 25, 0, 16, 0x80, 0x00, 0x0c, 0x02, 0x10, 0x0a, 0, 0, 0, 0, 0, 0]
        );
        let back = Action::parse(OfpVersion::Of12, &bytes).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn version_restrictions() {
        assert!(matches!(
            Action::new(OfpVersion::Of12, ActionBody::SetVlanVid(100)),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(matches!(
            Action::new(OfpVersion::Of12, ActionBody::PushPbb(0x88e7)),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(Action::new(OfpVersion::Of13, ActionBody::PushPbb(0x88e7)).is_ok());
        assert!(matches!(
            Action::new(OfpVersion::Of10, ActionBody::Group(1)),
            Err(OfpError::BadVersion { .. })
        ));
        let oxm = OxmField::from_uint(OxmType::TunnelId, 1);
        assert!(matches!(
            Action::set_field(OfpVersion::Of12, oxm),
            Err(OfpError::BadVersion { .. })
        ));
    }

    #[test]
    fn unknown_type_round_trips() {
        let bytes = [0, 200, 0, 8, 1, 2, 3, 4];
        let a = Action::parse(OfpVersion::Of13, &bytes).unwrap();
        assert_eq!(a.action_type(), ActionType::Unknown);
        assert_eq!(a.length(), 8);
        assert_eq!(a.to_bytes().unwrap(), bytes.to_vec());
    }

    #[test]
    fn experimenter_body_is_opaque() {
        let body = ActionBody::Experimenter {
            experimenter: 0x00ab_cdef,
            body: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let a = Action::new(OfpVersion::Of13, body).unwrap();
        assert_eq!(a.length(), 16);
        let bytes = a.to_bytes().unwrap();
        assert_eq!(&bytes[..8], &[0xff, 0xff, 0, 16, 0, 0xab, 0xcd, 0xef]);
        assert_eq!(Action::parse(OfpVersion::Of13, &bytes).unwrap(), a);
    }

    #[test]
    fn experimenter_body_is_padded_to_8() {
        let body = ActionBody::Experimenter {
            experimenter: 7,
            body: vec![1, 2, 3],
        };
        let a = Action::new(OfpVersion::Of13, body).unwrap();
        assert_eq!(a.length(), 16);
        let bytes = a.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0xff, 0xff, 0, 16, 0, 0, 0, 7, 1, 2, 3, 0, 0, 0, 0, 0]
        );
        let back = Action::parse(OfpVersion::Of13, &bytes).unwrap();
        assert_eq!(back.to_bytes().unwrap(), bytes);

        let vendor = ActionBody::Vendor {
            vendor: 0x2320,
            body: vec![9; 5],
        };
        let a = Action::new(OfpVersion::Of10, vendor).unwrap();
        assert_eq!(a.length(), 16);
        assert_eq!(a.to_bytes().unwrap().len(), 16);
    }

    #[test]
    fn misaligned_length_is_rejected() {
        let bytes = [0xff, 0xff, 0, 11, 0, 0, 0, 7, 1, 2, 3];
        assert!(matches!(
            Action::parse(OfpVersion::Of13, &bytes),
            Err(OfpError::BadLength { .. })
        ));
        let bytes = [0, 200, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8];
        assert!(matches!(
            Action::parse(OfpVersion::Of13, &bytes),
            Err(OfpError::BadLength { .. })
        ));
    }

    #[test]
    fn of10_rewrite_actions() {
        let actions = vec![
            ActionBody::SetDlSrc([0, 1, 2, 3, 4, 5]),
            ActionBody::SetNwDst(Ipv4Addr::new(10, 0, 0, 2)),
            ActionBody::SetTpDst(8080),
            ActionBody::StripVlan,
        ];
        for body in actions {
            let a = Action::new(OfpVersion::Of10, body).unwrap();
            let bytes = a.to_bytes().unwrap();
            assert_eq!(bytes.len(), a.length());
            assert_eq!(Action::parse(OfpVersion::Of10, &bytes).unwrap(), a);
        }
    }
}
