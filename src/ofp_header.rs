use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_error::{OfpError, Result};

pub const OFP_HEADER_LENGTH: usize = 8;

pub type Xid = u32;

pub const OPENFLOW_0_01_VERSION: u8 = 0x01; // 1.0
pub const OPENFLOW_0_03_VERSION: u8 = 0x03; // 1.2
pub const OPENFLOW_0_04_VERSION: u8 = 0x04; // 1.3

/// OpenFlow protocol version an object is laid out for.
///
/// Nearly every structure carries one of these; it selects struct layout and
/// which accessors are legal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OfpVersion {
    Unknown,
    Of10,
    Of12,
    Of13,
}

impl OfpVersion {
    /// The version byte used in the OpenFlow header.
    pub fn wire(self) -> u8 {
        match self {
            OfpVersion::Unknown => 0,
            OfpVersion::Of10 => OPENFLOW_0_01_VERSION,
            OfpVersion::Of12 => OPENFLOW_0_03_VERSION,
            OfpVersion::Of13 => OPENFLOW_0_04_VERSION,
        }
    }

    pub fn from_wire(v: u8) -> OfpVersion {
        match v {
            OPENFLOW_0_01_VERSION => OfpVersion::Of10,
            OPENFLOW_0_03_VERSION => OfpVersion::Of12,
            OPENFLOW_0_04_VERSION => OfpVersion::Of13,
            _ => OfpVersion::Unknown,
        }
    }

    /// True for the OXM/instruction based versions (1.2 and later).
    pub fn is_oxm(self) -> bool {
        matches!(self, OfpVersion::Of12 | OfpVersion::Of13)
    }

    /// Fails with `BadVersion` for `Unknown`.
    pub fn check_known(self, what: &str) -> Result<OfpVersion> {
        match self {
            OfpVersion::Unknown => Err(OfpError::bad_version(self, what)),
            v => Ok(v),
        }
    }
}

impl Default for OfpVersion {
    fn default() -> OfpVersion {
        OfpVersion::Unknown
    }
}

impl fmt::Display for OfpVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            OfpVersion::Unknown => write!(f, "unknown"),
            OfpVersion::Of10 => write!(f, "1.0"),
            OfpVersion::Of12 => write!(f, "1.2"),
            OfpVersion::Of13 => write!(f, "1.3"),
        }
    }
}

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        OFP_HEADER_LENGTH
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) -> Result<()> {
        bytes.write_u8(header.version)?;
        bytes.write_u8(header.typ)?;
        bytes.write_u16::<BigEndian>(header.length)?;
        bytes.write_u32::<BigEndian>(header.xid)?;
        Ok(())
    }

    /// Takes a message buffer (at least header sized) and returns an `OfpHeader`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < OFP_HEADER_LENGTH {
            return Err(OfpError::bad_length("ofp_header", buf.len(), OFP_HEADER_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        Ok(OfpHeader {
            version: bytes.read_u8()?,
            typ: bytes.read_u8()?,
            length: bytes.read_u16::<BigEndian>()?,
            xid: bytes.read_u32::<BigEndian>()?,
        })
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> OfpVersion {
        OfpVersion::from_wire(self.version)
    }

    /// Return the OpenFlow message type code of a header.
    pub fn type_code(&self) -> u8 {
        self.typ
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}
