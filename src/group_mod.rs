use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::write_padding_bytes;
use crate::bucket::BucketList;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};
use crate::stats::{OFPGT_ALL, OFPGT_FF, OFPGT_INDIRECT, OFPGT_SELECT};

/// `ofp_group_mod` minus the message header.
const OFP_GROUP_MOD_LENGTH: usize = 8;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupModCmd {
    AddGroup = 0,
    ModifyGroup = 1,
    DeleteGroup = 2,
}

impl GroupModCmd {
    fn of_int(cmd: u16) -> Result<GroupModCmd> {
        match cmd {
            0 => Ok(GroupModCmd::AddGroup),
            1 => Ok(GroupModCmd::ModifyGroup),
            2 => Ok(GroupModCmd::DeleteGroup),
            c => Err(OfpError::NotFound(format!("group mod command {}", c))),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupType {
    All = OFPGT_ALL,
    Select = OFPGT_SELECT,
    Indirect = OFPGT_INDIRECT,
    FastFailover = OFPGT_FF,
}

impl GroupType {
    pub fn of_int(t: u8) -> Result<GroupType> {
        match t {
            OFPGT_ALL => Ok(GroupType::All),
            OFPGT_SELECT => Ok(GroupType::Select),
            OFPGT_INDIRECT => Ok(GroupType::Indirect),
            OFPGT_FF => Ok(GroupType::FastFailover),
            t => Err(OfpError::NotFound(format!("group type {}", t))),
        }
    }
}

/// Add, change or remove a group and its buckets (1.2 and later).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMod {
    version: OfpVersion,
    pub command: GroupModCmd,
    pub group_type: GroupType,
    pub group_id: u32,
    pub buckets: BucketList,
}

impl GroupMod {
    pub fn new(
        version: OfpVersion,
        command: GroupModCmd,
        group_type: GroupType,
        group_id: u32,
    ) -> GroupMod {
        GroupMod {
            version,
            command,
            group_type,
            group_id,
            buckets: BucketList::new(version),
        }
    }

    fn check_version(&self) -> Result<()> {
        if self.version.is_oxm() {
            Ok(())
        } else {
            Err(OfpError::bad_version(self.version, "group mod"))
        }
    }
}

impl Versioned for GroupMod {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.buckets.set_version(version);
    }
}

impl OfpWire for GroupMod {
    fn length(&self) -> usize {
        OFP_GROUP_MOD_LENGTH + self.buckets.length()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        self.check_version()?;
        bytes.write_u16::<BigEndian>(self.command as u16)?;
        bytes.write_u8(self.group_type as u8)?;
        write_padding_bytes(bytes, 1);
        bytes.write_u32::<BigEndian>(self.group_id)?;
        self.buckets.marshal(bytes)
    }

    /// `buf` is the message body; buckets run to its end.
    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.check_version()?;
        if buf.len() < OFP_GROUP_MOD_LENGTH {
            return Err(OfpError::bad_length("ofp_group_mod", buf.len(), OFP_GROUP_MOD_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        self.command = GroupModCmd::of_int(bytes.read_u16::<BigEndian>()?)?;
        self.group_type = GroupType::of_int(bytes.read_u8()?)?;
        bytes.read_u8()?;
        self.group_id = bytes.read_u32::<BigEndian>()?;
        let raw = &buf[OFP_GROUP_MOD_LENGTH..];
        self.buckets.unpack(raw)?;
        if self.buckets.length() != raw.len() {
            return Err(OfpError::bad_length("group mod buckets", raw.len(), self.buckets.length()));
        }
        Ok(())
    }
}
