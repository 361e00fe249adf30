use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

use crate::action_list::ActionList;
use crate::bits::write_padding_bytes;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

/// `{type: u16, len: u16}`
pub const OFP_INSTRUCTION_HEADER_LENGTH: usize = 4;
const OFP_INSTRUCTION_ACTIONS_HEADER_LENGTH: usize = 8;
const OFP_INSTRUCTION_EXPERIMENTER_HEADER_LENGTH: usize = 8;

pub const OFPIT_GOTO_TABLE: u16 = 1;
pub const OFPIT_WRITE_METADATA: u16 = 2;
pub const OFPIT_WRITE_ACTIONS: u16 = 3;
pub const OFPIT_APPLY_ACTIONS: u16 = 4;
pub const OFPIT_CLEAR_ACTIONS: u16 = 5;
pub const OFPIT_METER: u16 = 6;
pub const OFPIT_EXPERIMENTER: u16 = 0xffff;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstructionType {
    GotoTable,
    WriteMetadata,
    WriteActions,
    ApplyActions,
    ClearActions,
    Meter,
    Experimenter,
    Unknown(u16),
}

impl InstructionType {
    pub fn code(self) -> u16 {
        match self {
            InstructionType::GotoTable => OFPIT_GOTO_TABLE,
            InstructionType::WriteMetadata => OFPIT_WRITE_METADATA,
            InstructionType::WriteActions => OFPIT_WRITE_ACTIONS,
            InstructionType::ApplyActions => OFPIT_APPLY_ACTIONS,
            InstructionType::ClearActions => OFPIT_CLEAR_ACTIONS,
            InstructionType::Meter => OFPIT_METER,
            InstructionType::Experimenter => OFPIT_EXPERIMENTER,
            InstructionType::Unknown(code) => code,
        }
    }

    /// Types not defined for `version` come back as `Unknown`.
    pub fn from_code(version: OfpVersion, code: u16) -> InstructionType {
        let typ = match code {
            OFPIT_GOTO_TABLE => InstructionType::GotoTable,
            OFPIT_WRITE_METADATA => InstructionType::WriteMetadata,
            OFPIT_WRITE_ACTIONS => InstructionType::WriteActions,
            OFPIT_APPLY_ACTIONS => InstructionType::ApplyActions,
            OFPIT_CLEAR_ACTIONS => InstructionType::ClearActions,
            OFPIT_METER => InstructionType::Meter,
            OFPIT_EXPERIMENTER => InstructionType::Experimenter,
            c => InstructionType::Unknown(c),
        };
        if typ.supported_in(version) {
            typ
        } else {
            InstructionType::Unknown(code)
        }
    }

    pub fn supported_in(self, version: OfpVersion) -> bool {
        match self {
            InstructionType::Meter => version == OfpVersion::Of13,
            _ => version.is_oxm(),
        }
    }

    fn fixed_length(self) -> Option<usize> {
        match self {
            InstructionType::GotoTable | InstructionType::Meter => Some(8),
            InstructionType::WriteMetadata => Some(24),
            _ => None,
        }
    }

    fn min_length(self) -> usize {
        match self {
            InstructionType::Unknown(_) => OFP_INSTRUCTION_HEADER_LENGTH,
            t => t.fixed_length().unwrap_or(OFP_INSTRUCTION_ACTIONS_HEADER_LENGTH),
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            InstructionType::GotoTable => write!(f, "goto_table"),
            InstructionType::WriteMetadata => write!(f, "write_metadata"),
            InstructionType::WriteActions => write!(f, "write_actions"),
            InstructionType::ApplyActions => write!(f, "apply_actions"),
            InstructionType::ClearActions => write!(f, "clear_actions"),
            InstructionType::Meter => write!(f, "meter"),
            InstructionType::Experimenter => write!(f, "experimenter"),
            InstructionType::Unknown(c) => write!(f, "instruction({})", c),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionBody {
    GotoTable(u8),
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(ActionList),
    ApplyActions(ActionList),
    /// Carries an action array on the wire even though it should be empty.
    ClearActions(ActionList),
    Meter(u32),
    Experimenter { experimenter: u32, body: Vec<u8> },
    Unknown { type_code: u16, body: Vec<u8> },
}

impl InstructionBody {
    pub fn instruction_type(&self) -> InstructionType {
        match *self {
            InstructionBody::GotoTable(_) => InstructionType::GotoTable,
            InstructionBody::WriteMetadata { .. } => InstructionType::WriteMetadata,
            InstructionBody::WriteActions(_) => InstructionType::WriteActions,
            InstructionBody::ApplyActions(_) => InstructionType::ApplyActions,
            InstructionBody::ClearActions(_) => InstructionType::ClearActions,
            InstructionBody::Meter(_) => InstructionType::Meter,
            InstructionBody::Experimenter { .. } => InstructionType::Experimenter,
            InstructionBody::Unknown { type_code, .. } => InstructionType::Unknown(type_code),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    version: OfpVersion,
    body: InstructionBody,
}

impl Instruction {
    pub fn new(version: OfpVersion, body: InstructionBody) -> Result<Instruction> {
        let mut inst = Instruction { version, body };
        inst.check_version()?;
        // nested actions follow the instruction's version
        inst.set_version(version);
        Ok(inst)
    }

    pub fn goto_table(version: OfpVersion, table_id: u8) -> Result<Instruction> {
        Instruction::new(version, InstructionBody::GotoTable(table_id))
    }

    pub fn apply_actions(version: OfpVersion, actions: ActionList) -> Result<Instruction> {
        Instruction::new(version, InstructionBody::ApplyActions(actions))
    }

    pub fn write_actions(version: OfpVersion, actions: ActionList) -> Result<Instruction> {
        Instruction::new(version, InstructionBody::WriteActions(actions))
    }

    fn check_version(&self) -> Result<()> {
        let typ = self.instruction_type();
        if typ.supported_in(self.version) {
            Ok(())
        } else {
            Err(OfpError::bad_version(self.version, format!("instruction {}", typ)))
        }
    }

    pub fn body(&self) -> &InstructionBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut InstructionBody {
        &mut self.body
    }

    pub fn instruction_type(&self) -> InstructionType {
        self.body.instruction_type()
    }

    pub fn type_code(&self) -> u16 {
        self.instruction_type().code()
    }

    /// The nested action array of write/apply/clear actions.
    pub fn actions(&self) -> Option<&ActionList> {
        match self.body {
            InstructionBody::WriteActions(ref a)
            | InstructionBody::ApplyActions(ref a)
            | InstructionBody::ClearActions(ref a) => Some(a),
            _ => None,
        }
    }

    pub fn actions_mut(&mut self) -> Option<&mut ActionList> {
        match self.body {
            InstructionBody::WriteActions(ref mut a)
            | InstructionBody::ApplyActions(ref mut a)
            | InstructionBody::ClearActions(ref mut a) => Some(a),
            _ => None,
        }
    }

    /// Decode the instruction at the front of `buf`.
    pub fn parse(version: OfpVersion, buf: &[u8]) -> Result<Instruction> {
        if !version.is_oxm() {
            return Err(OfpError::bad_version(version, "instructions"));
        }
        if buf.len() < OFP_INSTRUCTION_HEADER_LENGTH {
            return Err(OfpError::bad_length(
                "instruction header",
                buf.len(),
                OFP_INSTRUCTION_HEADER_LENGTH,
            ));
        }
        let mut bytes = Cursor::new(buf);
        let code = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len > buf.len() {
            return Err(OfpError::bad_length("instruction", len, buf.len()));
        }
        let typ = InstructionType::from_code(version, code);
        if let Some(fixed) = typ.fixed_length() {
            if len != fixed {
                return Err(OfpError::bad_length("instruction", len, fixed));
            }
        } else if len < typ.min_length() {
            return Err(OfpError::bad_length("instruction", len, typ.min_length()));
        }

        let body = match typ {
            InstructionType::GotoTable => InstructionBody::GotoTable(bytes.read_u8()?),
            InstructionType::WriteMetadata => {
                bytes.read_u32::<BigEndian>()?;
                InstructionBody::WriteMetadata {
                    metadata: bytes.read_u64::<BigEndian>()?,
                    mask: bytes.read_u64::<BigEndian>()?,
                }
            }
            InstructionType::WriteActions
            | InstructionType::ApplyActions
            | InstructionType::ClearActions => {
                let mut actions = ActionList::new(version);
                let raw = &buf[OFP_INSTRUCTION_ACTIONS_HEADER_LENGTH..len];
                actions.unpack(raw)?;
                if actions.length() != raw.len() {
                    return Err(OfpError::bad_length(
                        "instruction actions",
                        raw.len(),
                        actions.length(),
                    ));
                }
                match typ {
                    InstructionType::WriteActions => InstructionBody::WriteActions(actions),
                    InstructionType::ApplyActions => InstructionBody::ApplyActions(actions),
                    _ => InstructionBody::ClearActions(actions),
                }
            }
            InstructionType::Meter => InstructionBody::Meter(bytes.read_u32::<BigEndian>()?),
            InstructionType::Experimenter => InstructionBody::Experimenter {
                experimenter: bytes.read_u32::<BigEndian>()?,
                body: buf[OFP_INSTRUCTION_EXPERIMENTER_HEADER_LENGTH..len].to_vec(),
            },
            InstructionType::Unknown(_) => {
                warn!(
                    "unknown instruction type {} for OpenFlow {}, keeping {} opaque bytes",
                    code, version, len
                );
                InstructionBody::Unknown {
                    type_code: code,
                    body: buf[OFP_INSTRUCTION_HEADER_LENGTH..len].to_vec(),
                }
            }
        };
        Ok(Instruction { version, body })
    }
}

impl Versioned for Instruction {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        if let Some(actions) = self.actions_mut() {
            actions.set_version(version);
        }
    }
}

impl OfpWire for Instruction {
    fn length(&self) -> usize {
        match self.body {
            InstructionBody::GotoTable(_) | InstructionBody::Meter(_) => 8,
            InstructionBody::WriteMetadata { .. } => 24,
            InstructionBody::WriteActions(ref a)
            | InstructionBody::ApplyActions(ref a)
            | InstructionBody::ClearActions(ref a) => {
                OFP_INSTRUCTION_ACTIONS_HEADER_LENGTH + a.length()
            }
            InstructionBody::Experimenter { ref body, .. } => {
                OFP_INSTRUCTION_EXPERIMENTER_HEADER_LENGTH + body.len()
            }
            InstructionBody::Unknown { ref body, .. } => {
                OFP_INSTRUCTION_HEADER_LENGTH + body.len()
            }
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        self.check_version()?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("instruction", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(self.type_code())?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        match self.body {
            InstructionBody::GotoTable(table_id) => {
                bytes.write_u8(table_id)?;
                write_padding_bytes(bytes, 3);
            }
            InstructionBody::WriteMetadata { metadata, mask } => {
                write_padding_bytes(bytes, 4);
                bytes.write_u64::<BigEndian>(metadata)?;
                bytes.write_u64::<BigEndian>(mask)?;
            }
            InstructionBody::WriteActions(ref a)
            | InstructionBody::ApplyActions(ref a)
            | InstructionBody::ClearActions(ref a) => {
                write_padding_bytes(bytes, 4);
                a.marshal(bytes)?;
            }
            InstructionBody::Meter(meter_id) => bytes.write_u32::<BigEndian>(meter_id)?,
            InstructionBody::Experimenter {
                experimenter,
                ref body,
            } => {
                bytes.write_u32::<BigEndian>(experimenter)?;
                bytes.extend_from_slice(body);
            }
            InstructionBody::Unknown { ref body, .. } => bytes.extend_from_slice(body),
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        *self = Instruction::parse(self.version, buf)?;
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.instruction_type())?;
        match self.body {
            InstructionBody::GotoTable(t) => write!(f, "({})", t),
            InstructionBody::WriteMetadata { metadata, mask } => {
                write!(f, "(0x{:016x}/0x{:016x})", metadata, mask)
            }
            InstructionBody::WriteActions(ref a)
            | InstructionBody::ApplyActions(ref a)
            | InstructionBody::ClearActions(ref a) => write!(f, "{}", a),
            InstructionBody::Meter(m) => write!(f, "({})", m),
            InstructionBody::Experimenter {
                experimenter,
                ref body,
            } => write!(f, "(id=0x{:08x}, {} byte(s))", experimenter, body.len()),
            InstructionBody::Unknown { ref body, .. } => write!(f, "({} byte(s))", body.len()),
        }
    }
}

/// The instruction set of a flow entry: at most one instruction per type,
/// packed in ascending type code order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstructionList {
    version: OfpVersion,
    instructions: BTreeMap<u16, Instruction>,
}

impl InstructionList {
    pub fn new(version: OfpVersion) -> InstructionList {
        InstructionList {
            version,
            instructions: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn clear(&mut self) {
        self.instructions.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.values()
    }

    /// Add an instruction, replacing any instruction of the same type.
    pub fn add(&mut self, body: InstructionBody) -> Result<&mut Instruction> {
        let inst = Instruction::new(self.version, body)?;
        Ok(self.insert(inst))
    }

    fn insert(&mut self, inst: Instruction) -> &mut Instruction {
        let code = inst.type_code();
        match self.instructions.entry(code) {
            Entry::Occupied(mut e) => {
                debug!("instruction type {} replaced", code);
                e.insert(inst);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(inst),
        }
    }

    pub fn has(&self, typ: InstructionType) -> bool {
        self.instructions.contains_key(&typ.code())
    }

    pub fn get(&self, typ: InstructionType) -> Result<&Instruction> {
        self.instructions
            .get(&typ.code())
            .ok_or_else(|| OfpError::NotFound(format!("instruction {}", typ)))
    }

    pub fn get_mut(&mut self, typ: InstructionType) -> Result<&mut Instruction> {
        self.instructions
            .get_mut(&typ.code())
            .ok_or_else(|| OfpError::NotFound(format!("instruction {}", typ)))
    }

    pub fn remove(&mut self, typ: InstructionType) -> Result<Instruction> {
        self.instructions
            .remove(&typ.code())
            .ok_or_else(|| OfpError::NotFound(format!("instruction {}", typ)))
    }

    /// Action array of a write/apply/clear actions instruction, added empty
    /// when missing.
    pub fn actions_mut(&mut self, typ: InstructionType) -> Result<&mut ActionList> {
        let version = self.version;
        if !self.has(typ) {
            let body = match typ {
                InstructionType::WriteActions => InstructionBody::WriteActions(ActionList::new(version)),
                InstructionType::ApplyActions => InstructionBody::ApplyActions(ActionList::new(version)),
                InstructionType::ClearActions => InstructionBody::ClearActions(ActionList::new(version)),
                _ => {
                    return Err(OfpError::NotFound(format!(
                        "action array in instruction {}",
                        typ
                    )))
                }
            };
            self.add(body)?;
        }
        self.get_mut(typ)?
            .actions_mut()
            .ok_or_else(|| OfpError::NotFound(format!("action array in instruction {}", typ)))
    }
}

impl Versioned for InstructionList {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for inst in self.instructions.values_mut() {
            inst.set_version(version);
        }
    }
}

impl OfpWire for InstructionList {
    fn length(&self) -> usize {
        self.instructions.values().map(|i| i.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for inst in self.instructions.values() {
            inst.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.instructions.clear();
        if buf.len() < OFP_INSTRUCTION_HEADER_LENGTH {
            return Ok(());
        }
        let mut offset = 0;
        while offset < buf.len() {
            let inst = Instruction::parse(self.version, &buf[offset..])?;
            offset += inst.length();
            self.insert(inst);
        }
        debug!(
            "unpacked {} instruction(s) from {} byte(s)",
            self.instructions.len(),
            buf.len()
        );
        Ok(())
    }
}

impl fmt::Display for InstructionList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, inst) in self.instructions.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", inst)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionBody;

    #[test]
    fn goto_table_bytes() {
        let i = Instruction::goto_table(OfpVersion::Of13, 2).unwrap();
        assert_eq!(i.to_bytes().unwrap(), vec![0, 1, 0, 8, 2, 0, 0, 0]);
    }

    #[test]
    fn no_instructions_in_of10() {
        assert!(matches!(
            Instruction::goto_table(OfpVersion::Of10, 1),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(matches!(
            Instruction::new(OfpVersion::Of12, InstructionBody::Meter(1)),
            Err(OfpError::BadVersion { .. })
        ));
    }

    #[test]
    fn duplicate_type_keeps_last() {
        let bytes = [0, 1, 0, 8, 1, 0, 0, 0, 0, 1, 0, 8, 5, 0, 0, 0];
        let mut list = InstructionList::new(OfpVersion::Of13);
        list.unpack(&bytes).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(
            list.get(InstructionType::GotoTable).unwrap().body(),
            &InstructionBody::GotoTable(5)
        );
    }

    #[test]
    fn packs_in_type_order() {
        let mut list = InstructionList::new(OfpVersion::Of13);
        list.add(InstructionBody::GotoTable(3)).unwrap();
        list.actions_mut(InstructionType::ApplyActions)
            .unwrap()
            .append(ActionBody::Output { port: 2, max_len: 0 })
            .unwrap();
        list.add(InstructionBody::WriteMetadata {
            metadata: 0xabcd,
            mask: 0xffff,
        })
        .unwrap();
        list.add(InstructionBody::Meter(9)).unwrap();
        assert_eq!(list.length(), 8 + 24 + 8 + 16 + 8);

        let bytes = list.to_bytes().unwrap();
        assert_eq!(bytes.len(), list.length());
        let codes: Vec<u8> = vec![bytes[1], bytes[9], bytes[33], bytes[57]];
        assert_eq!(codes, vec![1, 2, 4, 6]);

        let mut back = InstructionList::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, list);
        assert_eq!(
            back.get(InstructionType::ApplyActions)
                .unwrap()
                .actions()
                .unwrap()
                .output_ports(),
            vec![2]
        );
    }

    #[test]
    fn meter_code_is_unknown_in_of12() {
        let bytes = [0, 6, 0, 8, 0, 0, 0, 9];
        let i = Instruction::parse(OfpVersion::Of12, &bytes).unwrap();
        assert_eq!(i.instruction_type(), InstructionType::Unknown(6));
        assert_eq!(i.to_bytes().unwrap(), bytes.to_vec());
    }

    #[test]
    fn malformed_lengths() {
        let mut list = InstructionList::new(OfpVersion::Of13);
        assert!(matches!(
            list.unpack(&[0, 1, 0, 0, 0, 0, 0, 0]),
            Err(OfpError::BadLength { .. })
        ));
        assert!(matches!(
            list.unpack(&[0, 2, 0, 8, 0, 0, 0, 0]),
            Err(OfpError::BadLength { .. })
        ));
        // nested action array with a stray 4 byte tail
        assert!(matches!(
            list.unpack(&[0, 4, 0, 12, 0, 0, 0, 0, 0, 18, 0, 8]),
            Err(OfpError::BadLength { .. })
        ));
        list.unpack(&[0, 4]).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn missing_instruction() {
        let list = InstructionList::new(OfpVersion::Of12);
        assert!(list.get(InstructionType::Meter).unwrap_err().is_not_found());
    }
}
