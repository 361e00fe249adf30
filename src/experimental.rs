//! GTP tunnel push/pop, carried as experimenter actions.
//!
//! The experimenter body starts with `{exptype: u16, explen: u16}` followed by
//! an ethertype, and is zero padded so the whole action stays 8 byte aligned.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::action::{Action, ActionBody};
use crate::bits::{padding_for, write_padding_bytes};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;

pub const GTP_EXPERIMENTER_ID: u32 = 0x5555_a781;

/// `{exptype, explen, ethertype}`
const GTP_BODY_LENGTH: usize = 6;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GtpActionType {
    PushGtp = 0,
    PopGtp = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GtpAction {
    pub exp_type: GtpActionType,
    pub ethertype: u16,
}

impl GtpAction {
    pub fn push(ethertype: u16) -> GtpAction {
        GtpAction {
            exp_type: GtpActionType::PushGtp,
            ethertype,
        }
    }

    pub fn pop(ethertype: u16) -> GtpAction {
        GtpAction {
            exp_type: GtpActionType::PopGtp,
            ethertype,
        }
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(8);
        body.write_u16::<BigEndian>(self.exp_type as u16)?;
        body.write_u16::<BigEndian>(GTP_BODY_LENGTH as u16)?;
        body.write_u16::<BigEndian>(self.ethertype)?;
        // the 8 byte experimenter header is already aligned
        write_padding_bytes(&mut body, padding_for(GTP_BODY_LENGTH));
        Ok(body)
    }

    /// Wrap into an experimenter (1.2+) or vendor (1.0) action.
    pub fn to_action(&self, version: OfpVersion) -> Result<Action> {
        let body = self.body()?;
        let action = match version {
            OfpVersion::Of10 => ActionBody::Vendor {
                vendor: GTP_EXPERIMENTER_ID,
                body,
            },
            _ => ActionBody::Experimenter {
                experimenter: GTP_EXPERIMENTER_ID,
                body,
            },
        };
        Action::new(version, action)
    }

    /// Decode the GTP sub-header of an experimenter or vendor action.
    pub fn from_action(action: &Action) -> Result<GtpAction> {
        let body = match *action.body() {
            ActionBody::Experimenter {
                experimenter: GTP_EXPERIMENTER_ID,
                ref body,
            }
            | ActionBody::Vendor {
                vendor: GTP_EXPERIMENTER_ID,
                ref body,
            } => body,
            _ => return Err(OfpError::NotFound("gtp experimenter action".to_string())),
        };
        if body.len() < GTP_BODY_LENGTH {
            return Err(OfpError::bad_length("gtp action body", body.len(), GTP_BODY_LENGTH));
        }
        let mut bytes = Cursor::new(&body[..]);
        let exp_type = match bytes.read_u16::<BigEndian>()? {
            0 => GtpActionType::PushGtp,
            1 => GtpActionType::PopGtp,
            t => return Err(OfpError::NotFound(format!("gtp action type {}", t))),
        };
        let explen = bytes.read_u16::<BigEndian>()? as usize;
        if explen < GTP_BODY_LENGTH || explen > body.len() {
            return Err(OfpError::bad_length("gtp action", explen, GTP_BODY_LENGTH));
        }
        Ok(GtpAction {
            exp_type,
            ethertype: bytes.read_u16::<BigEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofp_wire::OfpWire;

    #[test]
    fn push_gtp_layout() {
        let a = GtpAction::push(0x0800).to_action(OfpVersion::Of13).unwrap();
        assert_eq!(a.length(), 16);
        assert_eq!(
            a.to_bytes().unwrap(),
            vec![0xff, 0xff, 0, 16, 0x55, 0x55, 0xa7, 0x81, 0, 0, 0, 6, 0x08, 0x00, 0, 0]
        );
    }

    #[test]
    fn decode_from_wire() {
        let bytes = GtpAction::pop(0x86dd)
            .to_action(OfpVersion::Of12)
            .unwrap()
            .to_bytes()
            .unwrap();
        let a = Action::parse(OfpVersion::Of12, &bytes).unwrap();
        assert_eq!(GtpAction::from_action(&a).unwrap(), GtpAction::pop(0x86dd));
    }

    #[test]
    fn other_experimenters_are_not_gtp() {
        let a = Action::new(
            OfpVersion::Of13,
            ActionBody::Experimenter {
                experimenter: 0x2320,
                body: vec![0; 8],
            },
        )
        .unwrap();
        assert!(GtpAction::from_action(&a).unwrap_err().is_not_found());
        let out = Action::output(OfpVersion::Of13, 1, 0).unwrap();
        assert!(GtpAction::from_action(&out).is_err());
    }
}
