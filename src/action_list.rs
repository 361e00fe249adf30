use std::fmt;

use log::debug;

use crate::action::{Action, ActionBody, ActionType, OFP_ACTION_HEADER_LENGTH};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

/// An ordered action array. Order is wire order and execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionList {
    version: OfpVersion,
    actions: Vec<Action>,
}

impl ActionList {
    pub fn new(version: OfpVersion) -> ActionList {
        ActionList {
            version,
            actions: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<Action> {
        self.actions.iter()
    }

    fn out_of_range(&self, index: usize) -> OfpError {
        OfpError::OutOfRange {
            index,
            len: self.actions.len(),
        }
    }

    /// Append a new action. The list is left untouched when the action does
    /// not exist in the list's version.
    pub fn append(&mut self, body: ActionBody) -> Result<&mut Action> {
        let action = Action::new(self.version, body)?;
        self.actions.push(action);
        let last = self.actions.len() - 1;
        Ok(&mut self.actions[last])
    }

    /// Insert before `index`; `index == len()` appends.
    pub fn insert(&mut self, index: usize, body: ActionBody) -> Result<&mut Action> {
        if index > self.actions.len() {
            return Err(self.out_of_range(index));
        }
        let action = Action::new(self.version, body)?;
        self.actions.insert(index, action);
        Ok(&mut self.actions[index])
    }

    pub fn get(&self, index: usize) -> Result<&Action> {
        match self.actions.get(index) {
            Some(a) => Ok(a),
            None => Err(self.out_of_range(index)),
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Action> {
        let len = self.actions.len();
        self.actions
            .get_mut(index)
            .ok_or(OfpError::OutOfRange { index, len })
    }

    pub fn front(&self) -> Result<&Action> {
        self.get(0)
    }

    pub fn back(&self) -> Result<&Action> {
        match self.actions.last() {
            Some(a) => Ok(a),
            None => Err(self.out_of_range(0)),
        }
    }

    pub fn remove(&mut self, index: usize) -> Result<Action> {
        if index >= self.actions.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.actions.remove(index))
    }

    /// First action of the given kind.
    pub fn find_action(&self, typ: ActionType) -> Result<&Action> {
        self.actions
            .iter()
            .find(|a| a.action_type() == typ)
            .ok_or_else(|| OfpError::NotFound(format!("action {}", typ)))
    }

    pub fn count_action_type(&self, typ: ActionType) -> usize {
        self.actions.iter().filter(|a| a.action_type() == typ).count()
    }

    /// Number of output actions towards `port`; port 0 counts every output.
    pub fn count_output(&self, port: u32) -> usize {
        self.actions
            .iter()
            .filter_map(|a| a.output_port())
            .filter(|p| port == 0 || *p == port)
            .count()
    }

    /// Ports of all output actions, in list order.
    pub fn output_ports(&self) -> Vec<u32> {
        self.actions.iter().filter_map(|a| a.output_port()).collect()
    }
}

impl Versioned for ActionList {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for a in &mut self.actions {
            a.set_version(version);
        }
    }
}

impl OfpWire for ActionList {
    fn length(&self) -> usize {
        self.actions.iter().map(|a| a.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for a in &self.actions {
            a.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.actions.clear();
        if buf.len() < OFP_ACTION_HEADER_LENGTH {
            return Ok(());
        }
        let mut offset = 0;
        while offset < buf.len() {
            let action = Action::parse(self.version, &buf[offset..])?;
            offset += action.length();
            self.actions.push(action);
        }
        debug!(
            "unpacked {} action(s) from {} byte(s) for OpenFlow {}",
            self.actions.len(),
            buf.len(),
            self.version
        );
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ActionList {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl fmt::Display for ActionList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, a) in self.actions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", a)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{OFPP_CONTROLLER, OFPP_FLOOD};

    #[test]
    fn single_output_of10() {
        let mut list = ActionList::new(OfpVersion::Of10);
        list.append(ActionBody::Output { port: 6, max_len: 0 }).unwrap();
        assert_eq!(list.length(), 8);
        let mut buf = [0xaa; 8];
        assert_eq!(list.pack(&mut buf).unwrap(), 8);
        assert_eq!(buf, [0, 0, 0, 8, 0, 6, 0, 0]);

        let mut back = ActionList::new(OfpVersion::Of10);
        back.unpack(&buf).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.front().unwrap().output_port(), Some(6));
    }

    #[test]
    fn pack_needs_room() {
        let mut list = ActionList::new(OfpVersion::Of13);
        list.append(ActionBody::Output { port: 1, max_len: 0 }).unwrap();
        let mut buf = [0; 8];
        assert!(matches!(
            list.pack(&mut buf),
            Err(OfpError::BufferTooSmall {
                needed: 16,
                available: 8
            })
        ));
    }

    #[test]
    fn wrong_version_append_leaves_list_alone() {
        let mut list = ActionList::new(OfpVersion::Of12);
        list.append(ActionBody::PopVlan).unwrap();
        assert!(matches!(
            list.append(ActionBody::SetVlanVid(100)),
            Err(OfpError::BadVersion { .. })
        ));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn tolerant_and_strict_unpack() {
        let mut list = ActionList::new(OfpVersion::Of13);
        list.unpack(&[]).unwrap();
        assert!(list.is_empty());
        list.unpack(&[0, 0, 0]).unwrap();
        assert!(list.is_empty());

        // zero declared length must not loop
        assert!(matches!(
            list.unpack(&[0, 18, 0, 0, 0, 0, 0, 0]),
            Err(OfpError::BadLength { .. })
        ));
        // second action runs past the buffer
        assert!(matches!(
            list.unpack(&[0, 18, 0, 8, 0, 0, 0, 0, 0, 18, 0, 16, 0, 0, 0, 0]),
            Err(OfpError::BadLength { .. })
        ));
        // trailing bytes shorter than a header
        assert!(matches!(
            list.unpack(&[0, 18, 0, 8, 0, 0, 0, 0, 0, 18]),
            Err(OfpError::BadLength { .. })
        ));
    }

    #[test]
    fn queries() {
        let mut list = ActionList::new(OfpVersion::Of13);
        list.append(ActionBody::PushVlan(0x8100)).unwrap();
        list.append(ActionBody::Output { port: 3, max_len: 0 }).unwrap();
        list.append(ActionBody::Output {
            port: OFPP_CONTROLLER,
            max_len: 128,
        })
        .unwrap();
        list.insert(0, ActionBody::Output { port: 3, max_len: 0 }).unwrap();

        assert_eq!(list.count_output(0), 3);
        assert_eq!(list.count_output(3), 2);
        assert_eq!(list.count_output(OFPP_FLOOD), 0);
        assert_eq!(list.output_ports(), vec![3, 3, OFPP_CONTROLLER]);
        assert_eq!(list.count_action_type(ActionType::PushVlan), 1);
        assert_eq!(
            list.find_action(ActionType::PushVlan).unwrap().body(),
            &ActionBody::PushVlan(0x8100)
        );
        assert!(list
            .find_action(ActionType::Group)
            .unwrap_err()
            .is_not_found());
        assert_eq!(list.back().unwrap().output_port(), Some(OFPP_CONTROLLER));

        assert!(matches!(
            list.get(9),
            Err(OfpError::OutOfRange { index: 9, len: 4 })
        ));
        assert!(list.insert(9, ActionBody::PopVlan).is_err());
        list.remove(0).unwrap();
        assert_eq!(list.len(), 3);

        let bytes = list.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8 + 16 + 16);
        let mut back = ActionList::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn short_experimenter_body_keeps_alignment() {
        let mut list = ActionList::new(OfpVersion::Of13);
        list.append(ActionBody::Experimenter {
            experimenter: 7,
            body: vec![1, 2, 3],
        })
        .unwrap();
        list.append(ActionBody::Output { port: 2, max_len: 0 }).unwrap();
        assert_eq!(list.length(), 16 + 16);

        let bytes = list.to_bytes().unwrap();
        assert_eq!(bytes.len(), 32);
        let mut back = ActionList::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.output_ports(), vec![2]);
    }

    #[test]
    fn empty_list_access() {
        let list = ActionList::new(OfpVersion::Of10);
        assert!(matches!(list.front(), Err(OfpError::OutOfRange { .. })));
        assert!(matches!(list.back(), Err(OfpError::OutOfRange { .. })));
    }

    #[test]
    fn set_version_propagates() {
        let mut list = ActionList::new(OfpVersion::Of12);
        list.append(ActionBody::Output { port: 1, max_len: 0 }).unwrap();
        assert_eq!(list.length(), 16);
        list.set_version(OfpVersion::Of10);
        assert_eq!(list.front().unwrap().version(), OfpVersion::Of10);
        assert_eq!(list.length(), 8);
    }
}
