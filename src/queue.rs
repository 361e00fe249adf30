use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::bits::{pad_to_8, write_padding_bytes};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFPQT_NONE: u16 = 0;
pub const OFPQT_MIN_RATE: u16 = 1;
pub const OFPQT_MAX_RATE: u16 = 2;
pub const OFPQT_EXPERIMENTER: u16 = 0xffff;

/// Rate value meaning "not configured".
pub const OFPQ_RATE_UNCFG: u16 = 0xffff;

pub const OFP_QUEUE_PROP_HEADER_LENGTH: usize = 8;
const OFP_QUEUE_PROP_RATE_LENGTH: usize = 16;
const OFP_QUEUE_PROP_EXPERIMENTER_LENGTH: usize = 16;
const OFP10_PACKET_QUEUE_LENGTH: usize = 8;
const OFP12_PACKET_QUEUE_LENGTH: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueuePropBody {
    /// Guaranteed rate in 1/10 of a percent; above 1000 is disabled.
    MinRate(u16),
    MaxRate(u16),
    Experimenter { experimenter: u32, data: Vec<u8> },
}

impl QueuePropBody {
    pub fn prop_type(&self) -> u16 {
        match *self {
            QueuePropBody::MinRate(_) => OFPQT_MIN_RATE,
            QueuePropBody::MaxRate(_) => OFPQT_MAX_RATE,
            QueuePropBody::Experimenter { .. } => OFPQT_EXPERIMENTER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueProp {
    version: OfpVersion,
    pub body: QueuePropBody,
}

impl QueueProp {
    /// Fails with `BadVersion` for max rate and experimenter properties in 1.0.
    pub fn new(version: OfpVersion, body: QueuePropBody) -> Result<QueueProp> {
        let prop = QueueProp { version, body };
        prop.check_version()?;
        Ok(prop)
    }

    fn check_version(&self) -> Result<()> {
        match self.version.check_known("queue property")? {
            OfpVersion::Of10 if self.prop_type() != OFPQT_MIN_RATE => Err(OfpError::bad_version(
                self.version,
                format!("queue property {}", self.prop_type()),
            )),
            _ => Ok(()),
        }
    }

    pub fn prop_type(&self) -> u16 {
        self.body.prop_type()
    }

    /// Decode the property at the front of `buf`. `OFPQT_NONE` yields `None`.
    pub fn parse(version: OfpVersion, buf: &[u8]) -> Result<(usize, Option<QueueProp>)> {
        version.check_known("queue property")?;
        if buf.len() < OFP_QUEUE_PROP_HEADER_LENGTH {
            return Err(OfpError::bad_length(
                "queue property header",
                buf.len(),
                OFP_QUEUE_PROP_HEADER_LENGTH,
            ));
        }
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < OFP_QUEUE_PROP_HEADER_LENGTH || len > buf.len() || len % 8 != 0 {
            return Err(OfpError::bad_length("queue property", len, buf.len()));
        }
        bytes.set_position(OFP_QUEUE_PROP_HEADER_LENGTH as u64);
        let body = match typ {
            OFPQT_NONE => return Ok((len, None)),
            OFPQT_MIN_RATE | OFPQT_MAX_RATE if len != OFP_QUEUE_PROP_RATE_LENGTH => {
                return Err(OfpError::bad_length("queue rate property", len, OFP_QUEUE_PROP_RATE_LENGTH));
            }
            OFPQT_MIN_RATE => QueuePropBody::MinRate(bytes.read_u16::<BigEndian>()?),
            OFPQT_MAX_RATE => QueuePropBody::MaxRate(bytes.read_u16::<BigEndian>()?),
            OFPQT_EXPERIMENTER if len < OFP_QUEUE_PROP_EXPERIMENTER_LENGTH => {
                return Err(OfpError::bad_length(
                    "queue experimenter property",
                    len,
                    OFP_QUEUE_PROP_EXPERIMENTER_LENGTH,
                ));
            }
            OFPQT_EXPERIMENTER => QueuePropBody::Experimenter {
                experimenter: bytes.read_u32::<BigEndian>()?,
                data: buf[OFP_QUEUE_PROP_EXPERIMENTER_LENGTH..len].to_vec(),
            },
            t => return Err(OfpError::NotFound(format!("queue property type {}", t))),
        };
        QueueProp::new(version, body).map(|p| (len, Some(p)))
    }
}

impl Versioned for QueueProp {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for QueueProp {
    fn length(&self) -> usize {
        match self.body {
            QueuePropBody::MinRate(_) | QueuePropBody::MaxRate(_) => OFP_QUEUE_PROP_RATE_LENGTH,
            QueuePropBody::Experimenter { ref data, .. } => {
                pad_to_8(OFP_QUEUE_PROP_EXPERIMENTER_LENGTH + data.len())
            }
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        self.check_version()?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("queue property", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(self.prop_type())?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        write_padding_bytes(bytes, 4);
        match self.body {
            QueuePropBody::MinRate(rate) | QueuePropBody::MaxRate(rate) => {
                bytes.write_u16::<BigEndian>(rate)?;
                write_padding_bytes(bytes, 6);
            }
            QueuePropBody::Experimenter {
                experimenter,
                ref data,
            } => {
                bytes.write_u32::<BigEndian>(experimenter)?;
                write_padding_bytes(bytes, 4);
                bytes.extend_from_slice(data);
                write_padding_bytes(bytes, len - OFP_QUEUE_PROP_EXPERIMENTER_LENGTH - data.len());
            }
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        match QueueProp::parse(self.version, buf)? {
            (_, Some(prop)) => {
                *self = prop;
                Ok(())
            }
            (_, None) => Err(OfpError::NotFound("queue property (OFPQT_NONE)".to_string())),
        }
    }
}

/// Properties of a queue, at most one per property type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuePropList {
    version: OfpVersion,
    props: BTreeMap<u16, QueueProp>,
}

impl QueuePropList {
    pub fn new(version: OfpVersion) -> QueuePropList {
        QueuePropList {
            version,
            props: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueProp> {
        self.props.values()
    }

    /// Add a property, replacing one of the same type.
    pub fn add(&mut self, body: QueuePropBody) -> Result<&mut QueueProp> {
        let prop = QueueProp::new(self.version, body)?;
        Ok(self.insert(prop))
    }

    fn insert(&mut self, prop: QueueProp) -> &mut QueueProp {
        match self.props.entry(prop.prop_type()) {
            Entry::Occupied(mut e) => {
                e.insert(prop);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(prop),
        }
    }

    pub fn get(&self, prop_type: u16) -> Result<&QueueProp> {
        self.props
            .get(&prop_type)
            .ok_or_else(|| OfpError::NotFound(format!("queue property type {}", prop_type)))
    }

    pub fn remove(&mut self, prop_type: u16) -> Option<QueueProp> {
        self.props.remove(&prop_type)
    }

    /// Configured minimum rate, if any.
    pub fn min_rate(&self) -> Option<u16> {
        match self.props.get(&OFPQT_MIN_RATE).map(|p| &p.body) {
            Some(QueuePropBody::MinRate(rate)) => Some(*rate),
            _ => None,
        }
    }

    pub fn max_rate(&self) -> Option<u16> {
        match self.props.get(&OFPQT_MAX_RATE).map(|p| &p.body) {
            Some(QueuePropBody::MaxRate(rate)) => Some(*rate),
            _ => None,
        }
    }
}

impl Versioned for QueuePropList {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for prop in self.props.values_mut() {
            prop.set_version(version);
        }
    }
}

impl OfpWire for QueuePropList {
    fn length(&self) -> usize {
        self.props.values().map(|p| p.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for prop in self.props.values() {
            prop.marshal(bytes)?;
        }
        Ok(())
    }

    /// Consumes the whole buffer; `OFPQT_NONE` entries are skipped.
    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.props.clear();
        let mut offset = 0;
        while offset < buf.len() {
            let (len, prop) = QueueProp::parse(self.version, &buf[offset..])?;
            offset += len;
            match prop {
                Some(p) => {
                    self.insert(p);
                }
                None => debug!("skipping empty queue property"),
            }
        }
        Ok(())
    }
}

/// A queue and its properties, as carried in a queue config reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketQueue {
    version: OfpVersion,
    pub queue_id: u32,
    /// Not on the wire in 1.0.
    pub port: u32,
    pub properties: QueuePropList,
}

impl PacketQueue {
    pub fn new(version: OfpVersion, port: u32, queue_id: u32) -> PacketQueue {
        PacketQueue {
            version,
            queue_id,
            port,
            properties: QueuePropList::new(version),
        }
    }

    fn header_length(&self) -> usize {
        if self.version == OfpVersion::Of10 {
            OFP10_PACKET_QUEUE_LENGTH
        } else {
            OFP12_PACKET_QUEUE_LENGTH
        }
    }
}

impl Versioned for PacketQueue {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.properties.set_version(version);
    }
}

impl OfpWire for PacketQueue {
    fn length(&self) -> usize {
        self.header_length() + self.properties.length()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let version = self.version.check_known("packet queue")?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("packet queue", len, u16::max_value() as usize));
        }
        bytes.write_u32::<BigEndian>(self.queue_id)?;
        if version == OfpVersion::Of10 {
            bytes.write_u16::<BigEndian>(len as u16)?;
            write_padding_bytes(bytes, 2);
        } else {
            bytes.write_u32::<BigEndian>(self.port)?;
            bytes.write_u16::<BigEndian>(len as u16)?;
            write_padding_bytes(bytes, 6);
        }
        self.properties.marshal(bytes)
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let version = self.version.check_known("packet queue")?;
        let header = self.header_length();
        if buf.len() < header {
            return Err(OfpError::bad_length("packet queue", buf.len(), header));
        }
        let mut bytes = Cursor::new(buf);
        self.queue_id = bytes.read_u32::<BigEndian>()?;
        if version != OfpVersion::Of10 {
            self.port = bytes.read_u32::<BigEndian>()?;
        }
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < header || len > buf.len() {
            return Err(OfpError::bad_length("packet queue", len, buf.len()));
        }
        self.properties = QueuePropList::new(version);
        self.properties.unpack(&buf[header..len])?;
        if self.length() != len {
            return Err(OfpError::bad_length("packet queue properties", len, self.length()));
        }
        Ok(())
    }
}

/// Queues of a queue config reply, keyed by port and queue id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketQueueList {
    version: OfpVersion,
    queues: BTreeMap<(u32, u32), PacketQueue>,
}

impl PacketQueueList {
    pub fn new(version: OfpVersion) -> PacketQueueList {
        PacketQueueList {
            version,
            queues: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PacketQueue> {
        self.queues.values()
    }

    /// Queue `queue_id` on `port`, created without properties when missing.
    pub fn add(&mut self, port: u32, queue_id: u32) -> &mut PacketQueue {
        let version = self.version;
        self.queues
            .entry((port, queue_id))
            .or_insert_with(|| PacketQueue::new(version, port, queue_id))
    }

    pub fn get(&self, port: u32, queue_id: u32) -> Result<&PacketQueue> {
        self.queues
            .get(&(port, queue_id))
            .ok_or_else(|| OfpError::NotFound(format!("queue {} on port {}", queue_id, port)))
    }

    pub fn remove(&mut self, port: u32, queue_id: u32) -> Option<PacketQueue> {
        self.queues.remove(&(port, queue_id))
    }

    /// Queues attached to `port`.
    pub fn on_port(&self, port: u32) -> impl Iterator<Item = &PacketQueue> {
        self.queues.values().filter(move |q| q.port == port)
    }
}

impl Versioned for PacketQueueList {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for queue in self.queues.values_mut() {
            queue.set_version(version);
        }
    }
}

impl OfpWire for PacketQueueList {
    fn length(&self) -> usize {
        self.queues.values().map(|q| q.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for queue in self.queues.values() {
            queue.marshal(bytes)?;
        }
        Ok(())
    }

    /// 1.0 queues carry no port; they are all filed under port 0.
    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let version = self.version.check_known("packet queue list")?;
        self.queues.clear();
        let mut offset = 0;
        while offset < buf.len() {
            let mut queue = PacketQueue::new(version, 0, 0);
            queue.unpack(&buf[offset..])?;
            offset += queue.length();
            self.queues.insert((queue.port, queue.queue_id), queue);
        }
        debug!("unpacked {} queue(s) from {} byte(s)", self.queues.len(), buf.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_rate_bytes() {
        let prop = QueueProp::new(OfpVersion::Of10, QueuePropBody::MinRate(500)).unwrap();
        assert_eq!(
            prop.to_bytes().unwrap(),
            vec![0, 1, 0, 16, 0, 0, 0, 0, 0x01, 0xf4, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn of10_has_only_min_rate() {
        assert!(matches!(
            QueueProp::new(OfpVersion::Of10, QueuePropBody::MaxRate(1)),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(QueueProp::new(OfpVersion::Of12, QueuePropBody::MaxRate(1)).is_ok());
    }

    #[test]
    fn experimenter_property_is_padded() {
        let body = QueuePropBody::Experimenter {
            experimenter: 0x2320,
            data: vec![7; 5],
        };
        let prop = QueueProp::new(OfpVersion::Of13, body).unwrap();
        assert_eq!(prop.length(), 24);
        let bytes = prop.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0xff, 0xff, 0, 24]);
        assert_eq!(&bytes[8..12], &[0, 0, 0x23, 0x20]);
        let (len, back) = QueueProp::parse(OfpVersion::Of13, &bytes).unwrap();
        assert_eq!(len, 24);
        assert_eq!(back.unwrap().to_bytes().unwrap(), bytes);
    }

    #[test]
    fn prop_list_skips_none() {
        let mut bytes = vec![0, 0, 0, 8, 0, 0, 0, 0];
        bytes.extend(QueueProp::new(OfpVersion::Of10, QueuePropBody::MinRate(100)).unwrap().to_bytes().unwrap());
        let mut list = QueuePropList::new(OfpVersion::Of10);
        list.unpack(&bytes).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.min_rate(), Some(100));
        assert_eq!(list.max_rate(), None);
    }

    #[test]
    fn of10_packet_queue_layout() {
        let mut q = PacketQueue::new(OfpVersion::Of10, 0, 3);
        q.properties.add(QueuePropBody::MinRate(200)).unwrap();
        assert_eq!(q.length(), 8 + 16);
        let bytes = q.to_bytes().unwrap();
        assert_eq!(&bytes[..8], &[0, 0, 0, 3, 0, 24, 0, 0]);
        let mut back = PacketQueue::new(OfpVersion::Of10, 0, 0);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn of13_queue_list_round_trip() {
        let mut queues = PacketQueueList::new(OfpVersion::Of13);
        let q = queues.add(2, 1);
        q.properties.add(QueuePropBody::MinRate(100)).unwrap();
        q.properties.add(QueuePropBody::MaxRate(900)).unwrap();
        queues.add(1, 7);
        assert_eq!(queues.get(2, 1).unwrap().length(), 16 + 32);

        let bytes = queues.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16 + 48);
        // port 1 sorts first
        assert_eq!(&bytes[..10], &[0, 0, 0, 7, 0, 0, 0, 1, 0, 16]);

        let mut back = PacketQueueList::new(OfpVersion::Of13);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, queues);
        assert_eq!(back.on_port(2).count(), 1);
        assert_eq!(back.get(2, 1).unwrap().properties.max_rate(), Some(900));
    }

    #[test]
    fn truncated_queue_is_rejected() {
        let mut q = PacketQueue::new(OfpVersion::Of13, 1, 1);
        q.properties.add(QueuePropBody::MinRate(1)).unwrap();
        let bytes = q.to_bytes().unwrap();
        let mut back = PacketQueue::new(OfpVersion::Of13, 0, 0);
        assert!(matches!(
            back.unpack(&bytes[..24]),
            Err(OfpError::BadLength { .. })
        ));
    }
}
