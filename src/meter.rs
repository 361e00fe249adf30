use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::bits::{pad_to_8, write_padding_bytes};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};

pub const OFPMBT_DROP: u16 = 1;
pub const OFPMBT_DSCP_REMARK: u16 = 2;
pub const OFPMBT_EXPERIMENTER: u16 = 0xffff;

pub const OFPMF_KBPS: u16 = 1 << 0;
pub const OFPMF_PKTPS: u16 = 1 << 1;
pub const OFPMF_BURST: u16 = 1 << 2;
pub const OFPMF_STATS: u16 = 1 << 3;

pub const OFP_METER_BAND_HEADER_LENGTH: usize = 12;
const OFP_METER_BAND_LENGTH: usize = 16;
const OFP_METER_CONFIG_LENGTH: usize = 8;

/// The meter config request shares the meter stats request layout.
pub type MeterConfigRequest = crate::stats::MeterStatsRequest;

/// Meters exist from OpenFlow 1.3 on.
pub(crate) fn require_of13(version: OfpVersion, what: &str) -> Result<()> {
    if version == OfpVersion::Of13 {
        Ok(())
    } else {
        Err(OfpError::bad_version(version, what))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeterBandBody {
    /// Drop packets above the rate.
    Drop,
    /// Raise the drop precedence of the DSCP field.
    DscpRemark { prec_level: u8 },
    Experimenter { experimenter: u32, body: Vec<u8> },
}

impl MeterBandBody {
    pub fn band_type(&self) -> u16 {
        match *self {
            MeterBandBody::Drop => OFPMBT_DROP,
            MeterBandBody::DscpRemark { .. } => OFPMBT_DSCP_REMARK,
            MeterBandBody::Experimenter { .. } => OFPMBT_EXPERIMENTER,
        }
    }
}

/// One band of a meter: `{type, len, rate, burst_size}` plus a type
/// specific tail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterBand {
    version: OfpVersion,
    pub rate: u32,
    pub burst_size: u32,
    pub body: MeterBandBody,
}

impl MeterBand {
    pub fn new(version: OfpVersion, rate: u32, burst_size: u32, body: MeterBandBody) -> Result<MeterBand> {
        require_of13(version, "meter band")?;
        Ok(MeterBand {
            version,
            rate,
            burst_size,
            body,
        })
    }

    pub fn drop(version: OfpVersion, rate: u32, burst_size: u32) -> Result<MeterBand> {
        MeterBand::new(version, rate, burst_size, MeterBandBody::Drop)
    }

    pub fn dscp_remark(version: OfpVersion, rate: u32, burst_size: u32, prec_level: u8) -> Result<MeterBand> {
        MeterBand::new(version, rate, burst_size, MeterBandBody::DscpRemark { prec_level })
    }

    pub fn band_type(&self) -> u16 {
        self.body.band_type()
    }

    /// Decode the band at the front of `buf`.
    pub fn parse(version: OfpVersion, buf: &[u8]) -> Result<MeterBand> {
        require_of13(version, "meter band")?;
        if buf.len() < OFP_METER_BAND_HEADER_LENGTH {
            return Err(OfpError::bad_length("meter band header", buf.len(), OFP_METER_BAND_HEADER_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < OFP_METER_BAND_LENGTH || len > buf.len() || len % 8 != 0 {
            return Err(OfpError::bad_length("meter band", len, buf.len()));
        }
        let rate = bytes.read_u32::<BigEndian>()?;
        let burst_size = bytes.read_u32::<BigEndian>()?;
        let body = match typ {
            OFPMBT_DROP | OFPMBT_DSCP_REMARK if len != OFP_METER_BAND_LENGTH => {
                return Err(OfpError::bad_length("meter band", len, OFP_METER_BAND_LENGTH));
            }
            OFPMBT_DROP => MeterBandBody::Drop,
            OFPMBT_DSCP_REMARK => MeterBandBody::DscpRemark {
                prec_level: bytes.read_u8()?,
            },
            OFPMBT_EXPERIMENTER => MeterBandBody::Experimenter {
                experimenter: bytes.read_u32::<BigEndian>()?,
                body: buf[OFP_METER_BAND_LENGTH..len].to_vec(),
            },
            t => return Err(OfpError::NotFound(format!("meter band type {}", t))),
        };
        Ok(MeterBand {
            version,
            rate,
            burst_size,
            body,
        })
    }
}

impl Versioned for MeterBand {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for MeterBand {
    fn length(&self) -> usize {
        match self.body {
            MeterBandBody::Experimenter { ref body, .. } => pad_to_8(OFP_METER_BAND_LENGTH + body.len()),
            _ => OFP_METER_BAND_LENGTH,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_of13(self.version, "meter band")?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("meter band", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(self.band_type())?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        bytes.write_u32::<BigEndian>(self.rate)?;
        bytes.write_u32::<BigEndian>(self.burst_size)?;
        match self.body {
            MeterBandBody::Drop => write_padding_bytes(bytes, 4),
            MeterBandBody::DscpRemark { prec_level } => {
                bytes.write_u8(prec_level)?;
                write_padding_bytes(bytes, 3);
            }
            MeterBandBody::Experimenter {
                experimenter,
                ref body,
            } => {
                bytes.write_u32::<BigEndian>(experimenter)?;
                bytes.extend_from_slice(body);
                write_padding_bytes(bytes, len - OFP_METER_BAND_LENGTH - body.len());
            }
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        *self = MeterBand::parse(self.version, buf)?;
        Ok(())
    }
}

impl fmt::Display for MeterBand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.body {
            MeterBandBody::Drop => write!(f, "drop")?,
            MeterBandBody::DscpRemark { prec_level } => write!(f, "dscp_remark(prec_level={})", prec_level)?,
            MeterBandBody::Experimenter { experimenter, .. } => {
                write!(f, "experimenter(id=0x{:08x})", experimenter)?
            }
        }
        write!(f, " rate={} burst_size={}", self.rate, self.burst_size)
    }
}

/// Bands of a meter, at most one per band type, packed in type order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterBandSet {
    version: OfpVersion,
    bands: BTreeMap<u16, MeterBand>,
}

impl MeterBandSet {
    pub fn new(version: OfpVersion) -> MeterBandSet {
        MeterBandSet {
            version,
            bands: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn clear(&mut self) {
        self.bands.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeterBand> {
        self.bands.values()
    }

    /// Add a band, replacing the band of the same type.
    pub fn set(&mut self, band: MeterBand) -> Result<&mut MeterBand> {
        require_of13(self.version, "meter band set")?;
        let mut band = band;
        band.set_version(self.version);
        Ok(self.insert(band))
    }

    fn insert(&mut self, band: MeterBand) -> &mut MeterBand {
        match self.bands.entry(band.band_type()) {
            Entry::Occupied(mut e) => {
                e.insert(band);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(band),
        }
    }

    pub fn get(&self, band_type: u16) -> Result<&MeterBand> {
        self.bands
            .get(&band_type)
            .ok_or_else(|| OfpError::NotFound(format!("meter band type {}", band_type)))
    }

    pub fn remove(&mut self, band_type: u16) -> Option<MeterBand> {
        self.bands.remove(&band_type)
    }
}

impl Versioned for MeterBandSet {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for band in self.bands.values_mut() {
            band.set_version(version);
        }
    }
}

impl OfpWire for MeterBandSet {
    fn length(&self) -> usize {
        self.bands.values().map(|b| b.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for band in self.bands.values() {
            band.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_of13(self.version, "meter band set")?;
        self.bands.clear();
        let mut offset = 0;
        while offset < buf.len() {
            let band = MeterBand::parse(self.version, &buf[offset..])?;
            offset += band.length();
            self.insert(band);
        }
        Ok(())
    }
}

/// Configuration of one meter, as returned by a meter config request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterConfig {
    version: OfpVersion,
    pub flags: u16,
    pub meter_id: u32,
    pub bands: MeterBandSet,
}

impl MeterConfig {
    pub fn new(version: OfpVersion, meter_id: u32, flags: u16) -> MeterConfig {
        MeterConfig {
            version,
            flags,
            meter_id,
            bands: MeterBandSet::new(version),
        }
    }
}

impl Versioned for MeterConfig {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        self.bands.set_version(version);
    }
}

impl OfpWire for MeterConfig {
    fn length(&self) -> usize {
        OFP_METER_CONFIG_LENGTH + self.bands.length()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        require_of13(self.version, "meter config")?;
        let len = self.length();
        if len > u16::max_value() as usize {
            return Err(OfpError::bad_length("meter config", len, u16::max_value() as usize));
        }
        bytes.write_u16::<BigEndian>(len as u16)?;
        bytes.write_u16::<BigEndian>(self.flags)?;
        bytes.write_u32::<BigEndian>(self.meter_id)?;
        self.bands.marshal(bytes)
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_of13(self.version, "meter config")?;
        if buf.len() < OFP_METER_CONFIG_LENGTH {
            return Err(OfpError::bad_length("meter config", buf.len(), OFP_METER_CONFIG_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < OFP_METER_CONFIG_LENGTH || len > buf.len() {
            return Err(OfpError::bad_length("meter config", len, buf.len()));
        }
        self.flags = bytes.read_u16::<BigEndian>()?;
        self.meter_id = bytes.read_u32::<BigEndian>()?;
        self.bands = MeterBandSet::new(self.version);
        self.bands.unpack(&buf[OFP_METER_CONFIG_LENGTH..len])?;
        if self.length() != len {
            // a band type repeated on the wire
            return Err(OfpError::bad_length("meter config bands", len, self.length()));
        }
        Ok(())
    }
}

/// Meter config reply body, keyed by meter id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterConfigArray {
    version: OfpVersion,
    configs: BTreeMap<u32, MeterConfig>,
}

impl MeterConfigArray {
    pub fn new(version: OfpVersion) -> MeterConfigArray {
        MeterConfigArray {
            version,
            configs: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeterConfig> {
        self.configs.values()
    }

    /// Config of `meter_id`, created empty when missing.
    pub fn add(&mut self, meter_id: u32, flags: u16) -> &mut MeterConfig {
        let version = self.version;
        self.configs
            .entry(meter_id)
            .or_insert_with(|| MeterConfig::new(version, meter_id, flags))
    }

    pub fn get(&self, meter_id: u32) -> Result<&MeterConfig> {
        self.configs
            .get(&meter_id)
            .ok_or_else(|| OfpError::NotFound(format!("meter config {}", meter_id)))
    }

    pub fn remove(&mut self, meter_id: u32) -> Option<MeterConfig> {
        self.configs.remove(&meter_id)
    }
}

impl Versioned for MeterConfigArray {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
        for config in self.configs.values_mut() {
            config.set_version(version);
        }
    }
}

impl OfpWire for MeterConfigArray {
    fn length(&self) -> usize {
        self.configs.values().map(|c| c.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for config in self.configs.values() {
            config.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        require_of13(self.version, "meter config array")?;
        self.configs.clear();
        let mut offset = 0;
        while buf.len() - offset >= OFP_METER_CONFIG_LENGTH {
            let mut config = MeterConfig::new(self.version, 0, 0);
            config.unpack(&buf[offset..])?;
            offset += config.length();
            self.configs.insert(config.meter_id, config);
        }
        debug!("unpacked {} meter config(s) from {} byte(s)", self.configs.len(), buf.len());
        Ok(())
    }
}
