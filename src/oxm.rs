use std::fmt;
use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::OfpWire;

pub const OXM_HEADER_LENGTH: usize = 4;

pub const OFPXMC_NXM_0: u16 = 0x0000;
pub const OFPXMC_NXM_1: u16 = 0x0001;
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;
pub const OFPXMC_EXPERIMENTER: u16 = 0xffff;

/// VLAN_VID flag marking "a VLAN tag is present".
pub const OFPVID_PRESENT: u16 = 0x1000;
/// VLAN_VID value for "no VLAN tag".
pub const OFPVID_NONE: u16 = 0x0000;

/// Field codes of the OpenFlow basic class.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OxmType {
    InPort = 0,
    InPhyPort = 1,
    Metadata = 2,
    EthDst = 3,
    EthSrc = 4,
    EthType = 5,
    VlanVid = 6,
    VlanPcp = 7,
    IpDscp = 8,
    IpEcn = 9,
    IpProto = 10,
    Ipv4Src = 11,
    Ipv4Dst = 12,
    TcpSrc = 13,
    TcpDst = 14,
    UdpSrc = 15,
    UdpDst = 16,
    SctpSrc = 17,
    SctpDst = 18,
    Icmpv4Type = 19,
    Icmpv4Code = 20,
    ArpOp = 21,
    ArpSpa = 22,
    ArpTpa = 23,
    ArpSha = 24,
    ArpTha = 25,
    Ipv6Src = 26,
    Ipv6Dst = 27,
    Ipv6Flabel = 28,
    Icmpv6Type = 29,
    Icmpv6Code = 30,
    Ipv6NdTarget = 31,
    Ipv6NdSll = 32,
    Ipv6NdTll = 33,
    MplsLabel = 34,
    MplsTc = 35,
    MplsBos = 36,
    PbbIsid = 37,
    TunnelId = 38,
    Ipv6Exthdr = 39,
}

const ALL_OXM_TYPES: [OxmType; 40] = [
    OxmType::InPort,
    OxmType::InPhyPort,
    OxmType::Metadata,
    OxmType::EthDst,
    OxmType::EthSrc,
    OxmType::EthType,
    OxmType::VlanVid,
    OxmType::VlanPcp,
    OxmType::IpDscp,
    OxmType::IpEcn,
    OxmType::IpProto,
    OxmType::Ipv4Src,
    OxmType::Ipv4Dst,
    OxmType::TcpSrc,
    OxmType::TcpDst,
    OxmType::UdpSrc,
    OxmType::UdpDst,
    OxmType::SctpSrc,
    OxmType::SctpDst,
    OxmType::Icmpv4Type,
    OxmType::Icmpv4Code,
    OxmType::ArpOp,
    OxmType::ArpSpa,
    OxmType::ArpTpa,
    OxmType::ArpSha,
    OxmType::ArpTha,
    OxmType::Ipv6Src,
    OxmType::Ipv6Dst,
    OxmType::Ipv6Flabel,
    OxmType::Icmpv6Type,
    OxmType::Icmpv6Code,
    OxmType::Ipv6NdTarget,
    OxmType::Ipv6NdSll,
    OxmType::Ipv6NdTll,
    OxmType::MplsLabel,
    OxmType::MplsTc,
    OxmType::MplsBos,
    OxmType::PbbIsid,
    OxmType::TunnelId,
    OxmType::Ipv6Exthdr,
];

impl OxmType {
    pub fn from_u8(field: u8) -> Option<OxmType> {
        ALL_OXM_TYPES.get(field as usize).copied()
    }

    /// Byte width of the field's value (a mask has the same width).
    pub fn value_len(self) -> usize {
        use self::OxmType::*;
        match self {
            VlanPcp | IpDscp | IpEcn | IpProto | Icmpv4Type | Icmpv4Code | Icmpv6Type
            | Icmpv6Code | MplsTc | MplsBos => 1,
            EthType | VlanVid | TcpSrc | TcpDst | UdpSrc | UdpDst | SctpSrc | SctpDst | ArpOp
            | Ipv6Exthdr => 2,
            PbbIsid => 3,
            InPort | InPhyPort | Ipv4Src | Ipv4Dst | ArpSpa | ArpTpa | Ipv6Flabel
            | MplsLabel => 4,
            EthDst | EthSrc | ArpSha | ArpTha | Ipv6NdSll | Ipv6NdTll => 6,
            Metadata | TunnelId => 8,
            Ipv6Src | Ipv6Dst | Ipv6NdTarget => 16,
        }
    }

    pub fn maskable(self) -> bool {
        use self::OxmType::*;
        matches!(
            self,
            Metadata
                | EthDst
                | EthSrc
                | VlanVid
                | Ipv4Src
                | Ipv4Dst
                | ArpSpa
                | ArpTpa
                | ArpSha
                | ArpTha
                | Ipv6Src
                | Ipv6Dst
                | Ipv6Flabel
                | PbbIsid
                | TunnelId
                | Ipv6Exthdr
        )
    }

    /// Oldest OXM based protocol version that defines this field.
    pub fn min_version(self) -> OfpVersion {
        match self {
            OxmType::MplsBos | OxmType::PbbIsid | OxmType::TunnelId | OxmType::Ipv6Exthdr => {
                OfpVersion::Of13
            }
            _ => OfpVersion::Of12,
        }
    }

    /// Whether the field has a counterpart in the fixed OpenFlow 1.0 `ofp_match`.
    pub fn in_of10_match(self) -> bool {
        use self::OxmType::*;
        matches!(
            self,
            InPort
                | EthDst
                | EthSrc
                | EthType
                | VlanVid
                | VlanPcp
                | IpDscp
                | IpProto
                | Ipv4Src
                | Ipv4Dst
                | TcpSrc
                | TcpDst
                | UdpSrc
                | UdpDst
                | SctpSrc
                | SctpDst
                | Icmpv4Type
                | Icmpv4Code
                | ArpOp
                | ArpSpa
                | ArpTpa
        )
    }

    /// Whether the field may be used under `version`.
    pub fn supported_in(self, version: OfpVersion) -> bool {
        match version {
            OfpVersion::Of10 => self.in_of10_match(),
            OfpVersion::Of12 | OfpVersion::Of13 => self.min_version() <= version,
            OfpVersion::Unknown => false,
        }
    }

    pub fn name(self) -> &'static str {
        use self::OxmType::*;
        match self {
            InPort => "in_port",
            InPhyPort => "in_phy_port",
            Metadata => "metadata",
            EthDst => "eth_dst",
            EthSrc => "eth_src",
            EthType => "eth_type",
            VlanVid => "vlan_vid",
            VlanPcp => "vlan_pcp",
            IpDscp => "ip_dscp",
            IpEcn => "ip_ecn",
            IpProto => "ip_proto",
            Ipv4Src => "ipv4_src",
            Ipv4Dst => "ipv4_dst",
            TcpSrc => "tcp_src",
            TcpDst => "tcp_dst",
            UdpSrc => "udp_src",
            UdpDst => "udp_dst",
            SctpSrc => "sctp_src",
            SctpDst => "sctp_dst",
            Icmpv4Type => "icmpv4_type",
            Icmpv4Code => "icmpv4_code",
            ArpOp => "arp_op",
            ArpSpa => "arp_spa",
            ArpTpa => "arp_tpa",
            ArpSha => "arp_sha",
            ArpTha => "arp_tha",
            Ipv6Src => "ipv6_src",
            Ipv6Dst => "ipv6_dst",
            Ipv6Flabel => "ipv6_flabel",
            Icmpv6Type => "icmpv6_type",
            Icmpv6Code => "icmpv6_code",
            Ipv6NdTarget => "ipv6_nd_target",
            Ipv6NdSll => "ipv6_nd_sll",
            Ipv6NdTll => "ipv6_nd_tll",
            MplsLabel => "mpls_label",
            MplsTc => "mpls_tc",
            MplsBos => "mpls_bos",
            PbbIsid => "pbb_isid",
            TunnelId => "tunnel_id",
            Ipv6Exthdr => "ipv6_exthdr",
        }
    }
}

impl fmt::Display for OxmType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single match field: class, field code, value and optional mask.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OxmField {
    class: u16,
    field: u8,
    value: Vec<u8>,
    mask: Option<Vec<u8>>,
}

impl OxmField {
    /// Create a field of any class from raw value/mask bytes.
    pub fn new(class: u16, field: u8, value: Vec<u8>, mask: Option<Vec<u8>>) -> OxmField {
        OxmField {
            class,
            field: field & 0x7f,
            value,
            mask,
        }
    }

    /// Create an OpenFlow basic field, checking the value (and mask) width.
    pub fn basic(typ: OxmType, value: &[u8], mask: Option<&[u8]>) -> Result<OxmField> {
        if value.len() != typ.value_len() {
            return Err(OfpError::bad_length("oxm value", value.len(), typ.value_len()));
        }
        if let Some(m) = mask {
            if !typ.maskable() {
                return Err(OfpError::bad_length("oxm mask (field is not maskable)", m.len(), 0));
            }
            if m.len() != typ.value_len() {
                return Err(OfpError::bad_length("oxm mask", m.len(), typ.value_len()));
            }
        }
        Ok(OxmField::new(
            OFPXMC_OPENFLOW_BASIC,
            typ as u8,
            value.to_vec(),
            mask.map(|m| m.to_vec()),
        ))
    }

    /// Create an OpenFlow basic field from an integer in host order. Bits
    /// beyond the field width are dropped.
    pub fn from_uint(typ: OxmType, value: u64) -> OxmField {
        let v = uint_bytes(value, typ.value_len());
        OxmField::new(OFPXMC_OPENFLOW_BASIC, typ as u8, v, None)
    }

    /// Masked variant of `from_uint`. The field must be maskable.
    pub fn from_uint_masked(typ: OxmType, value: u64, mask: u64) -> Result<OxmField> {
        let v = uint_bytes(value, typ.value_len());
        let m = uint_bytes(mask, typ.value_len());
        OxmField::basic(typ, &v, Some(&m))
    }

    pub fn ipv4(typ: OxmType, addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> Result<OxmField> {
        let mask = mask.map(|m| m.octets());
        OxmField::basic(typ, &addr.octets(), mask.as_ref().map(|m| &m[..]))
    }

    pub fn ipv6(typ: OxmType, addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> Result<OxmField> {
        let mask = mask.map(|m| m.octets());
        OxmField::basic(typ, &addr.octets(), mask.as_ref().map(|m| &m[..]))
    }

    pub fn mac(typ: OxmType, addr: [u8; 6], mask: Option<[u8; 6]>) -> Result<OxmField> {
        OxmField::basic(typ, &addr, mask.as_ref().map(|m| &m[..]))
    }

    pub fn class(&self) -> u16 {
        self.class
    }

    pub fn field(&self) -> u8 {
        self.field
    }

    /// The basic-class field code, if this is a known OpenFlow basic field.
    pub fn oxm_type(&self) -> Option<OxmType> {
        if self.class == OFPXMC_OPENFLOW_BASIC {
            OxmType::from_u8(self.field)
        } else {
            None
        }
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    /// Value interpreted as a big-endian unsigned integer. Only the low 8
    /// bytes of wider values are kept.
    pub fn uint_value(&self) -> u64 {
        uint_of_bytes(&self.value)
    }

    /// Mask as an integer; all ones of the value width when unmasked.
    pub fn uint_mask(&self) -> u64 {
        match self.mask {
            Some(ref m) => uint_of_bytes(m),
            None => ones(self.value.len()),
        }
    }

    /// Basic-class fields must carry a value, and a mask if any, of exactly
    /// the field's width. Other classes are not checked.
    pub fn check_width(&self) -> Result<()> {
        let typ = match self.oxm_type() {
            Some(t) => t,
            None => return Ok(()),
        };
        if self.value.len() != typ.value_len() {
            return Err(OfpError::bad_length("oxm basic field", self.value.len(), typ.value_len()));
        }
        match self.mask {
            Some(ref m) if m.len() != typ.value_len() => Err(OfpError::bad_length(
                "oxm basic field mask",
                m.len(),
                typ.value_len(),
            )),
            _ => Ok(()),
        }
    }

    /// The 32-bit OXM header word (class, field, hasmask, length).
    pub fn oxm_id(&self) -> u32 {
        ((self.class as u32) << 16)
            | ((self.field as u32) << 9)
            | (if self.has_mask() { 1 << 8 } else { 0 })
            | (self.payload_len() as u32 & 0xff)
    }

    fn payload_len(&self) -> usize {
        self.value.len() + self.mask.as_ref().map_or(0, |m| m.len())
    }

    fn same_type(&self, other: &OxmField) -> bool {
        self.class == other.class && self.field == other.field
    }

    /// Wildcard-aware containment: every packet matched by `other` is also
    /// matched by `self`.
    pub fn covers(&self, other: &OxmField) -> bool {
        if !self.same_type(other) || self.value.len() != other.value.len() {
            return false;
        }
        let all_ones = vec![0xffu8; self.value.len()];
        let smask = self.mask.as_deref().unwrap_or(&all_ones);
        let omask = other.mask.as_deref().unwrap_or(&all_ones);
        if smask.len() != self.value.len() || omask.len() != other.value.len() {
            return false;
        }
        (0..self.value.len()).all(|i| {
            (self.value[i] & smask[i]) == (other.value[i] & smask[i])
                && (omask[i] & smask[i]) == smask[i]
        })
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<OxmField> {
        if bytes.len() < OXM_HEADER_LENGTH {
            return Err(OfpError::bad_length("oxm header", bytes.len(), OXM_HEADER_LENGTH));
        }
        let mut cursor = Cursor::new(bytes);
        let class = cursor.read_u16::<BigEndian>()?;
        let field_and_mask = cursor.read_u8()?;
        let len = cursor.read_u8()? as usize;
        if bytes.len() < OXM_HEADER_LENGTH + len {
            return Err(OfpError::bad_length("oxm tlv", OXM_HEADER_LENGTH + len, bytes.len()));
        }
        let field = field_and_mask >> 1;
        let has_mask = field_and_mask & 1 == 1;
        let payload = &bytes[OXM_HEADER_LENGTH..OXM_HEADER_LENGTH + len];

        if class == OFPXMC_OPENFLOW_BASIC {
            if let Some(typ) = OxmType::from_u8(field) {
                let expected = if has_mask {
                    2 * typ.value_len()
                } else {
                    typ.value_len()
                };
                if len != expected {
                    return Err(OfpError::bad_length("oxm basic field", len, expected));
                }
            }
        }

        // experimenter fields carry the experimenter id ahead of value/mask
        let prefix = if class == OFPXMC_EXPERIMENTER { 4 } else { 0 };
        if len < prefix {
            return Err(OfpError::bad_length("oxm experimenter field", len, prefix));
        }
        let (value, mask) = if has_mask {
            let body = len - prefix;
            if body % 2 != 0 {
                return Err(OfpError::bad_length("oxm masked field", len, len + 1));
            }
            let split = prefix + body / 2;
            (payload[..split].to_vec(), Some(payload[split..].to_vec()))
        } else {
            (payload.to_vec(), None)
        };
        Ok(OxmField {
            class,
            field,
            value,
            mask,
        })
    }
}

impl OfpWire for OxmField {
    fn length(&self) -> usize {
        OXM_HEADER_LENGTH + self.payload_len()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let len = self.payload_len();
        if len > 0xff {
            return Err(OfpError::bad_length("oxm tlv", len, 0xff));
        }
        bytes.write_u16::<BigEndian>(self.class)?;
        bytes.write_u8((self.field << 1) | self.has_mask() as u8)?;
        bytes.write_u8(len as u8)?;
        bytes.extend_from_slice(&self.value);
        if let Some(ref m) = self.mask {
            bytes.extend_from_slice(m);
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        let field = OxmField::parse(buf)?;
        if field.length() != buf.len() {
            return Err(OfpError::bad_length("oxm tlv", buf.len(), field.length()));
        }
        *self = field;
        Ok(())
    }
}

impl fmt::Display for OxmField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.oxm_type() {
            Some(t) => write!(f, "{}", t)?,
            None => write!(f, "oxm(class=0x{:04x}, field={})", self.class, self.field)?,
        }
        write!(f, " = 0x")?;
        for b in &self.value {
            write!(f, "{:02x}", b)?;
        }
        if let Some(ref m) = self.mask {
            write!(f, "/0x")?;
            for b in m {
                write!(f, "{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// All ones over the low `width` bytes, saturating at 8 bytes.
fn ones(width: usize) -> u64 {
    match width.min(8) {
        8 => u64::max_value(),
        n => (1u64 << (8 * n)) - 1,
    }
}

/// `value` in network byte order, right aligned in `width` bytes.
fn uint_bytes(value: u64, width: usize) -> Vec<u8> {
    let mut v = vec![0; width];
    let n = width.min(8);
    if n > 0 {
        BigEndian::write_uint(&mut v[width - n..], value & ones(n), n);
    }
    v
}

fn uint_of_bytes(buf: &[u8]) -> u64 {
    let n = buf.len().min(8);
    if n == 0 {
        return 0;
    }
    BigEndian::read_uint(&buf[buf.len() - n..], n)
}

/// Classification returned by `OxmList::is_part_of`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PartOf {
    pub exact_hits: u16,
    pub wildcard_hits: u16,
    pub missed: u16,
}

impl PartOf {
    pub fn is_part(&self) -> bool {
        self.missed == 0
    }
}

/// Ordered collection of OXM fields, at most one per (class, field).
///
/// Wire order is preserved; inserting a field that is already present
/// replaces it in place.
#[derive(Clone, Debug, Default)]
pub struct OxmList {
    fields: Vec<OxmField>,
}

impl OxmList {
    pub fn new() -> OxmList {
        OxmList { fields: vec![] }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<OxmField> {
        self.fields.iter()
    }

    fn position(&self, class: u16, field: u8) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.class == class && f.field == field)
    }

    /// Add `field`, replacing an existing field of the same type. Basic
    /// fields of the wrong width are refused with `BadLength`.
    pub fn insert(&mut self, field: OxmField) -> Result<&mut OxmField> {
        field.check_width()?;
        let idx = match self.position(field.class, field.field) {
            Some(i) => {
                self.fields[i] = field;
                i
            }
            None => {
                self.fields.push(field);
                self.fields.len() - 1
            }
        };
        Ok(&mut self.fields[idx])
    }

    pub fn has(&self, class: u16, field: u8) -> bool {
        self.position(class, field).is_some()
    }

    pub fn has_type(&self, typ: OxmType) -> bool {
        self.has(OFPXMC_OPENFLOW_BASIC, typ as u8)
    }

    pub fn get(&self, class: u16, field: u8) -> Result<&OxmField> {
        self.fields
            .iter()
            .find(|f| f.class == class && f.field == field)
            .ok_or_else(|| {
                OfpError::NotFound(format!("oxm class 0x{:04x} field {}", class, field))
            })
    }

    pub fn get_type(&self, typ: OxmType) -> Result<&OxmField> {
        self.fields
            .iter()
            .find(|f| f.oxm_type() == Some(typ))
            .ok_or_else(|| OfpError::NotFound(format!("oxm {}", typ)))
    }

    pub fn get_type_mut(&mut self, typ: OxmType) -> Result<&mut OxmField> {
        self.fields
            .iter_mut()
            .find(|f| f.oxm_type() == Some(typ))
            .ok_or_else(|| OfpError::NotFound(format!("oxm {}", typ)))
    }

    pub fn remove(&mut self, class: u16, field: u8) -> Option<OxmField> {
        self.position(class, field).map(|i| self.fields.remove(i))
    }

    pub fn remove_type(&mut self, typ: OxmType) -> Option<OxmField> {
        self.remove(OFPXMC_OPENFLOW_BASIC, typ as u8)
    }

    /// Wildcard-aware subset test used for flow table lookups.
    ///
    /// Every field of `other` must be covered by the field of the same type in
    /// `self` (equal value, or a mask in `self` that includes it). With
    /// `strict`, `self` may not carry any field beyond those in `other`.
    pub fn contains(&self, other: &OxmList, strict: bool) -> bool {
        if strict && self.fields.len() != other.fields.len() {
            return false;
        }
        other.fields.iter().all(|o| match self.position(o.class, o.field) {
            Some(i) => self.fields[i].covers(o),
            None => false,
        })
    }

    /// Classify every field of `other` against `self`: identical fields are
    /// exact hits, fields `self` does not constrain are wildcard hits, and
    /// fields with a different value are misses.
    pub fn is_part_of(&self, other: &OxmList) -> PartOf {
        let mut result = PartOf::default();
        for o in &other.fields {
            match self.position(o.class, o.field) {
                None => result.wildcard_hits += 1,
                Some(i) if self.fields[i] == *o => result.exact_hits += 1,
                Some(_) => result.missed += 1,
            }
        }
        result
    }
}

impl PartialEq for OxmList {
    fn eq(&self, other: &OxmList) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|f| other.get(f.class, f.field).map_or(false, |o| o == f))
    }
}

impl Eq for OxmList {}

impl OfpWire for OxmList {
    fn length(&self) -> usize {
        self.fields.iter().map(|f| f.length()).sum()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for field in &self.fields {
            field.marshal(bytes)?;
        }
        Ok(())
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.clear();
        if buf.len() < OXM_HEADER_LENGTH {
            return Ok(());
        }
        let mut offset = 0;
        while offset < buf.len() {
            let field = OxmField::parse(&buf[offset..])?;
            offset += field.length();
            self.insert(field)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a OxmList {
    type Item = &'a OxmField;
    type IntoIter = std::slice::Iter<'a, OxmField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_type_tlv_bytes() {
        let f = OxmField::from_uint(OxmType::EthType, 0x0800);
        assert_eq!(f.length(), 6);
        assert_eq!(f.to_bytes().unwrap(), vec![0x80, 0x00, 0x0a, 0x02, 0x08, 0x00]);
        assert_eq!(f.oxm_id(), 0x8000_0a02);
    }

    #[test]
    fn masked_ipv4_tlv_bytes() {
        let f = OxmField::ipv4(
            OxmType::Ipv4Src,
            Ipv4Addr::new(10, 0, 0, 0),
            Some(Ipv4Addr::new(255, 0, 0, 0)),
        )
        .unwrap();
        assert_eq!(
            f.to_bytes().unwrap(),
            vec![0x80, 0x00, 0x17, 0x08, 10, 0, 0, 0, 255, 0, 0, 0]
        );
        let mut back = OxmField::default();
        back.unpack(&f.to_bytes().unwrap()).unwrap();
        assert_eq!(back, f);
        assert_eq!(back.uint_mask(), 0xff00_0000);
    }

    #[test]
    fn unmaskable_field_rejects_mask() {
        assert!(OxmField::from_uint_masked(OxmType::EthType, 0x0800, 0xff00).is_err());
    }

    #[test]
    fn wrong_basic_length_is_rejected() {
        // eth_type declared with 3 value bytes
        let bytes = [0x80, 0x00, 0x0a, 0x03, 0x08, 0x00, 0x00];
        let mut list = OxmList::new();
        assert!(matches!(list.unpack(&bytes), Err(OfpError::BadLength { .. })));
    }

    #[test]
    fn insert_checks_basic_width() {
        let mut list = OxmList::new();
        let short = OxmField::new(OFPXMC_OPENFLOW_BASIC, OxmType::Ipv6Src as u8, vec![1, 2, 3], None);
        assert!(matches!(
            list.insert(short),
            Err(OfpError::BadLength {
                declared: 3,
                expected: 16,
                ..
            })
        ));
        let bad_mask = OxmField::new(
            OFPXMC_OPENFLOW_BASIC,
            OxmType::Ipv4Dst as u8,
            vec![10, 0, 0, 0],
            Some(vec![255]),
        );
        assert!(matches!(list.insert(bad_mask), Err(OfpError::BadLength { .. })));
        assert!(list.is_empty());

        // non-basic classes are opaque
        list.insert(OxmField::new(OFPXMC_NXM_1, 2, vec![1, 2, 3], None)).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn uint_conversions_clip_to_width() {
        let f = OxmField::from_uint(OxmType::PbbIsid, 0x1234_5678);
        assert_eq!(f.value(), &[0x34, 0x56, 0x78]);
        assert_eq!(f.uint_value(), 0x34_5678);
        assert_eq!(f.uint_mask(), 0xff_ffff);

        let f = OxmField::from_uint(OxmType::Ipv6Dst, 1);
        assert_eq!(f.value().len(), 16);
        assert_eq!(f.value()[15], 1);
        assert_eq!(f.uint_value(), 1);
        assert_eq!(f.uint_mask(), u64::max_value());
    }

    #[test]
    fn truncated_tlv_is_rejected() {
        let bytes = [0x80, 0x00, 0x0a, 0x02, 0x08];
        let mut list = OxmList::new();
        assert!(matches!(list.unpack(&bytes), Err(OfpError::BadLength { .. })));
    }

    #[test]
    fn experimenter_field_round_trips() {
        let f = OxmField::new(
            OFPXMC_EXPERIMENTER,
            3,
            vec![0x00, 0x00, 0x23, 0x20, 0xaa, 0xbb],
            Some(vec![0xff, 0x00]),
        );
        let bytes = f.to_bytes().unwrap();
        let mut list = OxmList::new();
        list.unpack(&bytes).unwrap();
        assert_eq!(list.get(OFPXMC_EXPERIMENTER, 3).unwrap(), &f);
        assert_eq!(list.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn list_keeps_order_and_replaces() {
        let mut list = OxmList::new();
        list.insert(OxmField::from_uint(OxmType::IpProto, 6)).unwrap();
        list.insert(OxmField::from_uint(OxmType::EthType, 0x0800)).unwrap();
        list.insert(OxmField::from_uint(OxmType::IpProto, 17)).unwrap();
        assert_eq!(list.len(), 2);
        let order: Vec<_> = list.iter().map(|f| f.oxm_type().unwrap()).collect();
        assert_eq!(order, vec![OxmType::IpProto, OxmType::EthType]);
        assert_eq!(list.get_type(OxmType::IpProto).unwrap().uint_value(), 17);
        let bytes = list.to_bytes().unwrap();
        let mut back = OxmList::new();
        back.unpack(&bytes).unwrap();
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn covers_with_masks() {
        let net = OxmField::ipv4(
            OxmType::Ipv4Dst,
            Ipv4Addr::new(192, 168, 0, 0),
            Some(Ipv4Addr::new(255, 255, 0, 0)),
        )
        .unwrap();
        let host = OxmField::ipv4(OxmType::Ipv4Dst, Ipv4Addr::new(192, 168, 3, 4), None).unwrap();
        let other = OxmField::ipv4(OxmType::Ipv4Dst, Ipv4Addr::new(10, 0, 0, 1), None).unwrap();
        assert!(net.covers(&host));
        assert!(!host.covers(&net));
        assert!(!net.covers(&other));
        assert!(host.covers(&host));
    }

    #[test]
    fn contains_strict_and_loose() {
        let mut flow = OxmList::new();
        flow.insert(OxmField::from_uint(OxmType::EthType, 0x0800)).unwrap();

        let mut pkt = OxmList::new();
        pkt.insert(OxmField::from_uint(OxmType::EthType, 0x0800)).unwrap();
        pkt.insert(OxmField::from_uint(OxmType::IpProto, 6)).unwrap();

        assert!(!flow.contains(&pkt, false));
        assert!(pkt.contains(&flow, false));
        assert!(!pkt.contains(&flow, true));
        assert!(pkt.contains(&pkt.clone(), true));

        let mut net = OxmList::new();
        net.insert(
            OxmField::ipv4(
                OxmType::Ipv4Dst,
                Ipv4Addr::new(10, 0, 0, 0),
                Some(Ipv4Addr::new(255, 0, 0, 0)),
            )
            .unwrap(),
        )
        .unwrap();
        let mut host = OxmList::new();
        host.insert(OxmField::ipv4(OxmType::Ipv4Dst, Ipv4Addr::new(10, 1, 2, 3), None).unwrap())
            .unwrap();
        assert!(net.contains(&host, true));
        assert!(!host.contains(&net, true));
    }

    #[test]
    fn part_of_classification() {
        let mut flow = OxmList::new();
        flow.insert(OxmField::from_uint(OxmType::EthType, 0x0800)).unwrap();
        flow.insert(OxmField::from_uint(OxmType::IpProto, 17)).unwrap();

        let mut pkt = OxmList::new();
        pkt.insert(OxmField::from_uint(OxmType::EthType, 0x0800)).unwrap();
        pkt.insert(OxmField::from_uint(OxmType::IpProto, 6)).unwrap();
        pkt.insert(OxmField::from_uint(OxmType::TcpDst, 80)).unwrap();

        let res = flow.is_part_of(&pkt);
        assert_eq!(res.exact_hits, 1);
        assert_eq!(res.missed, 1);
        assert_eq!(res.wildcard_hits, 1);
        assert!(!res.is_part());
    }

    #[test]
    fn same_field_other_value_is_a_miss() {
        let mut flow = OxmList::new();
        flow.insert(OxmField::from_uint(OxmType::UdpDst, 53)).unwrap();
        let mut pkt = OxmList::new();
        pkt.insert(OxmField::from_uint(OxmType::UdpDst, 67)).unwrap();

        let res = flow.is_part_of(&pkt);
        assert_eq!(res, PartOf { exact_hits: 0, wildcard_hits: 0, missed: 1 });
        assert!(!res.is_part());
        assert!(!flow.contains(&pkt, false));
    }

    #[test]
    fn version_support() {
        assert!(OxmType::Ipv4Src.supported_in(OfpVersion::Of10));
        assert!(!OxmType::Ipv6Src.supported_in(OfpVersion::Of10));
        assert!(!OxmType::PbbIsid.supported_in(OfpVersion::Of12));
        assert!(OxmType::PbbIsid.supported_in(OfpVersion::Of13));
        assert_eq!(OxmType::from_u8(39), Some(OxmType::Ipv6Exthdr));
        assert_eq!(OxmType::from_u8(40), None);
    }
}
