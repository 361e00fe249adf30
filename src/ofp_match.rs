use std::convert::TryFrom;
use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::bits::{
    bit, bytes_of_mac, mac_of_bytes, mask_of_prefix, pad_to_8, prefix_len, test_bit,
    write_padding_bytes,
};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_wire::{OfpWire, Versioned};
use crate::oxm::{OxmField, OxmList, OxmType, PartOf, OFPVID_NONE, OFPVID_PRESENT};
use crate::port::{port_from_of10, port_to_of10};

pub const OFP10_MATCH_LENGTH: usize = 40;
pub const OXM_MATCH_HEADER_LENGTH: usize = 4;

pub const OFPMT_STANDARD: u16 = 0;
pub const OFPMT_OXM: u16 = 1;

const OFPFW_IN_PORT: u64 = 0;
const OFPFW_DL_VLAN: u64 = 1;
const OFPFW_DL_SRC: u64 = 2;
const OFPFW_DL_DST: u64 = 3;
const OFPFW_DL_TYPE: u64 = 4;
const OFPFW_NW_PROTO: u64 = 5;
const OFPFW_TP_SRC: u64 = 6;
const OFPFW_TP_DST: u64 = 7;
const OFPFW_NW_SRC_SHIFT: u32 = 8;
const OFPFW_NW_DST_SHIFT: u32 = 14;
const OFPFW_NW_MASK_BITS: u32 = 0x3f;
const OFPFW_DL_VLAN_PCP: u64 = 20;
const OFPFW_NW_TOS: u64 = 21;
const OFPFW_ALL: u32 = (1 << 22) - 1;

/// `dl_vlan` value of an untagged packet in OpenFlow 1.0.
const OFP10_VLAN_NONE: u16 = 0xffff;

pub const ETH_TYPE_IPV4: u64 = 0x0800;
pub const ETH_TYPE_ARP: u64 = 0x0806;
pub const ETH_TYPE_IPV6: u64 = 0x86dd;
pub const ETH_TYPE_MPLS: u64 = 0x8847;
pub const ETH_TYPE_MPLS_MCAST: u64 = 0x8848;
pub const ETH_TYPE_PBB: u64 = 0x88e7;

pub const IP_PROTO_ICMP: u64 = 1;
pub const IP_PROTO_TCP: u64 = 6;
pub const IP_PROTO_UDP: u64 = 17;
pub const IP_PROTO_ICMPV6: u64 = 58;
pub const IP_PROTO_SCTP: u64 = 132;

const ICMPV6_ND_SOLICIT: u64 = 135;
const ICMPV6_ND_ADVERT: u64 = 136;

enum Require {
    Present,
    OneOf(&'static [u64]),
    NotEqual(u64),
}

/// A match field may only appear when `requires` satisfies `rule`.
struct Prerequisite {
    field: OxmType,
    requires: OxmType,
    rule: Require,
}

const IP_ETH_TYPES: &[u64] = &[ETH_TYPE_IPV4, ETH_TYPE_IPV6];
const MPLS_ETH_TYPES: &[u64] = &[ETH_TYPE_MPLS, ETH_TYPE_MPLS_MCAST];

macro_rules! prereq {
    ($field:ident, $requires:ident, $rule:expr) => {
        Prerequisite {
            field: OxmType::$field,
            requires: OxmType::$requires,
            rule: $rule,
        }
    };
}

const PREREQUISITES: &[Prerequisite] = &[
    prereq!(InPhyPort, InPort, Require::Present),
    prereq!(VlanPcp, VlanVid, Require::NotEqual(OFPVID_NONE as u64)),
    prereq!(IpDscp, EthType, Require::OneOf(IP_ETH_TYPES)),
    prereq!(IpEcn, EthType, Require::OneOf(IP_ETH_TYPES)),
    prereq!(IpProto, EthType, Require::OneOf(IP_ETH_TYPES)),
    prereq!(Ipv4Src, EthType, Require::OneOf(&[ETH_TYPE_IPV4])),
    prereq!(Ipv4Dst, EthType, Require::OneOf(&[ETH_TYPE_IPV4])),
    prereq!(TcpSrc, IpProto, Require::OneOf(&[IP_PROTO_TCP])),
    prereq!(TcpDst, IpProto, Require::OneOf(&[IP_PROTO_TCP])),
    prereq!(UdpSrc, IpProto, Require::OneOf(&[IP_PROTO_UDP])),
    prereq!(UdpDst, IpProto, Require::OneOf(&[IP_PROTO_UDP])),
    prereq!(SctpSrc, IpProto, Require::OneOf(&[IP_PROTO_SCTP])),
    prereq!(SctpDst, IpProto, Require::OneOf(&[IP_PROTO_SCTP])),
    prereq!(Icmpv4Type, IpProto, Require::OneOf(&[IP_PROTO_ICMP])),
    prereq!(Icmpv4Code, IpProto, Require::OneOf(&[IP_PROTO_ICMP])),
    prereq!(ArpOp, EthType, Require::OneOf(&[ETH_TYPE_ARP])),
    prereq!(ArpSpa, EthType, Require::OneOf(&[ETH_TYPE_ARP])),
    prereq!(ArpTpa, EthType, Require::OneOf(&[ETH_TYPE_ARP])),
    prereq!(ArpSha, EthType, Require::OneOf(&[ETH_TYPE_ARP])),
    prereq!(ArpTha, EthType, Require::OneOf(&[ETH_TYPE_ARP])),
    prereq!(Ipv6Src, EthType, Require::OneOf(&[ETH_TYPE_IPV6])),
    prereq!(Ipv6Dst, EthType, Require::OneOf(&[ETH_TYPE_IPV6])),
    prereq!(Ipv6Flabel, EthType, Require::OneOf(&[ETH_TYPE_IPV6])),
    prereq!(Icmpv6Type, IpProto, Require::OneOf(&[IP_PROTO_ICMPV6])),
    prereq!(Icmpv6Code, IpProto, Require::OneOf(&[IP_PROTO_ICMPV6])),
    prereq!(Ipv6NdTarget, Icmpv6Type, Require::OneOf(&[ICMPV6_ND_SOLICIT, ICMPV6_ND_ADVERT])),
    prereq!(Ipv6NdSll, Icmpv6Type, Require::OneOf(&[ICMPV6_ND_SOLICIT])),
    prereq!(Ipv6NdTll, Icmpv6Type, Require::OneOf(&[ICMPV6_ND_ADVERT])),
    prereq!(MplsLabel, EthType, Require::OneOf(MPLS_ETH_TYPES)),
    prereq!(MplsTc, EthType, Require::OneOf(MPLS_ETH_TYPES)),
    prereq!(MplsBos, EthType, Require::OneOf(MPLS_ETH_TYPES)),
    prereq!(PbbIsid, EthType, Require::OneOf(&[ETH_TYPE_PBB])),
    prereq!(Ipv6Exthdr, EthType, Require::OneOf(&[ETH_TYPE_IPV6])),
];

macro_rules! uint_accessors {
    ($($typ:ident => $get:ident, $set:ident, $t:ty;)*) => {
        $(
            pub fn $get(&self) -> Result<$t> {
                Ok(self.uint_field(OxmType::$typ)? as $t)
            }

            pub fn $set(&mut self, value: $t) -> Result<&mut Match> {
                self.set_uint_field(OxmType::$typ, value as u64)
            }
        )*
    };
}

macro_rules! uint_mask_accessors {
    ($($typ:ident => $get_mask:ident, $set_masked:ident, $t:ty;)*) => {
        $(
            /// Mask of the field; all ones when the field is unmasked.
            pub fn $get_mask(&self) -> Result<$t> {
                Ok(self.uint_mask(OxmType::$typ)? as $t)
            }

            pub fn $set_masked(&mut self, value: $t, mask: $t) -> Result<&mut Match> {
                self.set_uint_field_masked(OxmType::$typ, value as u64, mask as u64)
            }
        )*
    };
}

macro_rules! ipv4_accessors {
    ($($typ:ident => $get:ident, $get_mask:ident, $set:ident, $set_masked:ident;)*) => {
        $(
            pub fn $get(&self) -> Result<Ipv4Addr> {
                Ok(Ipv4Addr::from(self.uint_field(OxmType::$typ)? as u32))
            }

            pub fn $get_mask(&self) -> Result<Ipv4Addr> {
                Ok(Ipv4Addr::from(self.uint_mask(OxmType::$typ)? as u32))
            }

            pub fn $set(&mut self, addr: Ipv4Addr) -> Result<&mut Match> {
                self.set_uint_field(OxmType::$typ, u32::from(addr) as u64)
            }

            pub fn $set_masked(&mut self, addr: Ipv4Addr, mask: Ipv4Addr) -> Result<&mut Match> {
                self.set_uint_field_masked(
                    OxmType::$typ,
                    u32::from(addr) as u64,
                    u32::from(mask) as u64,
                )
            }
        )*
    };
}

macro_rules! mac_accessors {
    ($($typ:ident => $get:ident, $set:ident;)*) => {
        $(
            pub fn $get(&self) -> Result<[u8; 6]> {
                Ok(bytes_of_mac(self.uint_field(OxmType::$typ)?))
            }

            pub fn $set(&mut self, mac: [u8; 6]) -> Result<&mut Match> {
                self.set_field(OxmField::mac(OxmType::$typ, mac, None)?)
            }
        )*
    };
}

macro_rules! mac_mask_accessors {
    ($($typ:ident => $get_mask:ident, $set_masked:ident;)*) => {
        $(
            pub fn $get_mask(&self) -> Result<[u8; 6]> {
                Ok(bytes_of_mac(self.uint_mask(OxmType::$typ)?))
            }

            pub fn $set_masked(&mut self, mac: [u8; 6], mask: [u8; 6]) -> Result<&mut Match> {
                self.set_field(OxmField::mac(OxmType::$typ, mac, Some(mask))?)
            }
        )*
    };
}

macro_rules! ipv6_accessors {
    ($($typ:ident => $get:ident, $set:ident;)*) => {
        $(
            pub fn $get(&self) -> Result<Ipv6Addr> {
                let value = self.field(OxmType::$typ)?.value();
                let octets = <[u8; 16]>::try_from(value)
                    .map_err(|_| OfpError::bad_length("ipv6 address", value.len(), 16))?;
                Ok(Ipv6Addr::from(octets))
            }

            pub fn $set(&mut self, addr: Ipv6Addr) -> Result<&mut Match> {
                self.set_field(OxmField::ipv6(OxmType::$typ, addr, None)?)
            }
        )*
    };
}

macro_rules! ipv6_mask_accessors {
    ($($typ:ident => $get_mask:ident, $set_masked:ident;)*) => {
        $(
            pub fn $get_mask(&self) -> Result<Ipv6Addr> {
                let octets = match self.field(OxmType::$typ)?.mask() {
                    Some(m) => <[u8; 16]>::try_from(m)
                        .map_err(|_| OfpError::bad_length("ipv6 mask", m.len(), 16))?,
                    None => [0xff; 16],
                };
                Ok(Ipv6Addr::from(octets))
            }

            pub fn $set_masked(&mut self, addr: Ipv6Addr, mask: Ipv6Addr) -> Result<&mut Match> {
                self.set_field(OxmField::ipv6(OxmType::$typ, addr, Some(mask))?)
            }
        )*
    };
}

/// Fields to match against flows, held as an `OxmList` for every version.
/// The 1.0 wildcard bitmap is derived from which fields are present.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Match {
    version: OfpVersion,
    oxms: OxmList,
}

impl Match {
    pub fn new(version: OfpVersion) -> Match {
        Match {
            version,
            oxms: OxmList::new(),
        }
    }

    pub fn oxm_list(&self) -> &OxmList {
        &self.oxms
    }

    pub fn oxm_list_mut(&mut self) -> &mut OxmList {
        &mut self.oxms
    }

    pub fn clear(&mut self) {
        self.oxms.clear();
    }

    pub fn has(&self, typ: OxmType) -> bool {
        self.oxms.has_type(typ)
    }

    /// Drop a field from the match. Returns the removed field, if any.
    pub fn remove(&mut self, typ: OxmType) -> Option<OxmField> {
        self.oxms.remove_type(typ)
    }

    fn check_field(&self, typ: OxmType) -> Result<()> {
        if typ.supported_in(self.version) {
            Ok(())
        } else {
            Err(OfpError::bad_version(
                self.version,
                format!("match field {}", typ),
            ))
        }
    }

    /// Return the field of the given type, `NotFound` when absent.
    pub fn field(&self, typ: OxmType) -> Result<&OxmField> {
        self.check_field(typ)?;
        self.oxms.get_type(typ)
    }

    /// Insert or replace a field. Basic fields must be valid in the match
    /// version and have their fixed width.
    pub fn set_field(&mut self, field: OxmField) -> Result<&mut Match> {
        if let Some(typ) = field.oxm_type() {
            self.check_field(typ)?;
            if self.version == OfpVersion::Of10 {
                check_of10_mask(typ, &field)?;
            }
        } else if !self.version.is_oxm() {
            return Err(OfpError::bad_version(self.version, "non-basic OXM class"));
        }
        self.oxms.insert(field)?;
        Ok(self)
    }

    fn uint_field(&self, typ: OxmType) -> Result<u64> {
        Ok(self.field(typ)?.uint_value())
    }

    fn uint_mask(&self, typ: OxmType) -> Result<u64> {
        Ok(self.field(typ)?.uint_mask())
    }

    fn set_uint_field(&mut self, typ: OxmType, value: u64) -> Result<&mut Match> {
        self.set_field(OxmField::from_uint(typ, value))
    }

    fn set_uint_field_masked(&mut self, typ: OxmType, value: u64, mask: u64) -> Result<&mut Match> {
        self.set_field(OxmField::from_uint_masked(typ, value, mask)?)
    }

    uint_accessors! {
        InPort => in_port, set_in_port, u32;
        InPhyPort => in_phy_port, set_in_phy_port, u32;
        Metadata => metadata, set_metadata, u64;
        EthType => eth_type, set_eth_type, u16;
        VlanVid => vlan_vid, set_vlan_vid, u16;
        VlanPcp => vlan_pcp, set_vlan_pcp, u8;
        IpDscp => ip_dscp, set_ip_dscp, u8;
        IpEcn => ip_ecn, set_ip_ecn, u8;
        IpProto => ip_proto, set_ip_proto, u8;
        TcpSrc => tcp_src, set_tcp_src, u16;
        TcpDst => tcp_dst, set_tcp_dst, u16;
        UdpSrc => udp_src, set_udp_src, u16;
        UdpDst => udp_dst, set_udp_dst, u16;
        SctpSrc => sctp_src, set_sctp_src, u16;
        SctpDst => sctp_dst, set_sctp_dst, u16;
        Icmpv4Type => icmpv4_type, set_icmpv4_type, u8;
        Icmpv4Code => icmpv4_code, set_icmpv4_code, u8;
        ArpOp => arp_opcode, set_arp_opcode, u16;
        Ipv6Flabel => ipv6_flabel, set_ipv6_flabel, u32;
        Icmpv6Type => icmpv6_type, set_icmpv6_type, u8;
        Icmpv6Code => icmpv6_code, set_icmpv6_code, u8;
        MplsLabel => mpls_label, set_mpls_label, u32;
        MplsTc => mpls_tc, set_mpls_tc, u8;
        MplsBos => mpls_bos, set_mpls_bos, u8;
        PbbIsid => pbb_isid, set_pbb_isid, u32;
        TunnelId => tunnel_id, set_tunnel_id, u64;
        Ipv6Exthdr => ipv6_exthdr, set_ipv6_exthdr, u16;
    }

    uint_mask_accessors! {
        Metadata => metadata_mask, set_metadata_masked, u64;
        VlanVid => vlan_vid_mask, set_vlan_vid_masked, u16;
        Ipv6Flabel => ipv6_flabel_mask, set_ipv6_flabel_masked, u32;
        PbbIsid => pbb_isid_mask, set_pbb_isid_masked, u32;
        TunnelId => tunnel_id_mask, set_tunnel_id_masked, u64;
        Ipv6Exthdr => ipv6_exthdr_mask, set_ipv6_exthdr_masked, u16;
    }

    ipv4_accessors! {
        Ipv4Src => ipv4_src, ipv4_src_mask, set_ipv4_src, set_ipv4_src_masked;
        Ipv4Dst => ipv4_dst, ipv4_dst_mask, set_ipv4_dst, set_ipv4_dst_masked;
        ArpSpa => arp_spa, arp_spa_mask, set_arp_spa, set_arp_spa_masked;
        ArpTpa => arp_tpa, arp_tpa_mask, set_arp_tpa, set_arp_tpa_masked;
    }

    mac_accessors! {
        EthDst => eth_dst, set_eth_dst;
        EthSrc => eth_src, set_eth_src;
        ArpSha => arp_sha, set_arp_sha;
        ArpTha => arp_tha, set_arp_tha;
        Ipv6NdSll => ipv6_nd_sll, set_ipv6_nd_sll;
        Ipv6NdTll => ipv6_nd_tll, set_ipv6_nd_tll;
    }

    mac_mask_accessors! {
        EthDst => eth_dst_mask, set_eth_dst_masked;
        EthSrc => eth_src_mask, set_eth_src_masked;
        ArpSha => arp_sha_mask, set_arp_sha_masked;
        ArpTha => arp_tha_mask, set_arp_tha_masked;
    }

    ipv6_accessors! {
        Ipv6Src => ipv6_src, set_ipv6_src;
        Ipv6Dst => ipv6_dst, set_ipv6_dst;
        Ipv6NdTarget => ipv6_nd_target, set_ipv6_nd_target;
    }

    ipv6_mask_accessors! {
        Ipv6Src => ipv6_src_mask, set_ipv6_src_masked;
        Ipv6Dst => ipv6_dst_mask, set_ipv6_dst_masked;
    }

    /// Validate OpenFlow's field dependency rules (e.g. ARP fields need
    /// eth_type 0x0806).
    pub fn check_prerequisites(&self) -> Result<()> {
        for p in PREREQUISITES {
            if !self.oxms.has_type(p.field) {
                continue;
            }
            let required = self.oxms.get_type(p.requires).ok();
            let ok = match (required, &p.rule) {
                (None, _) => false,
                (Some(_), Require::Present) => true,
                (Some(f), Require::OneOf(values)) => {
                    !f.has_mask() && values.contains(&f.uint_value())
                }
                (Some(f), Require::NotEqual(v)) => f.uint_value() != *v,
            };
            if !ok {
                let requires = match p.rule {
                    Require::Present => format!("{} present", p.requires),
                    Require::OneOf(values) => format!(
                        "{} in [{}]",
                        p.requires,
                        values
                            .iter()
                            .map(|v| format!("0x{:x}", v))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    Require::NotEqual(v) => format!("{} != 0x{:x}", p.requires, v),
                };
                return Err(OfpError::BadPrerequisite {
                    field: p.field.name().to_string(),
                    requires,
                });
            }
        }
        Ok(())
    }

    /// See `OxmList::contains`.
    pub fn contains(&self, other: &Match, strict: bool) -> bool {
        self.oxms.contains(&other.oxms, strict)
    }

    /// See `OxmList::is_part_of`.
    pub fn is_part_of(&self, other: &Match) -> PartOf {
        self.oxms.is_part_of(&other.oxms)
    }

    fn marshal_of10(&self, bytes: &mut Vec<u8>) -> Result<()> {
        for f in &self.oxms {
            match f.oxm_type() {
                Some(t) if t.in_of10_match() => check_of10_mask(t, f)?,
                Some(t) => {
                    return Err(OfpError::bad_version(
                        OfpVersion::Of10,
                        format!("match field {}", t),
                    ))
                }
                None => {
                    return Err(OfpError::bad_version(OfpVersion::Of10, "non-basic OXM class"))
                }
            }
        }

        let opt = |t: OxmType| self.oxms.get_type(t).ok();
        let either = |a: OxmType, b: OxmType| opt(a).or_else(|| opt(b));
        let any = |ts: &[OxmType]| ts.iter().filter_map(|t| opt(*t)).next();

        let mut wildcards = OFPFW_ALL as u64;
        let clear = |w: u64, b: u64, present: bool| bit(b, w, !present);

        let in_port = opt(OxmType::InPort);
        wildcards = clear(wildcards, OFPFW_IN_PORT, in_port.is_some());
        let eth_src = opt(OxmType::EthSrc);
        wildcards = clear(wildcards, OFPFW_DL_SRC, eth_src.is_some());
        let eth_dst = opt(OxmType::EthDst);
        wildcards = clear(wildcards, OFPFW_DL_DST, eth_dst.is_some());
        let vlan = opt(OxmType::VlanVid);
        wildcards = clear(wildcards, OFPFW_DL_VLAN, vlan.is_some());
        let vlan_pcp = opt(OxmType::VlanPcp);
        wildcards = clear(wildcards, OFPFW_DL_VLAN_PCP, vlan_pcp.is_some());
        let eth_type = opt(OxmType::EthType);
        wildcards = clear(wildcards, OFPFW_DL_TYPE, eth_type.is_some());
        let dscp = opt(OxmType::IpDscp);
        wildcards = clear(wildcards, OFPFW_NW_TOS, dscp.is_some());
        let nw_proto = either(OxmType::IpProto, OxmType::ArpOp);
        wildcards = clear(wildcards, OFPFW_NW_PROTO, nw_proto.is_some());
        let tp_src = any(&[
            OxmType::TcpSrc,
            OxmType::UdpSrc,
            OxmType::SctpSrc,
            OxmType::Icmpv4Type,
        ]);
        wildcards = clear(wildcards, OFPFW_TP_SRC, tp_src.is_some());
        let tp_dst = any(&[
            OxmType::TcpDst,
            OxmType::UdpDst,
            OxmType::SctpDst,
            OxmType::Icmpv4Code,
        ]);
        wildcards = clear(wildcards, OFPFW_TP_DST, tp_dst.is_some());

        let mut wildcards = wildcards as u32;
        let nw_src = either(OxmType::Ipv4Src, OxmType::ArpSpa);
        if let Some(f) = nw_src {
            wildcards = set_nw_wildcard(wildcards, OFPFW_NW_SRC_SHIFT, f.uint_mask() as u32);
        }
        let nw_dst = either(OxmType::Ipv4Dst, OxmType::ArpTpa);
        if let Some(f) = nw_dst {
            wildcards = set_nw_wildcard(wildcards, OFPFW_NW_DST_SHIFT, f.uint_mask() as u32);
        }

        let mac = |f: Option<&OxmField>| f.map_or([0; 6], |f| bytes_of_mac(f.uint_value()));
        let uint = |f: Option<&OxmField>| f.map_or(0, |f| f.uint_value());

        bytes.write_u32::<BigEndian>(wildcards)?;
        bytes.write_u16::<BigEndian>(in_port.map_or(0, |f| port_to_of10(f.uint_value() as u32)))?;
        bytes.extend_from_slice(&mac(eth_src));
        bytes.extend_from_slice(&mac(eth_dst));
        let dl_vlan = match vlan {
            Some(f) if f.uint_value() as u16 == OFPVID_NONE => OFP10_VLAN_NONE,
            Some(f) => f.uint_value() as u16 & 0x0fff,
            None => 0,
        };
        bytes.write_u16::<BigEndian>(dl_vlan)?;
        bytes.write_u8(uint(vlan_pcp) as u8)?;
        write_padding_bytes(bytes, 1);
        bytes.write_u16::<BigEndian>(uint(eth_type) as u16)?;
        bytes.write_u8((uint(dscp) as u8) << 2)?;
        bytes.write_u8(uint(nw_proto) as u8)?;
        write_padding_bytes(bytes, 2);
        bytes.write_u32::<BigEndian>(uint(nw_src) as u32)?;
        bytes.write_u32::<BigEndian>(uint(nw_dst) as u32)?;
        bytes.write_u16::<BigEndian>(uint(tp_src) as u16)?;
        bytes.write_u16::<BigEndian>(uint(tp_dst) as u16)?;
        Ok(())
    }

    fn unpack_of10(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() < OFP10_MATCH_LENGTH {
            return Err(OfpError::bad_length("ofp10_match", buf.len(), OFP10_MATCH_LENGTH));
        }
        let mut bytes = Cursor::new(buf);
        let w = bytes.read_u32::<BigEndian>()? as u64;
        let in_port = bytes.read_u16::<BigEndian>()?;
        let mut dl_src = [0; 6];
        std::io::Read::read_exact(&mut bytes, &mut dl_src)?;
        let mut dl_dst = [0; 6];
        std::io::Read::read_exact(&mut bytes, &mut dl_dst)?;
        let dl_vlan = bytes.read_u16::<BigEndian>()?;
        let dl_vlan_pcp = bytes.read_u8()?;
        bytes.read_u8()?;
        let dl_type = bytes.read_u16::<BigEndian>()?;
        let nw_tos = bytes.read_u8()?;
        let nw_proto = bytes.read_u8()?;
        bytes.read_u16::<BigEndian>()?;
        let nw_src = bytes.read_u32::<BigEndian>()?;
        let nw_dst = bytes.read_u32::<BigEndian>()?;
        let tp_src = bytes.read_u16::<BigEndian>()?;
        let tp_dst = bytes.read_u16::<BigEndian>()?;

        let oxms = &mut self.oxms;
        if !test_bit(OFPFW_IN_PORT, w) {
            oxms.insert(OxmField::from_uint(OxmType::InPort, port_from_of10(in_port) as u64))?;
        }
        if !test_bit(OFPFW_DL_SRC, w) {
            oxms.insert(OxmField::from_uint(OxmType::EthSrc, mac_of_bytes(dl_src)))?;
        }
        if !test_bit(OFPFW_DL_DST, w) {
            oxms.insert(OxmField::from_uint(OxmType::EthDst, mac_of_bytes(dl_dst)))?;
        }
        if !test_bit(OFPFW_DL_VLAN, w) {
            let vid = if dl_vlan == OFP10_VLAN_NONE {
                OFPVID_NONE
            } else {
                (dl_vlan & 0x0fff) | OFPVID_PRESENT
            };
            oxms.insert(OxmField::from_uint(OxmType::VlanVid, vid as u64))?;
        }
        if !test_bit(OFPFW_DL_VLAN_PCP, w) {
            oxms.insert(OxmField::from_uint(OxmType::VlanPcp, dl_vlan_pcp as u64))?;
        }
        let is_arp = !test_bit(OFPFW_DL_TYPE, w) && dl_type as u64 == ETH_TYPE_ARP;
        if !test_bit(OFPFW_DL_TYPE, w) {
            oxms.insert(OxmField::from_uint(OxmType::EthType, dl_type as u64))?;
        }
        if !test_bit(OFPFW_NW_TOS, w) {
            oxms.insert(OxmField::from_uint(OxmType::IpDscp, (nw_tos >> 2) as u64))?;
        }
        let ip_proto = if test_bit(OFPFW_NW_PROTO, w) {
            None
        } else if is_arp {
            oxms.insert(OxmField::from_uint(OxmType::ArpOp, nw_proto as u64))?;
            None
        } else {
            oxms.insert(OxmField::from_uint(OxmType::IpProto, nw_proto as u64))?;
            Some(nw_proto as u64)
        };

        let (src_type, dst_type) = if is_arp {
            (OxmType::ArpSpa, OxmType::ArpTpa)
        } else {
            (OxmType::Ipv4Src, OxmType::Ipv4Dst)
        };
        if let Some(f) = nw_field_of10(src_type, nw_src, (w as u32) >> OFPFW_NW_SRC_SHIFT)? {
            oxms.insert(f)?;
        }
        if let Some(f) = nw_field_of10(dst_type, nw_dst, (w as u32) >> OFPFW_NW_DST_SHIFT)? {
            oxms.insert(f)?;
        }

        // a wildcarded nw_proto keeps the TCP reading of tp_src/tp_dst
        let tp_types = match ip_proto {
            _ if is_arp => None,
            Some(IP_PROTO_ICMP) => Some((OxmType::Icmpv4Type, OxmType::Icmpv4Code)),
            Some(IP_PROTO_UDP) => Some((OxmType::UdpSrc, OxmType::UdpDst)),
            Some(IP_PROTO_SCTP) => Some((OxmType::SctpSrc, OxmType::SctpDst)),
            Some(IP_PROTO_TCP) | None => Some((OxmType::TcpSrc, OxmType::TcpDst)),
            Some(proto) => {
                debug!("ignoring tp_src/tp_dst for ip proto {}", proto);
                None
            }
        };
        if let Some((src_type, dst_type)) = tp_types {
            if !test_bit(OFPFW_TP_SRC, w) {
                oxms.insert(OxmField::from_uint(src_type, tp_src as u64))?;
            }
            if !test_bit(OFPFW_TP_DST, w) {
                oxms.insert(OxmField::from_uint(dst_type, tp_dst as u64))?;
            }
        }
        Ok(())
    }

    fn unpack_oxm(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() < OXM_MATCH_HEADER_LENGTH {
            return Err(OfpError::bad_length(
                "ofp_match header",
                buf.len(),
                OXM_MATCH_HEADER_LENGTH,
            ));
        }
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if typ != OFPMT_OXM {
            return Err(OfpError::bad_version(self.version, format!("match type {}", typ)));
        }
        if len < OXM_MATCH_HEADER_LENGTH || len > buf.len() {
            return Err(OfpError::bad_length("ofp_match", len, buf.len()));
        }
        if pad_to_8(len) > buf.len() {
            return Err(OfpError::bad_length("ofp_match padding", buf.len(), pad_to_8(len)));
        }
        self.oxms.unpack(&buf[OXM_MATCH_HEADER_LENGTH..len])?;
        debug!("unpacked {} oxm field(s) from match of length {}", self.oxms.len(), len);
        Ok(())
    }
}

/// Only CIDR masks on the IPv4 style addresses have a 1.0 encoding.
fn check_of10_mask(typ: OxmType, field: &OxmField) -> Result<()> {
    if !field.has_mask() {
        return Ok(());
    }
    match typ {
        OxmType::Ipv4Src | OxmType::Ipv4Dst | OxmType::ArpSpa | OxmType::ArpTpa => {
            let mask = field.uint_mask() as u32;
            if mask == mask_of_prefix(prefix_len(mask)) {
                Ok(())
            } else {
                Err(OfpError::bad_version(
                    OfpVersion::Of10,
                    format!("non-CIDR mask 0x{:08x} on {}", mask, typ),
                ))
            }
        }
        _ => Err(OfpError::bad_version(
            OfpVersion::Of10,
            format!("masked match field {}", typ),
        )),
    }
}

fn set_nw_wildcard(wildcards: u32, shift: u32, mask: u32) -> u32 {
    let ignored = 32 - prefix_len(mask);
    (wildcards & !(OFPFW_NW_MASK_BITS << shift)) | (ignored << shift)
}

fn nw_field_of10(typ: OxmType, addr: u32, bits: u32) -> Result<Option<OxmField>> {
    let ignored = bits & OFPFW_NW_MASK_BITS;
    if ignored >= 32 {
        return Ok(None);
    }
    let addr = Ipv4Addr::from(addr);
    let mask = if ignored == 0 {
        None
    } else {
        Some(Ipv4Addr::from(mask_of_prefix(32 - ignored)))
    };
    OxmField::ipv4(typ, addr, mask).map(Some)
}

impl Versioned for Match {
    fn version(&self) -> OfpVersion {
        self.version
    }

    fn set_version(&mut self, version: OfpVersion) {
        self.version = version;
    }
}

impl OfpWire for Match {
    fn length(&self) -> usize {
        match self.version {
            OfpVersion::Of10 => OFP10_MATCH_LENGTH,
            OfpVersion::Of12 | OfpVersion::Of13 => {
                pad_to_8(OXM_MATCH_HEADER_LENGTH + self.oxms.length())
            }
            OfpVersion::Unknown => 0,
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        match self.version {
            OfpVersion::Of10 => self.marshal_of10(bytes),
            OfpVersion::Of12 | OfpVersion::Of13 => {
                let len = OXM_MATCH_HEADER_LENGTH + self.oxms.length();
                if len > u16::max_value() as usize {
                    return Err(OfpError::bad_length("ofp_match", len, u16::max_value() as usize));
                }
                bytes.write_u16::<BigEndian>(OFPMT_OXM)?;
                bytes.write_u16::<BigEndian>(len as u16)?;
                self.oxms.marshal(bytes)?;
                write_padding_bytes(bytes, pad_to_8(len) - len);
                Ok(())
            }
            OfpVersion::Unknown => Err(OfpError::bad_version(self.version, "match")),
        }
    }

    fn unpack(&mut self, buf: &[u8]) -> Result<()> {
        self.oxms.clear();
        match self.version {
            OfpVersion::Of10 => self.unpack_of10(buf),
            OfpVersion::Of12 | OfpVersion::Of13 => self.unpack_oxm(buf),
            OfpVersion::Unknown => Err(OfpError::bad_version(self.version, "match")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_oxm_match_is_padded() {
        let m = Match::new(OfpVersion::Of13);
        assert_eq!(m.length(), 8);
        assert_eq!(m.to_bytes().unwrap(), vec![0, 1, 0, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn oxm_match_round_trip() {
        let mut m = Match::new(OfpVersion::Of12);
        m.set_eth_type(0x0800).unwrap();
        m.set_ipv4_dst_masked(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 0, 0))
            .unwrap();
        m.set_in_port(3).unwrap();
        // 4 + 6 + 12 + 8 = 30, padded to 32
        assert_eq!(m.length(), 32);
        let bytes = m.to_bytes().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..4], &[0, 1, 0, 30]);

        let mut back = Match::new(OfpVersion::Of12);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.ipv4_dst().unwrap(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(back.ipv4_dst_mask().unwrap(), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn absent_field_is_not_found() {
        let m = Match::new(OfpVersion::Of13);
        let err = m.eth_dst().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn version_restricted_accessors() {
        let mut m = Match::new(OfpVersion::Of10);
        assert!(matches!(
            m.set_ipv6_src(Ipv6Addr::LOCALHOST),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(matches!(m.ipv6_src(), Err(OfpError::BadVersion { .. })));
        let mut m = Match::new(OfpVersion::Of12);
        assert!(matches!(m.set_pbb_isid(7), Err(OfpError::BadVersion { .. })));
        let mut m = Match::new(OfpVersion::Of13);
        m.set_pbb_isid(0x00ab_cdef).unwrap();
        assert_eq!(m.pbb_isid().unwrap(), 0x00ab_cdef);
    }

    #[test]
    fn of10_wildcard_synthesis() {
        let mut m = Match::new(OfpVersion::Of10);
        m.set_in_port(6).unwrap();
        m.set_eth_type(0x0800).unwrap();
        m.set_ip_proto(6).unwrap();
        m.set_ipv4_src_masked(Ipv4Addr::new(192, 168, 1, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
        m.set_tcp_dst(80).unwrap();
        let bytes = m.to_bytes().unwrap();
        assert_eq!(bytes.len(), OFP10_MATCH_LENGTH);

        let wildcards = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert!(!test_bit(OFPFW_IN_PORT, wildcards as u64));
        assert!(!test_bit(OFPFW_DL_TYPE, wildcards as u64));
        assert!(!test_bit(OFPFW_NW_PROTO, wildcards as u64));
        assert!(!test_bit(OFPFW_TP_DST, wildcards as u64));
        assert!(test_bit(OFPFW_TP_SRC, wildcards as u64));
        assert!(test_bit(OFPFW_DL_SRC, wildcards as u64));
        assert_eq!((wildcards >> OFPFW_NW_SRC_SHIFT) & 0x3f, 8);
        assert_eq!((wildcards >> OFPFW_NW_DST_SHIFT) & 0x3f, 0x3f);
        assert_eq!(&bytes[4..6], &[0, 6]);
        assert_eq!(&bytes[22..24], &[0x08, 0x00]);
        assert_eq!(bytes[25], 6);
        assert_eq!(&bytes[28..32], &[192, 168, 1, 0]);
        assert_eq!(&bytes[38..40], &[0, 80]);

        let mut back = Match::new(OfpVersion::Of10);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn of10_arp_and_vlan_translation() {
        let mut m = Match::new(OfpVersion::Of10);
        m.set_eth_type(0x0806).unwrap();
        m.set_arp_opcode(1).unwrap();
        m.set_arp_tpa(Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        m.set_vlan_vid(OFPVID_PRESENT | 42).unwrap();
        let bytes = m.to_bytes().unwrap();
        assert_eq!(&bytes[18..20], &[0, 42]);

        let mut back = Match::new(OfpVersion::Of10);
        back.unpack(&bytes).unwrap();
        assert_eq!(back.arp_opcode().unwrap(), 1);
        assert_eq!(back.arp_tpa().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(back.vlan_vid().unwrap(), OFPVID_PRESENT | 42);
        assert!(back.ip_proto().unwrap_err().is_not_found());
    }

    #[test]
    fn of10_untagged_vlan() {
        let mut m = Match::new(OfpVersion::Of10);
        m.set_vlan_vid(OFPVID_NONE).unwrap();
        let bytes = m.to_bytes().unwrap();
        assert_eq!(&bytes[18..20], &[0xff, 0xff]);
        let mut back = Match::new(OfpVersion::Of10);
        back.unpack(&bytes).unwrap();
        assert_eq!(back.vlan_vid().unwrap(), OFPVID_NONE);
    }

    #[test]
    fn of10_rejects_non_cidr_mask() {
        let mut m = Match::new(OfpVersion::Of10);
        let res = m.set_ipv4_src_masked(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 0, 255, 0));
        assert!(matches!(res, Err(OfpError::BadVersion { .. })));
    }

    #[test]
    fn prerequisites() {
        let mut m = Match::new(OfpVersion::Of12);
        m.set_eth_type(0x0800).unwrap();
        m.set_ip_proto(6).unwrap();
        m.set_tcp_src(80).unwrap();
        m.check_prerequisites().unwrap();

        m.remove(OxmType::IpProto);
        assert!(matches!(
            m.check_prerequisites(),
            Err(OfpError::BadPrerequisite { .. })
        ));

        let mut m = Match::new(OfpVersion::Of13);
        m.set_eth_type(0x0800).unwrap();
        m.set_arp_spa(Ipv4Addr::new(1, 2, 3, 4)).unwrap();
        assert!(m.check_prerequisites().is_err());

        let mut m = Match::new(OfpVersion::Of13);
        m.set_eth_type(0x86dd).unwrap();
        m.set_ip_proto(58).unwrap();
        m.set_icmpv6_type(135).unwrap();
        m.set_ipv6_nd_target(Ipv6Addr::LOCALHOST).unwrap();
        m.check_prerequisites().unwrap();
        m.set_icmpv6_type(128).unwrap();
        assert!(m.check_prerequisites().is_err());
    }

    #[test]
    fn wrong_width_field_is_refused() {
        let mut m = Match::new(OfpVersion::Of13);
        let short = OxmField::new(0x8000, OxmType::Ipv6Src as u8, vec![1, 2, 3], None);
        assert!(matches!(
            m.set_field(short),
            Err(OfpError::BadLength {
                declared: 3,
                expected: 16,
                ..
            })
        ));
        assert!(m.ipv6_src().unwrap_err().is_not_found());
        assert_eq!(m.to_bytes().unwrap(), vec![0, 1, 0, 4, 0, 0, 0, 0]);

        m.set_ipv6_src_masked(Ipv6Addr::LOCALHOST, Ipv6Addr::from([0xff; 16])).unwrap();
        assert_eq!(m.ipv6_src().unwrap(), Ipv6Addr::LOCALHOST);
        assert_eq!(m.ipv6_src_mask().unwrap(), Ipv6Addr::from([0xff; 16]));
    }

    #[test]
    fn oxm_match_requires_trailing_padding() {
        let mut m = Match::new(OfpVersion::Of13);
        m.set_eth_type(0x0800).unwrap();
        let bytes = m.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);

        let mut back = Match::new(OfpVersion::Of13);
        assert!(matches!(
            back.unpack(&bytes[..10]),
            Err(OfpError::BadLength { .. })
        ));
        back.unpack(&bytes).unwrap();
        assert_eq!(back.length(), bytes.len());
        assert_eq!(back.eth_type().unwrap(), 0x0800);
    }

    #[test]
    fn of10_transport_ports_follow_nw_proto() {
        let mut m = Match::new(OfpVersion::Of10);
        m.set_eth_type(0x0800).unwrap();
        m.set_ip_proto(132).unwrap();
        m.set_sctp_dst(9899).unwrap();
        let bytes = m.to_bytes().unwrap();
        assert_eq!(&bytes[38..40], &[0x26, 0xab]);
        let mut back = Match::new(OfpVersion::Of10);
        back.unpack(&bytes).unwrap();
        assert_eq!(back, m);
        assert!(back.tcp_dst().unwrap_err().is_not_found());

        // GRE has no ports; tp_dst is dropped
        let mut gre = bytes.clone();
        gre[25] = 47;
        back.unpack(&gre).unwrap();
        assert_eq!(back.ip_proto().unwrap(), 47);
        assert!(back.sctp_dst().unwrap_err().is_not_found());
        assert!(back.tcp_dst().unwrap_err().is_not_found());

        // nw_proto wildcarded: ports read as TCP
        let mut m = Match::new(OfpVersion::Of10);
        m.set_tcp_dst(80).unwrap();
        back.unpack(&m.to_bytes().unwrap()).unwrap();
        assert_eq!(back.tcp_dst().unwrap(), 80);
    }

    #[test]
    fn bad_match_type() {
        let mut m = Match::new(OfpVersion::Of13);
        assert!(matches!(
            m.unpack(&[0, 0, 0, 4, 0, 0, 0, 0]),
            Err(OfpError::BadVersion { .. })
        ));
        assert!(matches!(
            m.unpack(&[0, 1, 0, 12, 0, 0, 0, 0]),
            Err(OfpError::BadLength { .. })
        ));
    }
}
