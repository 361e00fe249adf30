mod aggregate;
mod desc;
mod flow;
mod group;
mod meter;
mod port;
mod queue;
mod table;

pub use self::aggregate::{AggregateStats, AggregateStatsRequest};
pub use self::desc::{DescStats, DESC_STR_LEN, SERIAL_NUM_LEN};
pub use self::flow::{FlowStats, FlowStatsRequest, OFPTT_ALL};
pub use self::group::{
    GroupDescStats, GroupFeaturesStats, GroupStats, GroupStatsRequest, OFPGT_ALL, OFPGT_FF,
    OFPGT_INDIRECT, OFPGT_SELECT,
};
pub use self::meter::{
    MeterBandStats, MeterBandStatsArray, MeterStats, MeterStatsRequest, OFPM_ALL,
};
pub use self::port::{PortStats, PortStatsRequest, TransmissionCounter};
pub use self::queue::{QueueStats, QueueStatsRequest, OFPQ_ALL};
pub use self::table::{TableStats, OFP_MAX_TABLE_NAME_LEN};

use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;

pub const OFPST_DESC: u16 = 0;
pub const OFPST_FLOW: u16 = 1;
pub const OFPST_AGGREGATE: u16 = 2;
pub const OFPST_TABLE: u16 = 3;
pub const OFPST_PORT: u16 = 4;
pub const OFPST_QUEUE: u16 = 5;
pub const OFPST_GROUP: u16 = 6;
pub const OFPST_GROUP_DESC: u16 = 7;
pub const OFPST_GROUP_FEATURES: u16 = 8;
pub const OFPST_METER: u16 = 9;
pub const OFPST_PORT_DESC: u16 = 13;
pub const OFPST_EXPERIMENTER: u16 = 0xffff;

/// Fail unless `buf` holds at least `needed` bytes.
fn check_length(what: &'static str, buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        Err(OfpError::bad_length(what, buf.len(), needed))
    } else {
        Ok(())
    }
}

fn require_oxm(version: OfpVersion, what: &str) -> Result<()> {
    if version.is_oxm() {
        Ok(())
    } else {
        Err(OfpError::bad_version(version, what))
    }
}
