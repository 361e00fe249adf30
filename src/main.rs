use std::path::Path;

use clap::{Parser, ValueEnum};
use log::{error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use rofl_ofp::action_list::ActionList;
use rofl_ofp::bucket::BucketList;
use rofl_ofp::instruction::InstructionList;
use rofl_ofp::meter::MeterConfigArray;
use rofl_ofp::ofp_error::{OfpError, Result};
use rofl_ofp::ofp_header::OfpVersion;
use rofl_ofp::ofp_match::Match;
use rofl_ofp::ofp_message::Message;
use rofl_ofp::ofp_wire::OfpWire;
use rofl_ofp::port::PortList;
use rofl_ofp::queue::PacketQueueList;
use rofl_ofp::stats::FlowStats;

const LOG_CONFIG: &str = "log4rs.yml";
const LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l:5})} {t} - {m}{n}";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum WireVersion {
    #[value(name = "1.0")]
    Of10,
    #[value(name = "1.2")]
    Of12,
    #[value(name = "1.3")]
    Of13,
}

impl From<WireVersion> for OfpVersion {
    fn from(v: WireVersion) -> OfpVersion {
        match v {
            WireVersion::Of10 => OfpVersion::Of10,
            WireVersion::Of12 => OfpVersion::Of12,
            WireVersion::Of13 => OfpVersion::Of13,
        }
    }
}

/// What the buffer holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Kind {
    Actions,
    Instructions,
    Match,
    Buckets,
    FlowStats,
    Port,
    Meters,
    Queues,
    /// A whole message, header included.
    Message,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct HexBytes(Vec<u8>);

fn parse_hex(s: &str) -> std::result::Result<HexBytes, String> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16);
            let lo = (pair[1] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(format!("not a hex byte: {}", String::from_utf8_lossy(pair))),
            }
        })
        .collect::<std::result::Result<Vec<u8>, String>>()
        .map(HexBytes)
}

/// Decode an OpenFlow wire buffer and log what it holds.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Protocol version of the buffer.
    #[arg(value_enum, id = "wire_version", value_name = "VERSION")]
    version: WireVersion,

    #[arg(value_enum)]
    kind: Kind,

    /// Buffer as hex digits; whitespace and ':' separators are ignored.
    #[arg(value_parser = parse_hex)]
    hex: HexBytes,

    /// Console log level when no log4rs.yml is present.
    #[arg(short, long, value_name = "LEVEL", default_value = "debug")]
    log_level: LevelFilter,
}

fn init_logging(level: LevelFilter) {
    if Path::new(LOG_CONFIG).exists() {
        match log4rs::init_file(LOG_CONFIG, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("failed to load {}: {}", LOG_CONFIG, e),
        }
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("failed to install logger: {}", e);
            }
        }
        Err(e) => eprintln!("bad logger configuration: {}", e),
    }
}

fn decode<T: OfpWire + std::fmt::Debug>(mut item: T, buf: &[u8]) -> Result<()> {
    item.unpack(buf)?;
    info!("decoded {} of {} byte(s): {:?}", item.length(), buf.len(), item);
    Ok(())
}

fn run(version: OfpVersion, kind: Kind, buf: &[u8]) -> Result<()> {
    match kind {
        Kind::Actions => {
            let mut actions = ActionList::new(version);
            actions.unpack(buf)?;
            info!("{}", actions);
            Ok(())
        }
        Kind::Instructions => {
            let mut instructions = InstructionList::new(version);
            instructions.unpack(buf)?;
            info!("{}", instructions);
            Ok(())
        }
        Kind::Match => decode(Match::new(version), buf),
        Kind::Buckets => decode(BucketList::new(version), buf),
        Kind::FlowStats => decode(FlowStats::new(version), buf),
        Kind::Port => decode(PortList::new(version), buf),
        Kind::Meters => decode(MeterConfigArray::new(version), buf),
        Kind::Queues => decode(PacketQueueList::new(version), buf),
        Kind::Message => {
            let (xid, msg) = Message::from_bytes(buf)?;
            if msg.version() != version {
                return Err(OfpError::bad_version(msg.version(), format!("message for {}", version)));
            }
            info!("xid {}: {:?}", xid, msg);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    run(cli.version.into(), cli.kind, &cli.hex.0).map_err(|e| {
        error!("{}", e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positionals() {
        let cli = Cli::try_parse_from(["ofp_decode", "1.3", "flow-stats", "00:08 00 00"]).unwrap();
        assert_eq!(cli.version, WireVersion::Of13);
        assert_eq!(cli.kind, Kind::FlowStats);
        assert_eq!(cli.hex, HexBytes(vec![0, 8, 0, 0]));
        assert_eq!(cli.log_level, LevelFilter::Debug);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["ofp_decode", "1.1", "match", "00"]).is_err());
        assert!(Cli::try_parse_from(["ofp_decode", "1.0", "packet", "00"]).is_err());
        assert!(Cli::try_parse_from(["ofp_decode", "1.0", "match", "0g"]).is_err());
        assert!(Cli::try_parse_from(["ofp_decode", "1.0", "match", "000"]).is_err());
    }

    #[test]
    fn log_level_flag() {
        let cli =
            Cli::try_parse_from(["ofp_decode", "--log-level", "warn", "1.0", "actions", "0000"])
                .unwrap();
        assert_eq!(cli.log_level, LevelFilter::Warn);
        assert_eq!(cli.hex.0.len(), 2);
    }

    #[test]
    fn decodes_an_output_action() {
        let buf = [0, 0, 0, 8, 0, 6, 0, 0];
        run(OfpVersion::Of10, Kind::Actions, &buf).unwrap();
        assert!(run(OfpVersion::Of13, Kind::Message, &buf).is_err());
    }
}
