use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;

/// Byte-level contract shared by every OpenFlow structure in this crate.
///
/// `length()` is the exact number of bytes `marshal` appends, header and
/// mandatory padding included; after a successful `unpack` it equals the
/// number of bytes consumed.
///
/// Instances are plain values with no interior locking. Share one between
/// threads only behind external synchronization.
pub trait OfpWire {
    /// Return the byte-size of this structure on the wire.
    fn length(&self) -> usize;

    /// Append the wire representation to `bytes`.
    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()>;

    /// Replace the contents of `self` with the structure encoded in `buf`.
    fn unpack(&mut self, buf: &[u8]) -> Result<()>;

    /// Write the wire representation to the front of `buf`, returning the
    /// number of bytes written.
    fn pack(&self, buf: &mut [u8]) -> Result<usize> {
        let needed = self.length();
        if buf.len() < needed {
            return Err(OfpError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }
        let mut bytes = Vec::with_capacity(needed);
        self.marshal(&mut bytes)?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Return a freshly allocated buffer holding the wire representation.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.length());
        self.marshal(&mut bytes)?;
        Ok(bytes)
    }
}

/// Structures whose layout depends on the protocol version.
pub trait Versioned {
    fn version(&self) -> OfpVersion;
    /// Containers propagate the new version to every item they own.
    fn set_version(&mut self, version: OfpVersion);
}
