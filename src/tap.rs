//! The per-ogate pcap tap sink.
//!
//! A tap writes a standard pcap file header once, on open, then one pcap
//! record header per tapped packet, to a fifo the control plane supplied.
//! Writes must be non-blocking; `EPIPE` silently disables the tap on that
//! ogate, any other write error aborts only the current batch's tap writes
//! without disabling it.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{FromRawFd, RawFd};
use std::path::Path;
use std::sync::Once;

static IGNORE_SIGPIPE: Once = Once::new();

/// Writing to a fifo whose reader has gone away delivers `SIGPIPE`, whose
/// default action kills the process before the write syscall ever gets a
/// chance to return `EPIPE` to us. A tap writer has to survive a reader
/// disappearing, so this is set once, process-wide, the first time a tap is
/// opened.
fn ignore_sigpipe() {
    IGNORE_SIGPIPE.call_once(|| unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    });
}

/// Cap on the bytes written per packet record, matching pcap's own
/// `snaplen`/`caplen` split. A packet longer than this is truncated in the
/// record written to the tap; `debug_assert!` flags the truncation in
/// debug builds so a legitimately oversized frame is visible to a developer
/// without aborting a release dataplane.
pub const SNAPLEN: u32 = 65_535;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;

/// Link-layer type written into the pcap global header. `1` is `LINKTYPE_ETHERNET`.
pub const LINKTYPE_ETHERNET: u32 = 1;

/// State for a single ogate's pcap tap.
pub struct TapState {
    file: File,
    enabled: bool,
}

impl TapState {
    /// Opens `path` (a fifo supplied by the control plane) for non-blocking
    /// writes and immediately writes the pcap global header.
    pub fn open(path: impl AsRef<Path>, network: u32) -> io::Result<Self> {
        ignore_sigpipe();
        let fd = open_nonblocking(path.as_ref())?;
        let mut file = unsafe { File::from_raw_fd(fd) };
        write_global_header(&mut file, network)?;
        Ok(Self {
            file,
            enabled: true,
        })
    }

    /// Whether this tap is still accepting writes.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Writes one packet's record header and (possibly truncated) data.
    /// On `EPIPE` the tap is disabled and `Ok(())` is returned. Any other
    /// I/O error is returned to the caller, who aborts only the current
    /// batch's tap processing without disabling the tap.
    pub fn write_packet(&mut self, ts_sec: u32, ts_usec: u32, data: &[u8]) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let orig_len = data.len() as u32;
        debug_assert!(
            orig_len <= SNAPLEN,
            "tapped packet ({orig_len} bytes) exceeds SNAPLEN ({SNAPLEN})"
        );
        let incl_len = orig_len.min(SNAPLEN);
        let truncated = &data[..incl_len as usize];

        let mut header = [0u8; 16];
        header[0..4].copy_from_slice(&ts_sec.to_ne_bytes());
        header[4..8].copy_from_slice(&ts_usec.to_ne_bytes());
        header[8..12].copy_from_slice(&incl_len.to_ne_bytes());
        header[12..16].copy_from_slice(&orig_len.to_ne_bytes());

        match self.file.write_all(&header).and_then(|()| self.file.write_all(truncated)) {
            Ok(()) => Ok(()),
            Err(err) if err.raw_os_error() == Some(libc::EPIPE) => {
                self.enabled = false;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn write_global_header(file: &mut File, network: u32) -> io::Result<()> {
    let mut header = [0u8; 24];
    header[0..4].copy_from_slice(&PCAP_MAGIC.to_ne_bytes());
    header[4..6].copy_from_slice(&PCAP_VERSION_MAJOR.to_ne_bytes());
    header[6..8].copy_from_slice(&PCAP_VERSION_MINOR.to_ne_bytes());
    header[8..12].copy_from_slice(&0i32.to_ne_bytes()); // thiszone
    header[12..16].copy_from_slice(&0u32.to_ne_bytes()); // sigfigs
    header[16..20].copy_from_slice(&SNAPLEN.to_ne_bytes());
    header[20..24].copy_from_slice(&network.to_ne_bytes());
    file.write_all(&header)
}

fn open_nonblocking(path: &Path) -> io::Result<RawFd> {
    let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_WRONLY | libc::O_NONBLOCK) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn global_header_has_correct_layout() {
        let dir = std::env::temp_dir().join(format!("dplane-tap-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.pcap");

        // Use a regular file stand-in: open() with O_CREAT via a plain File
        // so the header-writing logic can be exercised without a real fifo.
        let mut file = File::create(&path).unwrap();
        write_global_header(&mut file, LINKTYPE_ETHERNET).unwrap();
        drop(file);

        let mut buf = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf.len(), 24);
        assert_eq!(u32::from_ne_bytes(buf[0..4].try_into().unwrap()), PCAP_MAGIC);
        assert_eq!(u16::from_ne_bytes(buf[4..6].try_into().unwrap()), PCAP_VERSION_MAJOR);
        assert_eq!(u16::from_ne_bytes(buf[6..8].try_into().unwrap()), PCAP_VERSION_MINOR);
        assert_eq!(u32::from_ne_bytes(buf[16..20].try_into().unwrap()), SNAPLEN);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
