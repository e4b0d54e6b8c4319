//! Lustre server-side cache advisories.
//!
//! Issues `LL_IOC_LADVISE` directly on the target descriptor, which is what
//! `llapi_ladvise()` does internally. Only meaningful on a Lustre client; on any
//! other filesystem the ioctl fails with `ENOTTY` and the failure is ignored.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::trace;

const LADVISE_MAGIC: u32 = 0x1ADF_1CE0;

/// Advice kinds understood by the Lustre OSTs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ServerAdvice {
    WillRead = 1,
    DontNeed = 2,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct LuLadvise {
    advice: u16,
    value1: u16,
    value2: u32,
    start: u64,
    end: u64,
    value3: u32,
    value4: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct LadviseHeader {
    magic: u32,
    count: u32,
    flags: u64,
    value1: u32,
    value2: u32,
    value3: u64,
}

/// Header followed by exactly one advice record.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct LadviseRequest {
    header: LadviseHeader,
    advise: [LuLadvise; 1],
}

impl LadviseRequest {
    fn new(advice: ServerAdvice, offset: u64, length: u64) -> Self {
        Self {
            header: LadviseHeader {
                magic: LADVISE_MAGIC,
                count: 1,
                ..Default::default()
            },
            advise: [LuLadvise {
                advice: advice as u16,
                start: offset,
                end: offset.saturating_add(length),
                ..Default::default()
            }],
        }
    }
}

/// Send one advisory for `[offset, offset + length)` to the server cache.
pub fn server_advise(file: &File, advice: ServerAdvice, offset: u64, length: u64) {
    let mut request = LadviseRequest::new(advice, offset, length);
    let code = nix::request_code_read!(b'f', 250, std::mem::size_of::<LuLadvise>());
    // SAFETY: the request is a fully initialized repr(C) header with one
    // trailing advice record, matching what the kernel reads for count == 1.
    let rc = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            code,
            &mut request as *mut LadviseRequest,
        )
    };
    if rc < 0 {
        trace!(
            "ladvise {:?} [{}, +{}) ignored: {}",
            advice,
            offset,
            length,
            std::io::Error::last_os_error()
        );
    }
}
