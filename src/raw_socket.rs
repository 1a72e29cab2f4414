//! `AF_PACKET` raw socket transport (Linux only).
//!
//! The socket is opened for the benchmark ethertype only, bound to a single
//! interface and driven non-blocking through tokio's [`AsyncFd`]. Opening one
//! needs `CAP_NET_RAW`; enlarging its buffers past the system limits needs
//! `CAP_NET_ADMIN`, and without it the regular limits apply.

use crate::frame::ETHERTYPE;
use crate::transport::Transport;
use crate::{Error, Result};
use log::{debug, warn};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Requested kernel send and receive buffer size in bytes
pub const SOCKET_BUFFER_SIZE: libc::c_int = 9_524_288;

/// Raw link-layer socket bound to one interface.
pub struct RawSocket {
    fd: AsyncFd<OwnedFd>,
    interface: String,
    index: u32,
}

impl RawSocket {
    /// Opens a raw socket on `interface`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the interface does not exist and
    /// [`Error::Io`] if the socket cannot be created or bound.
    pub fn open(interface: &str) -> Result<Self> {
        let index = interface_index(interface)?;

        let raw = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::c_int::from(ETHERTYPE.to_be()),
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        bind_to_interface(fd.as_raw_fd(), index)?;
        set_buffer_size(fd.as_raw_fd(), libc::SO_SNDBUFFORCE, libc::SO_SNDBUF, "send");
        set_buffer_size(fd.as_raw_fd(), libc::SO_RCVBUFFORCE, libc::SO_RCVBUF, "receive");

        let fd = AsyncFd::new(fd)?;

        Ok(Self {
            fd,
            interface: interface.to_string(),
            index,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Kernel index of the bound interface
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Transport for RawSocket {
    async fn send_frame(&self, frame: &[u8]) -> io::Result<usize> {
        self.fd
            .async_io(Interest::WRITABLE, |fd| {
                let n = unsafe {
                    libc::send(
                        fd.as_raw_fd(),
                        frame.as_ptr() as *const libc::c_void,
                        frame.len(),
                        0,
                    )
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            })
            .await
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.fd
            .async_io(Interest::READABLE, |fd| {
                let n = unsafe {
                    libc::recv(
                        fd.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                        0,
                    )
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            })
            .await
    }
}

/// Resolves an interface name to its kernel index.
///
/// # Errors
///
/// Returns [`Error::Config`] if the name is not a valid C string or no
/// interface has that name.
pub fn interface_index(interface: &str) -> Result<u32> {
    let name = CString::new(interface)
        .map_err(|_| Error::Config(format!("invalid interface name {:?}", interface)))?;
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(Error::Config(format!(
            "unknown interface {}: {}",
            interface,
            io::Error::last_os_error()
        )));
    }
    Ok(index)
}

fn bind_to_interface(fd: RawFd, index: u32) -> Result<()> {
    // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = ETHERTYPE.to_be();
    addr.sll_ifindex = index as libc::c_int;

    let rc = unsafe {
        libc::bind(
            fd,
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

fn set_int_option(fd: RawFd, option: libc::c_int, value: libc::c_int) -> io::Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            option,
            &value as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Asks for a large buffer, past the system limit when allowed to.
fn set_buffer_size(fd: RawFd, forced: libc::c_int, regular: libc::c_int, direction: &str) {
    if set_int_option(fd, forced, SOCKET_BUFFER_SIZE).is_ok() {
        debug!("{} buffer set to {} bytes", direction, SOCKET_BUFFER_SIZE);
        return;
    }
    match set_int_option(fd, regular, SOCKET_BUFFER_SIZE) {
        Ok(()) => warn!(
            "Could not force the {} buffer size, it is capped by the system limit",
            direction
        ),
        Err(e) => warn!("Could not set the {} buffer size: {}", direction, e),
    }
}
