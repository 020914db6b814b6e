//! Terminal transport on UNIX through MIO.  The terminal is either
//! the process's own TTY on stdin/stdout, or a serial device opened
//! by path.  Output is written non-blocking: a write that would
//! block is reported back so that the caller can hold data until
//! writable readiness arrives.  Hangup and termination signals come
//! in through a pipe.

use crate::terminal::Terminal;
use libc::{c_int, c_void, size_t};
use signal_hook::SigId;
use stakker::{call, fwd_do, Actor, Core};
use stakker_mio::mio::Interest;
use stakker_mio::{FdSource, MioPoll, MioSource};
use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Result};
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

const STDIN_FD: c_int = 0;
const STDOUT_FD: c_int = 1;

/// Where the terminal is connected and how the line is set up
#[derive(Debug, Clone)]
pub struct Port {
    /// Serial device, or `None` for stdin/stdout
    pub path: Option<PathBuf>,
    pub baud: u32,
    /// Let the kernel honour XON/XOFF from the terminal
    pub flow_control: bool,
}

pub struct Glue {
    poll: MioPoll,
    term: Actor<Terminal>,
    in_fd: c_int,
    out_fd: c_int,
    baud: Option<libc::speed_t>,
    flow_control: bool,
    // Serial device and the duplicate used for writing, closed on drop
    _files: Vec<File>,
    _read: UnixStream,
    _signal_src: MioSource<FdSource>,
    input_src: Option<MioSource<FdSource>>,
    _output_src: MioSource<FdSource>,
    sigids: Vec<SigId>,
    saved: Option<libc::termios>,
}

impl Glue {
    pub fn new(core: &mut Core, term: Actor<Terminal>, port: &Port) -> Result<Self> {
        let poll = core.anymap_get::<MioPoll>();

        let mut files = Vec::new();
        let (in_fd, out_fd, baud) = match &port.path {
            None => (STDIN_FD, STDOUT_FD, None),
            Some(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
                    .open(path)
                    .map_err(|e| Error::new(e.kind(), format!("Unable to open {}: {}", path.display(), e)))?;
                let speed = baud_speed(port.baud).ok_or_else(|| {
                    Error::new(ErrorKind::InvalidInput, format!("Unsupported baud rate {}", port.baud))
                })?;
                // A second descriptor lets reads and writes be
                // registered with the poller separately
                let dup = unsafe { libc::dup(file.as_raw_fd()) };
                if dup < 0 {
                    return Err(Error::last_os_error());
                }
                let dup = unsafe { File::from_raw_fd(dup) };
                let fds = (file.as_raw_fd(), dup.as_raw_fd(), Some(speed));
                files.push(file);
                files.push(dup);
                fds
            }
        };
        for fd in [in_fd, out_fd] {
            set_nonblocking(fd, true)?;
        }

        // Hangup or termination means the terminal has gone
        let (read, write) = UnixStream::pair()?;
        let sigids = vec![
            signal_hook::pipe::register(signal_hook::SIGHUP, write.try_clone()?)?,
            signal_hook::pipe::register(signal_hook::SIGTERM, write)?,
        ];
        read.set_nonblocking(true)?;
        let fd = read.as_raw_fd();
        let term2 = term.clone();
        let fwd = fwd_do!(move |_| {
            // Drain the pipe so that the next signal gives a new
            // Ready notification
            let mut buf = [0u8; 32];
            while 0 < unsafe { libc::read(fd, &mut buf[0] as *mut u8 as *mut _, buf.len()) } {}
            call!([term2], handle_hangup());
        });
        let signal_src = poll.add(FdSource::new(fd), Interest::READABLE, 16, fwd)?;

        let term2 = term.clone();
        let fwd = fwd_do!(move |_| call!([term2], handle_writable()));
        let output_src = poll.add(FdSource::new(out_fd), Interest::WRITABLE, 16, fwd)?;

        let mut this = Self {
            poll,
            term,
            in_fd,
            out_fd,
            baud,
            flow_control: port.flow_control,
            _files: files,
            _read: read,
            _signal_src: signal_src,
            input_src: None,
            _output_src: output_src,
            sigids,
            saved: None,
        };

        this.input(true);

        Ok(this)
    }

    /// Write as much of the data as the line will take right now.
    /// Returns the count written, which is less than the data length
    /// if the write would block.
    pub fn write_some(&mut self, data: &[u8]) -> Result<usize> {
        let mut done = 0;
        while done < data.len() {
            let rest = &data[done..];
            let cnt = unsafe {
                libc::write(self.out_fd, &rest[0] as *const _ as *const c_void, rest.len() as size_t)
            };
            if cnt < 0 {
                #[allow(unreachable_patterns)]
                match errno::errno().0 {
                    libc::EWOULDBLOCK | libc::EAGAIN => break,
                    libc::EINTR => continue,
                    _ => return Err(Error::last_os_error()),
                }
            }
            done += cnt as usize;
        }
        Ok(done)
    }

    /// Enable or disable input, switching raw mode on or off
    pub fn input(&mut self, enable: bool) {
        if enable && self.input_src.is_none() && self.termios_set_raw() {
            let fdsrc = FdSource::new(self.in_fd);
            let term = self.term.clone();
            let fwd = fwd_do!(move |_| call!([term], handle_data_in()));
            match self.poll.add(fdsrc, Interest::READABLE, 16, fwd) {
                Err(e) => call!([self.term], handle_error_in(e)),
                Ok(src) => self.input_src = Some(src),
            }
        }
        if !enable {
            // MioSource drop handler removes `mio` handler for input
            self.input_src = None;
            self.termios_restore();
        }
    }

    /// Generate a new standalone cleanup function that will make a
    /// best effort to restore the terminal to normal from the state
    /// that it's currently in, ignoring errors.  This is for use from
    /// a panic handler.
    pub fn cleanup_fn(&mut self) -> Box<dyn Fn(&[u8]) + Send + Sync + 'static> {
        let saved = self.saved;
        let (in_fd, out_fd) = (self.in_fd, self.out_fd);
        Box::new(move |reset| {
            let _ = set_nonblocking(out_fd, false);
            let _ = write_all(out_fd, reset);
            if let Some(saved) = saved {
                unsafe { libc::tcsetattr(in_fd, libc::TCSANOW, &saved as *const libc::termios) };
            };
        })
    }

    /// Read all available input into the given Vec.  End of file
    /// means the terminal has disconnected.
    pub fn read_data(&mut self, inbuf: &mut Vec<u8>) {
        let mut buf = [0u8; 64];
        loop {
            let cnt = unsafe { libc::read(self.in_fd, &mut buf[0] as *mut u8 as *mut _, buf.len()) };
            if cnt < 0 {
                #[allow(unreachable_patterns)]
                match errno::errno().0 {
                    libc::EWOULDBLOCK | libc::EAGAIN => (),
                    libc::EINTR => continue,
                    _ => call!([self.term], handle_error_in(Error::last_os_error())),
                }
                break;
            }
            if cnt == 0 {
                let err = Error::new(ErrorKind::UnexpectedEof, "Terminal disconnected");
                call!([self.term], handle_error_in(err));
                break;
            }
            inbuf.extend_from_slice(&buf[..cnt as usize]);
        }
    }

    // Set terminal into raw mode if not already in raw mode, and save
    // previous state so that it can be restored
    fn termios_set_raw(&mut self) -> bool {
        if self.saved.is_some() {
            return false;
        }

        if 0 == unsafe { libc::isatty(self.in_fd) } {
            let err = Error::new(ErrorKind::Other, "Terminal input is not a TTY");
            call!([self.term], handle_error_in(err));
            return false;
        }

        let mut tbuf = mem::MaybeUninit::uninit();
        if 0 > unsafe { libc::tcgetattr(self.in_fd, tbuf.as_mut_ptr()) } {
            let err = Error::new(Error::last_os_error().kind(), "Unable to get terminal mode");
            call!([self.term], handle_error_in(err));
            return false;
        }
        let mut tbuf = unsafe { tbuf.assume_init() };

        self.saved = Some(tbuf);
        unsafe { libc::cfmakeraw(&mut tbuf as *mut _) };
        if let Some(speed) = self.baud {
            tbuf.c_cflag |= libc::CLOCAL | libc::CREAD;
            unsafe { libc::cfsetspeed(&mut tbuf as *mut _, speed) };
        }
        if self.flow_control {
            tbuf.c_iflag |= libc::IXON | libc::IXOFF;
        }

        if 0 > unsafe { libc::tcsetattr(self.in_fd, libc::TCSANOW, &tbuf as *const libc::termios) } {
            let err = Error::new(
                Error::last_os_error().kind(),
                "Unable to set terminal raw mode",
            );
            call!([self.term], handle_error_in(err));
            return false;
        }

        true
    }

    // Restore terminal settings
    fn termios_restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            if 0 > unsafe {
                libc::tcsetattr(self.in_fd, libc::TCSANOW, &saved as *const libc::termios)
            } {
                let err = Error::new(
                    Error::last_os_error().kind(),
                    "Unable to restore terminal mode",
                );
                call!([self.term], handle_error_in(err));
            }
        }
    }
}

impl Drop for Glue {
    fn drop(&mut self) {
        // This call cleans up the UnixStream write ends
        for id in self.sigids.drain(..) {
            signal_hook::unregister(id);
        }
    }
}

fn set_nonblocking(fd: c_int, on: bool) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(Error::last_os_error());
    }
    let flags = if on {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if 0 > unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } {
        return Err(Error::last_os_error());
    }
    Ok(())
}

fn write_all(fd: c_int, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let cnt = unsafe { libc::write(fd, &data[0] as *const _ as *const c_void, data.len() as size_t) };
        if cnt < 0 {
            return Err(Error::last_os_error());
        }
        data = &data[cnt as usize..];
    }
    Ok(())
}

fn baud_speed(baud: u32) -> Option<libc::speed_t> {
    Some(match baud {
        300 => libc::B300,
        600 => libc::B600,
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115_200 => libc::B115200,
        _ => return None,
    })
}
