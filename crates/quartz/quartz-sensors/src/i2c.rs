//! Minimal I2C master access through the Linux `i2c-dev` interface.
//!
//! Every transfer is a single `ioctl(I2C_RDWR)` carrying one or two messages,
//! which keeps register reads (write address, repeated start, read data)
//! atomic on the bus.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Register-level bus operations the sensor drivers need.
///
/// Implemented by [`I2cBus`] for real hardware and by in-memory fakes in tests.
pub trait RegisterBus: Send {
    fn write(&mut self, addr: u16, bytes: &[u8]) -> io::Result<()>;
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> io::Result<()>;
    /// Writes `reg`, then reads `buf.len()` bytes in the same transaction.
    fn read_register(&mut self, addr: u16, reg: u8, buf: &mut [u8]) -> io::Result<()>;

    fn write_register(&mut self, addr: u16, reg: u8, value: u8) -> io::Result<()> {
        self.write(addr, &[reg, value])
    }

    fn read_u8(&mut self, addr: u16, reg: u8) -> io::Result<u8> {
        let mut b = [0u8; 1];
        self.read_register(addr, reg, &mut b)?;
        Ok(b[0])
    }
}

/// An open `/dev/i2c-N` character device.
pub struct I2cBus {
    file: File,
}

impl I2cBus {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::io;
    use std::os::fd::AsRawFd;

    const I2C_RDWR: libc::c_ulong = 0x0707;
    pub const I2C_M_RD: u16 = 0x0001;

    // Mirrors `struct i2c_msg` from <linux/i2c.h>.
    #[repr(C)]
    pub struct I2cMsg {
        pub addr: u16,
        pub flags: u16,
        pub len: u16,
        pub buf: *mut u8,
    }

    // Mirrors `struct i2c_rdwr_ioctl_data` from <linux/i2c-dev.h>.
    #[repr(C)]
    struct I2cRdwrIoctlData {
        msgs: *mut I2cMsg,
        nmsgs: u32,
    }

    pub fn transfer(file: &std::fs::File, msgs: &mut [I2cMsg]) -> io::Result<()> {
        let mut data = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };
        // SAFETY: `data` points at `msgs`, whose buffers are live borrows for the
        // duration of the call and whose lengths match their `len` fields.
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), I2C_RDWR as _, &mut data) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn msg(addr: u16, flags: u16, buf: &mut [u8]) -> io::Result<I2cMsg> {
        let len = u16::try_from(buf.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "i2c message too long"))?;
        Ok(I2cMsg {
            addr,
            flags,
            len,
            buf: buf.as_mut_ptr(),
        })
    }
}

#[cfg(target_os = "linux")]
impl RegisterBus for I2cBus {
    fn write(&mut self, addr: u16, bytes: &[u8]) -> io::Result<()> {
        // The kernel only reads from a write message's buffer.
        let mut out = bytes.to_vec();
        let mut msgs = [sys::msg(addr, 0, &mut out)?];
        sys::transfer(&self.file, &mut msgs)
    }

    fn read(&mut self, addr: u16, buf: &mut [u8]) -> io::Result<()> {
        let mut msgs = [sys::msg(addr, sys::I2C_M_RD, buf)?];
        sys::transfer(&self.file, &mut msgs)
    }

    fn read_register(&mut self, addr: u16, reg: u8, buf: &mut [u8]) -> io::Result<()> {
        let mut reg = [reg];
        let mut msgs = [
            sys::msg(addr, 0, &mut reg)?,
            sys::msg(addr, sys::I2C_M_RD, buf)?,
        ];
        sys::transfer(&self.file, &mut msgs)
    }
}

#[cfg(not(target_os = "linux"))]
impl RegisterBus for I2cBus {
    fn write(&mut self, _addr: u16, _bytes: &[u8]) -> io::Result<()> {
        let _ = &self.file;
        Err(io::Error::new(io::ErrorKind::Unsupported, "i2c-dev requires Linux"))
    }

    fn read(&mut self, _addr: u16, _buf: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "i2c-dev requires Linux"))
    }

    fn read_register(&mut self, _addr: u16, _reg: u8, _buf: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "i2c-dev requires Linux"))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::RegisterBus;
    use std::collections::{HashMap, VecDeque};
    use std::io;

    /// Records writes and serves canned register contents.
    #[derive(Default)]
    pub struct FakeBus {
        pub writes: Vec<(u16, Vec<u8>)>,
        pub registers: HashMap<(u16, u8), Vec<u8>>,
        pub raw_reads: VecDeque<Vec<u8>>,
        pub fail: bool,
    }

    impl FakeBus {
        fn check(&self) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "nack"));
            }
            Ok(())
        }
    }

    impl RegisterBus for FakeBus {
        fn write(&mut self, addr: u16, bytes: &[u8]) -> io::Result<()> {
            self.check()?;
            self.writes.push((addr, bytes.to_vec()));
            Ok(())
        }

        fn read(&mut self, _addr: u16, buf: &mut [u8]) -> io::Result<()> {
            self.check()?;
            let data = self.raw_reads.pop_front().unwrap_or_default();
            buf.copy_from_slice(&data[..buf.len()]);
            Ok(())
        }

        fn read_register(&mut self, addr: u16, reg: u8, buf: &mut [u8]) -> io::Result<()> {
            self.check()?;
            let data = self.registers.get(&(addr, reg)).cloned().unwrap_or_default();
            for (i, b) in buf.iter_mut().enumerate() {
                *b = data.get(i).copied().unwrap_or(0);
            }
            Ok(())
        }
    }
}
