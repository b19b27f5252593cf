use core::fmt;

/// The physical memory a byte lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Medium {
    /// The local RAM of the controller running the stack.
    Local,
    /// The buffer RAM of the network interface.
    Device,
    /// An auxiliary RAM attached through a serial bus.
    Spi,
}

/// The address of a byte in one specific medium.
///
/// The offset is only meaningful together with its medium, the enum keeps the two together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// An offset into the local memory pool.
    Local(usize),
    /// An offset into the network interface memory.
    Device(usize),
    /// An offset into the serial memory.
    Spi(usize),
}

/// A window of a medium reserved for socket buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    /// The first offset of the window.
    pub base: usize,
    /// The number of bytes in the window.
    pub len: usize,
}

/// A byte addressable memory that is not directly mapped.
///
/// Implemented by the network interface for its buffer RAM and by drivers for serial RAM chips.
/// All operations are synchronous and can not fail, the caller guarantees that every access
/// lies in a region the memory handed out.
pub trait Ram {
    /// Read `buf.len()` bytes starting at `at`.
    fn read(&mut self, at: usize, buf: &mut [u8]);

    /// Write all of `data` starting at `at`.
    fn write(&mut self, at: usize, data: &[u8]);

    /// Move `len` bytes from `src` to `dst` within this memory.
    ///
    /// The regions may overlap. The default implementation stages chunks through a small local
    /// buffer, choosing the direction so that overlapping moves are correct. Devices with a
    /// copy engine should override this.
    fn move_within(&mut self, dst: usize, src: usize, len: usize) {
        let mut buffer = [0u8; STAGING];
        if dst <= src {
            let mut done = 0;
            while done < len {
                let chunk = STAGING.min(len - done);
                self.read(src + done, &mut buffer[..chunk]);
                self.write(dst + done, &buffer[..chunk]);
                done += chunk;
            }
        } else {
            let mut left = len;
            while left > 0 {
                let chunk = STAGING.min(left);
                left -= chunk;
                self.read(src + left, &mut buffer[..chunk]);
                self.write(dst + left, &buffer[..chunk]);
            }
        }
    }
}

/// Size of the local staging buffer for copies between two non-local memories.
const STAGING: usize = 16;

impl Ram for [u8] {
    fn read(&mut self, at: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self[at..at + buf.len()]);
    }

    fn write(&mut self, at: usize, data: &[u8]) {
        self[at..at + data.len()].copy_from_slice(data);
    }

    fn move_within(&mut self, dst: usize, src: usize, len: usize) {
        self.copy_within(src..src + len, dst);
    }
}

impl<T: Ram + ?Sized> Ram for &'_ mut T {
    fn read(&mut self, at: usize, buf: &mut [u8]) {
        (**self).read(at, buf)
    }

    fn write(&mut self, at: usize, data: &[u8]) {
        (**self).write(at, data)
    }

    fn move_within(&mut self, dst: usize, src: usize, len: usize) {
        (**self).move_within(dst, src, len)
    }
}

/// All mediums the socket buffers may be placed in.
///
/// The local pool is borrowed as a plain slice. The network interface is owned since the TCP
/// core also uses it for frame I/O, while the serial RAM is optional.
pub struct Memory<'a, D> {
    local: &'a mut [u8],
    device: D,
    spi: Option<&'a mut dyn Ram>,
}

impl<'a, D: Ram> Memory<'a, D> {
    /// Combine a local pool and a network interface.
    pub fn new(local: &'a mut [u8], device: D) -> Self {
        Memory {
            local,
            device,
            spi: None,
        }
    }

    /// Attach a serial RAM.
    pub fn with_spi(self, spi: &'a mut dyn Ram) -> Self {
        Memory {
            spi: Some(spi),
            ..self
        }
    }

    /// The size of the local pool.
    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Whether a serial RAM is attached.
    pub fn has_spi(&self) -> bool {
        self.spi.is_some()
    }

    /// The network interface.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The network interface, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Copy `len` bytes from `src` to `dst`.
    ///
    /// Copies within one medium use that medium's own move operation. Copies from or to local
    /// memory read or write the other medium directly, all other pairs are staged through a
    /// small local buffer.
    pub fn copy(&mut self, dst: Location, src: Location, len: usize) {
        if len == 0 {
            return;
        }

        match (dst, src) {
            (Location::Local(dst), Location::Local(src)) => {
                self.local.copy_within(src..src + len, dst)
            },
            (Location::Device(dst), Location::Device(src)) => {
                self.device.move_within(dst, src, len)
            },
            (Location::Spi(dst), Location::Spi(src)) => match self.spi.as_mut() {
                Some(spi) => spi.move_within(dst, src, len),
                None => net_debug!("copy within absent serial ram"),
            },
            (Location::Local(dst), src) => {
                let buf = &mut self.local[dst..dst + len];
                match src {
                    Location::Device(src) => self.device.read(src, buf),
                    Location::Spi(src) => match self.spi.as_mut() {
                        Some(spi) => spi.read(src, buf),
                        None => net_debug!("read from absent serial ram"),
                    },
                    Location::Local(_) => unreachable!(),
                }
            },
            (dst, Location::Local(src)) => {
                let data = &self.local[src..src + len];
                match dst {
                    Location::Device(dst) => self.device.write(dst, data),
                    Location::Spi(dst) => match self.spi.as_mut() {
                        Some(spi) => spi.write(dst, data),
                        None => net_debug!("write to absent serial ram"),
                    },
                    Location::Local(_) => unreachable!(),
                }
            },
            (Location::Device(dst), Location::Spi(src)) => match self.spi.as_mut() {
                Some(spi) => staged(&mut **spi, src, &mut self.device, dst, len),
                None => net_debug!("read from absent serial ram"),
            },
            (Location::Spi(dst), Location::Device(src)) => match self.spi.as_mut() {
                Some(spi) => staged(&mut self.device, src, &mut **spi, dst, len),
                None => net_debug!("write to absent serial ram"),
            },
        }
    }

    /// Read bytes at `src` into a caller buffer.
    pub fn read(&mut self, src: Location, buf: &mut [u8]) {
        match src {
            Location::Local(src) => buf.copy_from_slice(&self.local[src..src + buf.len()]),
            Location::Device(src) => self.device.read(src, buf),
            Location::Spi(src) => match self.spi.as_mut() {
                Some(spi) => spi.read(src, buf),
                None => net_debug!("read from absent serial ram"),
            },
        }
    }

    /// Write a caller buffer to `dst`.
    pub fn write(&mut self, dst: Location, data: &[u8]) {
        match dst {
            Location::Local(dst) => self.local[dst..dst + data.len()].copy_from_slice(data),
            Location::Device(dst) => self.device.write(dst, data),
            Location::Spi(dst) => match self.spi.as_mut() {
                Some(spi) => spi.write(dst, data),
                None => net_debug!("write to absent serial ram"),
            },
        }
    }
}

fn staged(from: &mut dyn Ram, mut src: usize, to: &mut dyn Ram, mut dst: usize, len: usize) {
    let mut buffer = [0u8; STAGING];
    let mut left = len;
    while left > 0 {
        let chunk = STAGING.min(left);
        from.read(src, &mut buffer[..chunk]);
        to.write(dst, &buffer[..chunk]);
        src += chunk;
        dst += chunk;
        left -= chunk;
    }
}

impl Location {
    /// The location at `offset` in `medium`.
    pub fn new(medium: Medium, offset: usize) -> Self {
        match medium {
            Medium::Local => Location::Local(offset),
            Medium::Device => Location::Device(offset),
            Medium::Spi => Location::Spi(offset),
        }
    }

    /// The medium of this location.
    pub fn medium(self) -> Medium {
        match self {
            Location::Local(_) => Medium::Local,
            Location::Device(_) => Medium::Device,
            Location::Spi(_) => Medium::Spi,
        }
    }

    /// The offset within the medium.
    pub fn offset(self) -> usize {
        match self {
            Location::Local(offset)
            | Location::Device(offset)
            | Location::Spi(offset) => offset,
        }
    }

    /// The location `by` bytes further into the same medium.
    pub fn add(self, by: usize) -> Self {
        Location::new(self.medium(), self.offset() + by)
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Medium::Local => f.write_str("local"),
            Medium::Device => f.write_str("device"),
            Medium::Spi => f.write_str("spi"),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{:#06x}", self.medium(), self.offset())
    }
}
