use super::{Location, Medium, Memory, Ram};

/// The geometry of a circular FIFO placed in one medium.
///
/// The ring owns `len` bytes starting at `start` but can hold at most `len - 1` of them, so that
/// an empty ring (`head == tail`) can be told apart from a full one. Indices are relative to the
/// start of the ring and always lie in `0..len`.
///
/// The ring does not hold the memory itself. Every operation that touches bytes is given the
/// [`Memory`] the ring was placed in.
///
/// [`Memory`]: struct.Memory.html
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ring {
    medium: Medium,
    start: usize,
    len: usize,
    head: usize,
    tail: usize,
}

impl Ring {
    /// A ring holding at most `capacity` bytes, placed at `start` in `medium`.
    pub fn new(medium: Medium, start: usize, capacity: usize) -> Self {
        Ring {
            medium,
            start,
            len: capacity + 1,
            head: 0,
            tail: 0,
        }
    }

    /// The medium the ring lives in.
    pub fn medium(&self) -> Medium {
        self.medium
    }

    /// The first offset of the ring in its medium.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of bytes reserved for the ring, one more than its capacity.
    pub fn footprint(&self) -> usize {
        self.len
    }

    /// The most bytes the ring can hold.
    pub fn capacity(&self) -> usize {
        self.len - 1
    }

    /// Index where the next byte is written.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Index of the oldest byte.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Bytes currently held.
    pub fn used(&self) -> usize {
        self.distance(self.tail, self.head)
    }

    /// Bytes that can still be written.
    pub fn free(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Whether the ring holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Forward distance from index `from` to index `to`.
    pub fn distance(&self, from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            self.len - from + to
        }
    }

    /// The index `by` bytes after `index`.
    pub fn wrap_add(&self, index: usize, by: usize) -> usize {
        (index + by % self.len) % self.len
    }

    /// The index `by` bytes before `index`.
    pub fn wrap_sub(&self, index: usize, by: usize) -> usize {
        (index + self.len - by % self.len) % self.len
    }

    /// Commit `count` bytes written at the head.
    pub fn advance_head(&mut self, count: usize) {
        debug_assert!(count <= self.free());
        self.head = self.wrap_add(self.head, count);
    }

    /// Release `count` bytes at the tail.
    pub fn advance_tail(&mut self, count: usize) {
        debug_assert!(count <= self.used());
        self.tail = self.wrap_add(self.tail, count);
    }

    /// Drop all contents.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Discard everything that has been written, keeping the indices.
    pub fn drain(&mut self) {
        self.tail = self.head;
    }

    /// Set both indices directly.
    pub(crate) fn set_indices(&mut self, tail: usize, head: usize) {
        debug_assert!(tail < self.len && head < self.len);
        self.tail = tail;
        self.head = head;
    }

    /// Move the ring to a new window, dropping its contents.
    pub fn relocate(&mut self, start: usize, capacity: usize) {
        *self = Ring::new(self.medium, start, capacity);
    }

    /// The address of a ring index.
    pub fn location(&self, index: usize) -> Location {
        Location::new(self.medium, self.start + index)
    }

    /// Split a transfer of `count` bytes from index `at` into contiguous runs.
    ///
    /// Returns the length of the run starting at `at` and the length of the run that wraps
    /// around to index `0`, which is zero when the transfer does not wrap.
    pub fn runs(&self, at: usize, count: usize) -> (usize, usize) {
        let first = count.min(self.len - at);
        (first, count - first)
    }

    /// Copy `count` bytes from `src` into the ring starting at index `at`.
    pub fn copy_in<D: Ram>(&self, memory: &mut Memory<D>, at: usize, src: Location, count: usize) {
        let (first, second) = self.runs(at, count);
        memory.copy(self.location(at), src, first);
        memory.copy(self.location(0), src.add(first), second);
    }

    /// Copy `count` bytes starting at index `at` out of the ring to `dst`.
    pub fn copy_out<D: Ram>(&self, memory: &mut Memory<D>, at: usize, dst: Location, count: usize) {
        let (first, second) = self.runs(at, count);
        memory.copy(dst, self.location(at), first);
        memory.copy(dst.add(first), self.location(0), second);
    }

    /// Write a caller buffer into the ring starting at index `at`.
    pub fn write<D: Ram>(&self, memory: &mut Memory<D>, at: usize, data: &[u8]) {
        let (first, _) = self.runs(at, data.len());
        memory.write(self.location(at), &data[..first]);
        memory.write(self.location(0), &data[first..]);
    }

    /// Read from the ring starting at index `at` into a caller buffer.
    pub fn read<D: Ram>(&self, memory: &mut Memory<D>, at: usize, buf: &mut [u8]) {
        let (first, _) = self.runs(at, buf.len());
        let (front, back) = buf.split_at_mut(first);
        memory.read(self.location(at), front);
        memory.read(self.location(0), back);
    }

    /// Read the single byte at index `at`.
    pub fn byte_at<D: Ram>(&self, memory: &mut Memory<D>, at: usize) -> u8 {
        let mut byte = [0];
        memory.read(self.location(at), &mut byte);
        byte[0]
    }

    /// Rotate the contents so that the tail lies at index `0`.
    ///
    /// Uses three in-place reversals of the ring window, so no buffer larger than a few bytes is
    /// needed regardless of the medium. Returns the previous tail, by which every index has been
    /// shifted down.
    pub fn linearize<D: Ram>(&mut self, memory: &mut Memory<D>) -> usize {
        let shift = self.tail;
        if shift != 0 {
            self.reverse(memory, 0, shift);
            self.reverse(memory, shift, self.len);
            self.reverse(memory, 0, self.len);
        }
        let used = self.used();
        self.tail = 0;
        self.head = used;
        shift
    }

    /// Reverse the bytes in the index range `from..to`.
    fn reverse<D: Ram>(&self, memory: &mut Memory<D>, mut from: usize, mut to: usize) {
        const CHUNK: usize = 8;
        let mut front = [0u8; CHUNK];
        let mut back = [0u8; CHUNK];
        while to - from >= 2 {
            let count = CHUNK.min((to - from) / 2);
            memory.read(self.location(from), &mut front[..count]);
            memory.read(self.location(to - count), &mut back[..count]);
            front[..count].reverse();
            back[..count].reverse();
            memory.write(self.location(from), &back[..count]);
            memory.write(self.location(to - count), &front[..count]);
            from += count;
            to -= count;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn memory<'a>(local: &'a mut [u8], device: &'a mut [u8]) -> Memory<'a, &'a mut [u8]> {
        Memory::new(local, device)
    }

    #[test]
    fn geometry() {
        let mut ring = Ring::new(Medium::Local, 100, 9);
        assert_eq!(ring.capacity(), 9);
        assert_eq!(ring.footprint(), 10);
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 9);

        ring.advance_head(9);
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.used(), 9);
        assert_eq!(ring.head(), 9);

        ring.advance_tail(5);
        ring.advance_head(3);
        assert_eq!(ring.head(), 2);
        assert_eq!(ring.used(), 7);
        assert_eq!(ring.used() + ring.free(), ring.capacity());
        assert_eq!(ring.wrap_sub(ring.head(), 3), 9);
        assert_eq!(ring.location(2), Location::Local(102));
    }

    #[test]
    fn runs_split_at_the_end() {
        let ring = Ring::new(Medium::Device, 0, 15);
        assert_eq!(ring.runs(0, 10), (10, 0));
        assert_eq!(ring.runs(12, 10), (4, 6));
        assert_eq!(ring.runs(15, 1), (1, 0));
    }

    #[test]
    fn wrapping_transfer() {
        let mut local = [0u8; 32];
        let mut device = [0u8; 32];
        let mut memory = memory(&mut local, &mut device);
        let mut ring = Ring::new(Medium::Device, 8, 7);
        ring.advance_head(6);
        ring.advance_tail(6);

        ring.write(&mut memory, ring.head(), b"abcde");
        ring.advance_head(5);
        assert_eq!(ring.head(), 3);

        let mut out = [0u8; 5];
        ring.read(&mut memory, ring.tail(), &mut out);
        assert_eq!(&out, b"abcde");

        // Through the transport primitive into local memory.
        ring.copy_out(&mut memory, ring.tail(), Location::Local(0), 5);
        let mut check = [0u8; 5];
        memory.read(Location::Local(0), &mut check);
        assert_eq!(&check, b"abcde");
    }

    #[test]
    fn linearize_wrapped() {
        let mut local = [0u8; 16];
        let mut device = [0u8; 4];
        let mut memory = memory(&mut local, &mut device);
        let mut ring = Ring::new(Medium::Local, 0, 10);
        ring.advance_head(7);
        ring.advance_tail(7);
        ring.write(&mut memory, ring.head(), b"012345678");
        ring.advance_head(9);

        let shift = ring.linearize(&mut memory);
        assert_eq!(shift, 7);
        assert_eq!(ring.tail(), 0);
        assert_eq!(ring.head(), 9);
        let mut out = [0u8; 9];
        ring.read(&mut memory, 0, &mut out);
        assert_eq!(&out, b"012345678");
    }
}
