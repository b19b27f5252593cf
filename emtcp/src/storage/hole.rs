/// A contiguous chunk of out-of-order data, described relative to the receive head.
///
/// The first `hole_size` bytes after the head are missing and the following `data_size` bytes
/// have already been written into the ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contig {
    /// Missing bytes directly after the head.
    pub hole_size: usize,
    /// Bytes already present behind the missing ones.
    pub data_size: usize,
}

/// Tracks at most one gap in a receive ring.
///
/// Segments that arrive ahead of the expected sequence number are written into the ring behind
/// the gap. Only a single contiguous block of such data is remembered: a later segment that does
/// not touch the block is dropped, an earlier disjoint one replaces it. The peer retransmits
/// whatever was forgotten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hole {
    contig: Option<Contig>,
}

impl Contig {
    fn end(&self) -> usize {
        self.hole_size + self.data_size
    }
}

impl Hole {
    /// The currently remembered block, if any.
    pub fn contig(&self) -> Option<Contig> {
        self.contig
    }

    /// Whether no out-of-order data is remembered.
    pub fn is_empty(&self) -> bool {
        self.contig.is_none()
    }

    /// Forget the out-of-order data.
    pub fn clear(&mut self) {
        self.contig = None;
    }

    /// Record `size` bytes written `offset` bytes after the head.
    pub fn add_out_of_order(&mut self, offset: usize, size: usize) {
        if size == 0 {
            return;
        }

        let end = offset + size;
        let contig = match self.contig {
            None => Contig { hole_size: offset, data_size: size },
            Some(old) if end < old.hole_size => Contig { hole_size: offset, data_size: size },
            Some(old) if offset < old.hole_size => Contig {
                hole_size: offset,
                data_size: end.max(old.end()) - offset,
            },
            Some(old) if offset <= old.end() => Contig {
                hole_size: old.hole_size,
                data_size: end.max(old.end()) - old.hole_size,
            },
            Some(old) => {
                net_trace!("dropping out-of-order data at +{} behind +{}", offset, old.end());
                old
            },
        };

        self.contig = Some(contig);
    }

    /// Account for `size` in-order bytes written at the head.
    ///
    /// Returns the number of remembered bytes that have become contiguous with the head, by which
    /// the head should be advanced in addition to `size`.
    pub fn advance(&mut self, size: usize) -> usize {
        let old = match self.contig {
            None => return 0,
            Some(old) => old,
        };

        if size < old.hole_size {
            self.contig = Some(Contig {
                hole_size: old.hole_size - size,
                data_size: old.data_size,
            });
            return 0;
        }

        self.contig = None;
        old.end().saturating_sub(size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn contig(hole_size: usize, data_size: usize) -> Option<Contig> {
        Some(Contig { hole_size, data_size })
    }

    #[test]
    fn fill_the_gap() {
        let mut hole = Hole::default();
        hole.add_out_of_order(5, 5);
        assert_eq!(hole.contig(), contig(5, 5));
        assert_eq!(hole.advance(5), 5);
        assert!(hole.is_empty());
    }

    #[test]
    fn partial_fill() {
        let mut hole = Hole::default();
        hole.add_out_of_order(10, 4);
        assert_eq!(hole.advance(3), 0);
        assert_eq!(hole.contig(), contig(7, 4));
        assert_eq!(hole.advance(7), 4);
        assert!(hole.is_empty());
    }

    #[test]
    fn overrun_covers_the_block() {
        let mut hole = Hole::default();
        hole.add_out_of_order(2, 3);
        assert_eq!(hole.advance(8), 0);
        assert!(hole.is_empty());
    }

    #[test]
    fn extend_and_merge() {
        let mut hole = Hole::default();
        hole.add_out_of_order(10, 5);
        // Touching the end extends.
        hole.add_out_of_order(15, 5);
        assert_eq!(hole.contig(), contig(10, 10));
        // Overlapping the start moves it forward.
        hole.add_out_of_order(8, 4);
        assert_eq!(hole.contig(), contig(8, 12));
        // Spanning everything.
        hole.add_out_of_order(6, 30);
        assert_eq!(hole.contig(), contig(6, 30));
    }

    #[test]
    fn disjoint_segments() {
        let mut hole = Hole::default();
        hole.add_out_of_order(20, 5);
        // Later and disjoint: forgotten.
        hole.add_out_of_order(30, 5);
        assert_eq!(hole.contig(), contig(20, 5));
        // Earlier and disjoint: replaces.
        hole.add_out_of_order(4, 2);
        assert_eq!(hole.contig(), contig(4, 2));
    }
}
