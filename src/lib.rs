//! # histree-rs
//!
//! A static, read-only learned index over a sorted array of fixed-width
//! integer keys, built as a radix histogram tree.
//!
//! Instead of storing explicit pointers or comparisons at every level, each
//! node records per-bucket element counts derived from the key's high-order
//! bits. Buckets that are still too large are refined into child nodes keyed
//! on the next slice of bits, until every bucket is small enough to be
//! resolved by a short bounded scan over the original array.
//!
//! A lookup has two phases: predict an approximate rank by walking the
//! histogram nodes, then confirm it with a lower-bound search over at most
//! `threshold` elements of the retained sorted array.
//!
//! ## Example
//!
//! ```rust
//! use histree_rs::HistogramTree;
//!
//! let tree = HistogramTree::with_params(vec![5u32, 12, 19, 33, 47, 58, 71, 90, 104], 2, 2);
//!
//! assert_eq!(tree.lookup(50), 5); // first element >= 50 is 58, at index 5
//! assert_eq!(tree.lookup(200), 9); // past the end
//! assert_eq!(tree.lookup(0), 0);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt::Write as _;

// =============================================================================
// Configuration
// =============================================================================

/// Default number of high-order key bits consumed per tree level.
pub const DEFAULT_PREFIX_LENGTH: u32 = 2;

/// Default maximum bucket population resolved by a bounded scan instead of a
/// child node.
pub const DEFAULT_THRESHOLD: u32 = 16;

// =============================================================================
// Key trait
// =============================================================================

/// Fixed-width integer key usable with [`HistogramTree`].
///
/// Implemented for the built-in unsigned and signed integers up to 64 bits.
/// Signed keys work unchanged: all bucket arithmetic happens on the unsigned
/// distance from the smallest stored key.
pub trait Key: Copy + Ord {
    /// Bit width of the key type.
    const WIDTH: u32;

    /// Unsigned distance from `origin` up to `self`, as a `u64`.
    ///
    /// Callers only invoke this with `origin <= self`, so two's-complement
    /// wrapping subtraction yields the exact distance for signed types too.
    fn delta_from(self, origin: Self) -> u64;
}

macro_rules! impl_key_unsigned {
    ($($t:ty),* $(,)?) => {
        $(
            impl Key for $t {
                const WIDTH: u32 = <$t>::BITS;

                #[inline]
                fn delta_from(self, origin: Self) -> u64 {
                    self.wrapping_sub(origin) as u64
                }
            }
        )*
    };
}

macro_rules! impl_key_signed {
    ($($t:ty => $u:ty),* $(,)?) => {
        $(
            impl Key for $t {
                const WIDTH: u32 = <$t>::BITS;

                #[inline]
                fn delta_from(self, origin: Self) -> u64 {
                    // Reinterpret the wrapped difference as the same-width
                    // unsigned value before widening.
                    self.wrapping_sub(origin) as $u as u64
                }
            }
        )*
    };
}

impl_key_unsigned!(u8, u16, u32, u64);
impl_key_signed!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);

// =============================================================================
// Tagged node references
// =============================================================================

/// Reference to a node record: which arena it lives in, plus its record
/// offset (in units of whole records, not words).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NodeRef {
    Leaf(u32),
    Internal(u32),
}

impl NodeRef {
    /// Sentinel stored for buckets that need no child. Never followed: the
    /// walk returns before reading the reference of a terminal bucket.
    const TERMINAL: NodeRef = NodeRef::Leaf(0);

    /// Record offsets must fit the low 31 bits of a word.
    const MAX_OFFSET: u32 = (1 << 31) - 1;

    #[inline]
    fn leaf(off: u32) -> Self {
        debug_assert!(off <= Self::MAX_OFFSET);
        NodeRef::Leaf(off)
    }

    #[inline]
    fn internal(off: u32) -> Self {
        debug_assert!(off <= Self::MAX_OFFSET);
        NodeRef::Internal(off)
    }
}

// =============================================================================
// Node stores (flat record arenas)
// =============================================================================

/// Arena of leaf records. One record is `bins` consecutive `u32` counters;
/// leaf records are always terminal.
#[derive(Clone)]
struct LeafStore {
    bins: usize,
    counts: Vec<u32>,
}

impl LeafStore {
    fn new(bins: usize) -> Self {
        Self {
            bins,
            counts: Vec::new(),
        }
    }

    #[inline]
    fn records(&self) -> usize {
        self.counts.len() / self.bins
    }

    /// Appends one record, returning its record offset.
    fn push(&mut self, counts: &[u32]) -> u32 {
        debug_assert_eq!(counts.len(), self.bins);
        self.counts.extend_from_slice(counts);
        (self.records() - 1) as u32
    }

    #[inline]
    fn counts(&self, off: u32) -> &[u32] {
        let at = off as usize * self.bins;
        &self.counts[at..at + self.bins]
    }
}

/// Arena of internal records. One record is `bins` `u32` counters paired with
/// `bins` child references, kept in two parallel arrays with the same stride.
#[derive(Clone)]
struct InternalStore {
    bins: usize,
    counts: Vec<u32>,
    children: Vec<NodeRef>,
}

impl InternalStore {
    fn new(bins: usize) -> Self {
        Self {
            bins,
            counts: Vec::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[inline]
    fn records(&self) -> usize {
        self.counts.len() / self.bins
    }

    /// Appends one record with every child slot set to the terminal sentinel.
    /// Non-terminal slots are backfilled by [`Self::set_child`] after the
    /// corresponding subtree has been built.
    fn push(&mut self, counts: &[u32]) -> u32 {
        debug_assert_eq!(counts.len(), self.bins);
        self.counts.extend_from_slice(counts);
        self.children
            .extend(std::iter::repeat(NodeRef::TERMINAL).take(self.bins));
        (self.records() - 1) as u32
    }

    #[inline]
    fn counts(&self, off: u32) -> &[u32] {
        let at = off as usize * self.bins;
        &self.counts[at..at + self.bins]
    }

    #[inline]
    fn children(&self, off: u32) -> &[NodeRef] {
        let at = off as usize * self.bins;
        &self.children[at..at + self.bins]
    }

    #[inline]
    fn set_child(&mut self, off: u32, bucket: usize, child: NodeRef) {
        debug_assert!(bucket < self.bins);
        self.children[off as usize * self.bins + bucket] = child;
    }
}

// =============================================================================
// HistogramTree
// =============================================================================

/// Static learned index over a sorted array of fixed-width integer keys.
///
/// Immutable after construction. All queries are pure reads with only
/// call-stack state, so `&self` lookups may run from any number of threads
/// concurrently without coordination.
#[derive(Clone)]
pub struct HistogramTree<K: Key> {
    min: K,
    max: K,
    prefix_length: u32,
    bins: usize,
    /// Bits remaining below the first radix digit: `K::WIDTH - prefix_length`.
    width: u32,
    threshold: u32,
    internal: InternalStore,
    leaves: LeafStore,
    /// The original sorted keys, retained as ground truth for the bounded
    /// confirming search.
    data: Vec<K>,
}

impl<K: Key> HistogramTree<K> {
    /// Builds an index over `data` with [`DEFAULT_PREFIX_LENGTH`] and
    /// [`DEFAULT_THRESHOLD`].
    ///
    /// See [`Self::with_params`] for the preconditions.
    pub fn new(data: Vec<K>) -> Self {
        Self::with_params(data, DEFAULT_PREFIX_LENGTH, DEFAULT_THRESHOLD)
    }

    /// Builds an index over `data`, consuming `prefix_length` key bits per
    /// level and treating buckets of at most `threshold` keys as terminal.
    ///
    /// `data` must be non-empty and strictly ascending (thus unique).
    /// Construction runs once, synchronously; a detected invariant violation
    /// (malformed input) panics rather than producing a partial structure.
    ///
    /// # Panics
    ///
    /// If `data` is empty or longer than `u32::MAX` elements, if
    /// `prefix_length` is zero or not smaller than the key width, or if
    /// `threshold` is zero. Unsorted input trips an internal partition
    /// assertion during the build.
    pub fn with_params(data: Vec<K>, prefix_length: u32, threshold: u32) -> Self {
        assert!(!data.is_empty(), "key array must be non-empty");
        assert!(
            data.len() <= u32::MAX as usize,
            "key array exceeds u32 addressing"
        );
        assert!(
            prefix_length >= 1 && prefix_length < K::WIDTH,
            "prefix_length must be in 1..{}",
            K::WIDTH
        );
        assert!(threshold >= 1, "threshold must be at least 1");
        debug_assert!(
            data.windows(2).all(|w| w[0] < w[1]),
            "keys must be strictly ascending"
        );

        let min = data[0];
        let max = data[data.len() - 1];
        let bins = 1usize << prefix_length;
        let width = K::WIDTH - prefix_length;

        let mut tree = Self {
            min,
            max,
            prefix_length,
            bins,
            width,
            threshold,
            internal: InternalStore::new(bins),
            leaves: LeafStore::new(bins),
            data,
        };

        // Build over unsigned distances from `min`; the predictor normalizes
        // queries the same way.
        let deltas: Vec<u64> = tree.data.iter().map(|&k| k.delta_from(min)).collect();
        tree.build_node(&deltas, 0, width);
        tree
    }

    /// Recursively emits the node covering `range`, whose aligned key range
    /// starts at delta `base` (a multiple of `bins << width`), and returns
    /// the reference the caller stores for it. The root call's return value
    /// is discarded; the root is always record 0 of its arena.
    fn build_node(&mut self, range: &[u64], base: u64, width: u32) -> NodeRef {
        let bin_size = 1u128 << width;

        let mut counts = Vec::with_capacity(self.bins);
        let mut consumed = 0usize;
        for i in 0..self.bins {
            // Bucket boundaries are aligned to the node's range base, not to
            // the first key actually present in the sub-range. This keeps the
            // partition consistent with the predictor's shift arithmetic.
            let bound = base as u128 + (i as u128 + 1) * bin_size;
            let n = range[consumed..].partition_point(|&d| (d as u128) < bound);
            counts.push(n as u32);
            consumed += n;
        }
        assert_eq!(
            consumed,
            range.len(),
            "bucket partition failed to exhaust its key range (unsorted input?)"
        );

        if counts.iter().all(|&n| n <= self.threshold) {
            return NodeRef::leaf(self.leaves.push(&counts));
        }

        let off = self.internal.push(&counts);
        // Saturating step: at width 0 every bucket covers a single delta, so
        // with unique keys each counter is at most 1 and the child below is
        // always a leaf. The recursion cannot run past the key width.
        let next_width = width.saturating_sub(self.prefix_length);
        let mut start = 0usize;
        for (i, &n) in counts.iter().enumerate() {
            if n > self.threshold {
                let child_base = base + ((i as u64) << width);
                let child =
                    self.build_node(&range[start..start + n as usize], child_base, next_width);
                self.internal.set_child(off, i, child);
            }
            start += n as usize;
        }
        NodeRef::internal(off)
    }

    /// Smallest stored key.
    #[inline]
    pub fn min(&self) -> K {
        self.min
    }

    /// Largest stored key.
    #[inline]
    pub fn max(&self) -> K {
        self.max
    }

    /// Number of buckets per node (`2^prefix_length`).
    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Number of high-order key bits consumed per tree level.
    #[inline]
    pub fn prefix_length(&self) -> u32 {
        self.prefix_length
    }

    /// Maximum population of a terminal bucket, and therefore the maximum
    /// distance between a predicted and an exact position.
    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Number of indexed keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: construction rejects empty key arrays.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The retained sorted keys.
    #[inline]
    pub fn as_slice(&self) -> &[K] {
        &self.data
    }

    /// Predicts the rank of `key`: the count of stored keys known to precede
    /// its terminal bucket. The exact lower-bound position is guaranteed to
    /// lie within `threshold` elements at or after the returned value.
    ///
    /// Keys below [`Self::min`] predict 0; keys above [`Self::max`] predict
    /// [`Self::len`]. Never fails.
    pub fn lookup_predict(&self, key: K) -> usize {
        if key < self.min {
            return 0;
        }
        if key > self.max {
            return self.data.len();
        }

        let mut delta = key.delta_from(self.min);
        let mut width = self.width;
        let mut pos = 0usize;
        // An all-terminal root is emitted into the leaf arena instead.
        let mut node = if self.internal.is_empty() {
            NodeRef::Leaf(0)
        } else {
            NodeRef::Internal(0)
        };

        loop {
            let bucket = (delta >> width) as usize;
            match node {
                NodeRef::Leaf(off) => {
                    let counts = self.leaves.counts(off);
                    pos += prefix_sum(counts, bucket);
                    debug_assert!(counts[bucket] <= self.threshold);
                    return pos;
                }
                NodeRef::Internal(off) => {
                    let counts = self.internal.counts(off);
                    pos += prefix_sum(counts, bucket);
                    if counts[bucket] <= self.threshold {
                        return pos;
                    }
                    node = self.internal.children(off)[bucket];
                    delta -= (bucket as u64) << width;
                    width = width.saturating_sub(self.prefix_length);
                }
            }
        }
    }

    /// Exact lower-bound position of `key`: the index of the first stored
    /// key `>= key`, or [`Self::len`] if `key` exceeds every stored key.
    /// Matches an exhaustive binary search over the whole array.
    ///
    /// "Key present" is decided by the caller in the usual lower-bound way:
    /// compare the element at the returned position against `key`.
    pub fn lookup(&self, key: K) -> usize {
        let pos = self.lookup_predict(key);
        if pos >= self.data.len() {
            return pos;
        }
        let end = (pos + self.threshold as usize).min(self.data.len());
        pos + self.data[pos..end].partition_point(|&k| k < key)
    }

    /// Renders both node arenas in a human-readable grouped form, for
    /// debugging. Terminal bucket slots are labelled `terminal`; real child
    /// references carry their arena and record offset.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "internal records: {}", self.internal.records());
        for off in 0..self.internal.records() as u32 {
            let counts = self.internal.counts(off);
            let _ = write!(out, "  [{off}] counts:");
            for &n in counts {
                let _ = write!(out, " {n}");
            }
            let _ = write!(out, "\n      refs:  ");
            for (i, &child) in self.internal.children(off).iter().enumerate() {
                if counts[i] <= self.threshold {
                    let _ = write!(out, " terminal");
                } else {
                    match child {
                        NodeRef::Leaf(n) => {
                            let _ = write!(out, " leaf:{n}");
                        }
                        NodeRef::Internal(n) => {
                            let _ = write!(out, " internal:{n}");
                        }
                    }
                }
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "leaf records: {}", self.leaves.records());
        for off in 0..self.leaves.records() as u32 {
            let _ = write!(out, "  [{off}] counts:");
            for &n in self.leaves.counts(off) {
                let _ = write!(out, " {n}");
            }
            let _ = writeln!(out);
        }
        out
    }
}

/// Sum of `counts[..bucket]`: the keys preceding `bucket` at this level.
#[inline]
fn prefix_sum(counts: &[u32], bucket: usize) -> usize {
    counts[..bucket].iter().map(|&n| n as usize).sum()
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests;
