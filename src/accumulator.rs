use std::borrow::Cow;

const MIN_CAPACITY: usize = 64;

/// Growable buffer used to assemble one parser token (url, header name/value, body)
/// across several `feed()` calls.
///
/// The backing store only ever grows, `reset()` keeps the capacity around so the
/// same allocation is reused token after token.
#[derive(Debug, Default)]
pub struct ByteAccumulator(Vec<u8>);

impl ByteAccumulator {
    /// Empty accumulator with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        ByteAccumulator(Vec::with_capacity(capacity))
    }

    /// Append bytes. Appending an empty slice is a no-op.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let needed = self.0.len() + bytes.len();

        if needed > self.0.capacity() {
            // at least double, so a token arriving byte by byte is amortized.
            let target = needed.max(self.0.capacity() * 2).max(MIN_CAPACITY);
            self.0.reserve_exact(target - self.0.len());
        }

        self.0.extend_from_slice(bytes);
    }

    /// Logically empty the buffer. Capacity is retained.
    pub fn reset(&mut self) {
        self.0.clear();
    }

    /// The bytes so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }

    /// Copy of the valid region.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }

    /// The valid region decoded as UTF-8, invalid sequences replaced.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Number of bytes accumulated.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tests if nothing is accumulated.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Allocated size of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl std::ops::Deref for ByteAccumulator {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}
