// Licensed under the Apache-2.0 license

use heapless::Vec;

/// Default capacity of the `Wire` transfer buffer.
pub const WIRE_BUFFER_LENGTH: usize = 32;

/// Fixed-capacity byte buffer with a read cursor.
///
/// Writes append until the buffer is full and then drop further bytes.
/// Reads consume from the cursor; `cursor <= len <= N` always holds.
#[derive(Clone, Debug, Default)]
pub struct ByteBuffer<const N: usize = WIRE_BUFFER_LENGTH> {
    data: Vec<u8, N>,
    cursor: usize,
}

impl<const N: usize> ByteBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
        }
    }

    /// Append one byte. Returns `false` if the buffer is full.
    pub fn push(&mut self, value: u8) -> bool {
        self.data.push(value).is_ok()
    }

    /// Append as many of `bytes` as fit and return how many were taken.
    pub fn extend_truncating(&mut self, bytes: &[u8]) -> usize {
        let taken = bytes.len().min(N - self.data.len());
        // `taken` never exceeds the free space.
        let _ = self.data.extend_from_slice(bytes.get(..taken).unwrap_or_default());
        taken
    }

    /// Bytes left to read.
    #[must_use]
    pub fn available(&self) -> usize {
        self.data.len() - self.cursor
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.cursor).copied()
    }

    pub fn read(&mut self) -> Option<u8> {
        let value = self.peek()?;
        self.cursor += 1;
        Some(value)
    }

    /// Reset length and cursor.
    pub fn clear(&mut self) {
        self.data.clear();
        self.cursor = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Replace the contents with up to `count` bytes produced by `fill`.
    ///
    /// `count` is clamped to the capacity. `fill` receives a zeroed slice and
    /// returns how many bytes it produced; the result is clamped to the slice.
    pub fn fill_with<E>(
        &mut self,
        count: usize,
        fill: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        self.clear();
        let count = count.min(N);
        // Capacity is N and `count <= N`.
        let _ = self.data.resize(count, 0);
        match fill(&mut self.data) {
            Ok(obtained) => {
                let obtained = obtained.min(count);
                self.data.truncate(obtained);
                Ok(obtained)
            }
            Err(err) => {
                self.data.clear();
                Err(err)
            }
        }
    }
}
