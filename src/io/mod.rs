mod local;
mod memory;

pub use local::LocalFileReader;
pub use memory::MemoryReader;

use anyhow::{Result, bail};

/// Trait for random access reading from a data source
pub trait ReadAt {
    /// Read data at the specified offset into the buffer
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer from `offset`, failing on a short read
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                bail!(
                    "Unexpected end of data at offset {} (wanted {} more bytes)",
                    offset + filled as u64,
                    buf.len() - filled
                );
            }
            filled += n;
        }
        Ok(())
    }
}
