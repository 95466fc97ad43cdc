use crate::error::{Error, Result};
use std::io::Write;

/// Write `levels` root-adjacent level first, level 0 last. Each level goes out
/// verbatim, padding included. The first failed write stops the output.
pub fn write_levels<W: Write + ?Sized>(levels: &[Vec<u8>], out: &mut W) -> Result<()> {
    for (index, level) in levels.iter().enumerate().rev() {
        out.write_all(level).map_err(|source| {
            tracing::error!(level = index, error = %source, "failed to write hash tree level");
            Error::io(format!("write hash tree level {index}"), source)
        })?;
    }
    out.flush().map_err(|source| Error::io("flush hash tree", source))?;
    Ok(())
}
