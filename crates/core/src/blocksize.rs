//! Automatic block size selection.

use crate::context::CompressionContext;

/// The size of L1 cache. 32 KB is quite common nowadays.
pub const L1: usize = 32 * 1024;

/// Derive a block size from the source size, element size and compression
/// level. `high_ratio` doubles the base size for codecs meant for large
/// blocks.
pub fn auto_blocksize(
    sourcesize: usize,
    typesize: usize,
    clevel: i32,
    high_ratio: bool,
) -> usize {
    // Protection against very small buffers
    if sourcesize < typesize {
        return 1;
    }

    let mut blocksize = sourcesize;
    if sourcesize >= L1 {
        blocksize = L1;
        if high_ratio {
            blocksize *= 2;
        }

        blocksize = match clevel {
            0 => blocksize / 4,
            1 => blocksize / 2,
            2 => blocksize,
            3 => blocksize * 2,
            4 | 5 => blocksize * 4,
            6..=8 => blocksize * 8,
            9 => {
                // Do not exceed 256 KB for non high-ratio codecs
                if high_ratio {
                    blocksize * 16
                } else {
                    blocksize * 8
                }
            }
            _ => blocksize,
        };
    }

    if clevel > 0 {
        // Do not use a too large buffer (64 KB) for splitting codecs
        if blocksize > (1 << 16) {
            blocksize = 1 << 16;
        }
        blocksize *= typesize;
        // Do not use a too small blocksize (< 64 KB) when typesize is small
        if blocksize < (1 << 16) {
            blocksize = 1 << 16;
        }
    }

    if blocksize > sourcesize {
        blocksize = sourcesize;
    }

    // blocksize must be a multiple of the typesize
    if blocksize > typesize {
        blocksize = blocksize / typesize * typesize;
    }

    blocksize
}

/// Replace an automatic (zero) block size in the context with a concrete one.
/// A host-forced block size is left alone.
pub fn next_blocksize(ctx: &mut CompressionContext) {
    if ctx.blocksize != 0 && ctx.sourcesize >= ctx.typesize {
        return;
    }
    let high_ratio = ctx.codec.is_high_ratio(ctx.filter());
    ctx.blocksize = auto_blocksize(ctx.sourcesize, ctx.typesize, ctx.clevel, high_ratio);
}
