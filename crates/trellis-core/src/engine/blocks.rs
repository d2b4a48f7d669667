//! Block matching over compiled fragments
//!
//! Compiled control-flow ops pair an opener with a closer and may carry
//! depth-zero dividers between them (`elseif`/`else`, `case`/`default`,
//! `forelseempty`). Matching counts nested openers of the same family so an
//! inner block never steals the outer close.

use super::exec::{op_name, Segment};

/// Find the matching close op for a block opener.
///
/// `start` is the segment index just after the opener. Returns the index
/// of the close op, or `None` when the block is never closed.
pub(crate) fn find_block_end(
    segments: &[Segment<'_>],
    start: usize,
    open: &str,
    close: &str,
) -> Option<usize> {
    let mut depth = 0usize;

    for (i, segment) in segments.iter().enumerate().skip(start) {
        let Segment::Op(op) = segment else { continue };
        let name = op_name(op);

        if name == open {
            depth += 1;
        } else if name == close {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }

    None
}

/// Collect the indices of depth-zero divider ops between a block opener
/// and its close.
pub(crate) fn find_dividers(
    segments: &[Segment<'_>],
    start: usize,
    end: usize,
    open: &str,
    close: &str,
    names: &[&str],
) -> Vec<usize> {
    let mut dividers = Vec::new();
    let mut depth = 0usize;

    for (i, segment) in segments.iter().enumerate().take(end).skip(start) {
        let Segment::Op(op) = segment else { continue };
        let name = op_name(op);

        if name == open {
            depth += 1;
        } else if name == close {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && names.contains(&name) {
            dividers.push(i);
        }
    }

    dividers
}
