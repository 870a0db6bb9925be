//! Dialect vocabularies.
//!
//! Each submodule declares the operation names and attribute keys of one
//! dialect, plus thin typed wrappers for the operations the passes inspect.
//!
//! | Dialect       | Role                                              |
//! |---------------|---------------------------------------------------|
//! | `core`        | the root `core.module` container                  |
//! | `func`        | functions, calls and returns                      |
//! | `tf`          | functional TensorFlow ops and region control flow |
//! | `tf_executor` | graphs of islands joined by data/control edges    |
//! | `tf_device`   | replication, parallel execution, device launches  |

pub mod core;
pub mod func;
pub mod tf;
pub mod tf_device;
pub mod tf_executor;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// First block of the `index`-th region of `op`.
///
/// All region-holding ops in these dialects use single-block regions.
pub fn region_block(ctx: &IrContext, op: OpRef, index: usize) -> Option<BlockRef> {
    let region: RegionRef = *ctx.op(op).regions.get(index)?;
    ctx.region(region).blocks.first().copied()
}

/// Operations of a single-block region, excluding the trailing terminator.
pub fn body_ops_without_terminator(ctx: &IrContext, block: BlockRef) -> Vec<OpRef> {
    let ops = &ctx.block(block).ops;
    match ops.split_last() {
        Some((_, rest)) => rest.to_vec(),
        None => Vec::new(),
    }
}
