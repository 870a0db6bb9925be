//! The `core` dialect: the root module container.

use crate::context::{BlockData, IrContext, OperationDataBuilder};
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location};

use super::func;

symbols! {
    DIALECT_NAME => "core",
    MODULE => "module",
    ATTR_SYM_NAME => "sym_name",
}

/// Thin wrapper around an `OpRef` pointing to a `core.module` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Module(OpRef);

impl Module {
    /// Create an empty module with a single body block.
    pub fn create(ctx: &mut IrContext, location: Location, name: Option<&str>) -> Self {
        let block = ctx.create_block(BlockData::new(location, []));
        let region = ctx.create_single_block_region(location, block);
        let mut builder = OperationDataBuilder::new(location, DIALECT_NAME(), MODULE()).region(region);
        if let Some(name) = name {
            builder = builder.attr(ATTR_SYM_NAME(), Attribute::Symbol(Symbol::from_dynamic(name)));
        }
        Module(builder.create(ctx))
    }

    /// Wrap `op`, verifying it is a `core.module`.
    pub fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.is_op(op, DIALECT_NAME(), MODULE()).then_some(Module(op))
    }

    /// Get the underlying `OpRef`.
    pub fn op(self) -> OpRef {
        self.0
    }

    /// Get the module's body region.
    pub fn body(self, ctx: &IrContext) -> Option<RegionRef> {
        ctx.op(self.0).regions.first().copied()
    }

    /// Get the first block of the module body.
    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        let region = self.body(ctx)?;
        ctx.region(region).blocks.first().copied()
    }

    /// Get all top-level operations in the module's first block.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        match self.first_block(ctx) {
            Some(block) => ctx.block(block).ops.to_vec(),
            None => Vec::new(),
        }
    }

    /// Top-level `func.func` operations, in order.
    pub fn functions(self, ctx: &IrContext) -> Vec<func::Func> {
        self.ops(ctx)
            .into_iter()
            .filter_map(|op| func::Func::from_op(ctx, op))
            .collect()
    }

    /// Find a top-level function by symbol name.
    pub fn lookup_function(self, ctx: &IrContext, name: Symbol) -> Option<func::Func> {
        self.functions(ctx)
            .into_iter()
            .find(|f| f.name(ctx) == Some(name))
    }

    /// Get the module name (from `sym_name` attribute).
    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.attr(self.0, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)
    }
}
