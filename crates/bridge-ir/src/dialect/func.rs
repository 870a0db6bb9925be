//! The `func` dialect: functions, calls and returns.

use crate::context::{BlockData, IrContext, OperationDataBuilder};
use crate::refs::{BlockRef, OpRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location, TypeDataBuilder};

symbols! {
    DIALECT_NAME => "func",
    FUNC => "func",
    RETURN => "return",
    CALL => "call",
    FN_TYPE => "fn",
    ATTR_SYM_NAME => "sym_name",
    ATTR_TYPE => "type",
    ATTR_SYM_VISIBILITY => "sym_visibility",
    ATTR_CALLEE => "callee",
    ATTR_NUM_INPUTS => "num_inputs",
}

/// Function type: inputs followed by outputs, with the input count recorded
/// as an attribute so the split point survives interning.
pub fn fn_type(ctx: &mut IrContext, inputs: &[TypeRef], outputs: &[TypeRef]) -> TypeRef {
    ctx.types.intern(
        TypeDataBuilder::new(DIALECT_NAME(), FN_TYPE())
            .params(inputs.iter().chain(outputs).copied())
            .attr(ATTR_NUM_INPUTS(), Attribute::IntBits(inputs.len() as u64))
            .build(),
    )
}

/// Thin wrapper around a `func.func` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Func(OpRef);

impl Func {
    /// Create a function with an empty entry block whose arguments are `inputs`.
    ///
    /// The function is not attached to any block.
    pub fn create(
        ctx: &mut IrContext,
        location: Location,
        name: Symbol,
        inputs: &[TypeRef],
        outputs: &[TypeRef],
        private: bool,
    ) -> Self {
        let ty = fn_type(ctx, inputs, outputs);
        let entry = ctx.create_block(BlockData::new(location, inputs.iter().copied()));
        let body = ctx.create_single_block_region(location, entry);
        let mut builder = OperationDataBuilder::new(location, DIALECT_NAME(), FUNC())
            .attr(ATTR_SYM_NAME(), name)
            .attr(ATTR_TYPE(), ty)
            .region(body);
        if private {
            builder = builder.attr(ATTR_SYM_VISIBILITY(), "private");
        }
        Func(builder.create(ctx))
    }

    pub fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.is_op(op, DIALECT_NAME(), FUNC()).then_some(Func(op))
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.attr(self.0, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)
    }

    /// Functions are public unless `sym_visibility = "private"`.
    pub fn is_private(self, ctx: &IrContext) -> bool {
        ctx.attr(self.0, ATTR_SYM_VISIBILITY())
            .and_then(Attribute::as_str)
            .is_some_and(|v| v == "private")
    }

    /// The entry block of the body.
    pub fn entry_block(self, ctx: &IrContext) -> Option<BlockRef> {
        super::region_block(ctx, self.0, 0)
    }

    /// The trailing `func.return`, if the body is terminated by one.
    pub fn return_op(self, ctx: &IrContext) -> Option<OpRef> {
        let block = self.entry_block(ctx)?;
        ctx.block_terminator(block)
            .filter(|&op| ctx.is_op(op, DIALECT_NAME(), RETURN()))
    }
}

/// Build an unattached `func.return`.
pub fn create_return(ctx: &mut IrContext, location: Location, values: &[ValueRef]) -> OpRef {
    OperationDataBuilder::new(location, DIALECT_NAME(), RETURN())
        .operands(values.iter().copied())
        .create(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Span;

    #[test]
    fn function_wrapper_reads_signature_and_visibility() {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("func.mlir".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let tensor = crate::dialect::tf::tensor_type(&mut ctx);

        let f = Func::create(&mut ctx, loc, Symbol::new("helper"), &[tensor, tensor], &[tensor], true);
        let entry = f.entry_block(&ctx).expect("entry block");
        let arg = ctx.block_arg(entry, 0);
        let ret = create_return(&mut ctx, loc, &[arg]);
        ctx.push_op(entry, ret);

        assert_eq!(f.name(&ctx), Some(Symbol::new("helper")));
        assert!(f.is_private(&ctx));
        assert_eq!(ctx.block_args(entry).len(), 2);
        assert_eq!(f.return_op(&ctx), Some(ret));

        let ty = ctx.attr(f.op(), ATTR_TYPE()).cloned();
        let Some(Attribute::Type(ty)) = ty else {
            panic!("missing function type");
        };
        assert_eq!(ctx.types.get(ty).params.len(), 3);
    }
}
