//! Structural validation for the bridge IR.
//!
//! Two checks run over a module:
//!
//! 1. **Visibility**: every operand of an operation inside a function refers
//!    to a value defined in a block enclosing that operation (the op's own
//!    block or the block of one of its ancestors). A value produced inside
//!    one island and consumed in another is reported here.
//!
//! 2. **Use-chain consistency**: the use-chain stored in `IrContext` exactly
//!    matches the operands of every operation.

use std::collections::HashSet;
use std::ops::ControlFlow;

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::dialect::core::Module;
use crate::refs::{BlockRef, OpRef, ValueDef, ValueRef};
use crate::types::Attribute;
use crate::walk::{self, WalkAction};

/// An operand that is not visible from its consumer.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("operand #{operand_index} of {consumer} in @{function} references {value}, which is not in scope")]
pub struct ScopeError {
    pub function: String,
    pub consumer: String,
    pub operand_index: usize,
    pub value: String,
}

/// A mismatch between an operand list and the stored use-chain.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{message}")]
pub struct UseChainError {
    pub message: String,
}

/// Result of validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub scope_errors: Vec<ScopeError>,
    pub use_chain_errors: Vec<UseChainError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.scope_errors.is_empty() && self.use_chain_errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_ok() {
            return Ok(());
        }
        let messages = self
            .scope_errors
            .iter()
            .map(ToString::to_string)
            .chain(self.use_chain_errors.iter().map(ToString::to_string))
            .collect();
        Err(ValidationError { messages })
    }
}

/// Validation failure, carrying one message per problem found.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("IR validation failed: {}", messages.join("; "))]
pub struct ValidationError {
    #[error(not(source))]
    pub messages: Vec<String>,
}

/// Run both checks over `module`.
pub fn validate_module(ctx: &IrContext, module: Module) -> ValidationResult {
    ValidationResult {
        scope_errors: validate_scopes(ctx, module),
        use_chain_errors: validate_use_chains(ctx, module),
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Blocks enclosing `op`: its own block, then each ancestor's block.
fn enclosing_blocks(ctx: &IrContext, op: OpRef) -> HashSet<BlockRef> {
    let mut blocks = HashSet::new();
    let mut current = Some(op);
    while let Some(op) = current {
        match ctx.op(op).parent_block {
            Some(block) => {
                blocks.insert(block);
                current = ctx.block_parent_op(block);
            }
            None => current = None,
        }
    }
    blocks
}

fn defining_block(ctx: &IrContext, v: ValueRef) -> Option<BlockRef> {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, _) => ctx.op(op).parent_block,
        ValueDef::BlockArg(block, _) => Some(block),
    }
}

fn describe_value(ctx: &IrContext, v: ValueRef) -> String {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, idx) => format!("result #{idx} of {}", ctx.full_name(op)),
        ValueDef::BlockArg(block, idx) => format!("block arg #{idx} of {block}"),
    }
}

fn validate_scopes(ctx: &IrContext, module: Module) -> Vec<ScopeError> {
    let mut errors = Vec::new();
    for func in module.functions(ctx) {
        let function = ctx
            .attr(func.op(), crate::dialect::func::ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
            .map_or_else(|| "<unnamed>".to_owned(), |s| s.to_string());
        for op in walk::collect_ops(ctx, func.op(), |_| true) {
            let visible = enclosing_blocks(ctx, op);
            for (i, &operand) in ctx.op_operands(op).iter().enumerate() {
                let in_scope = defining_block(ctx, operand).is_some_and(|b| visible.contains(&b));
                if !in_scope {
                    errors.push(ScopeError {
                        function: function.clone(),
                        consumer: ctx.full_name(op),
                        operand_index: i,
                        value: describe_value(ctx, operand),
                    });
                }
            }
        }
    }
    errors
}

// ============================================================================
// Use-chain consistency
// ============================================================================

fn validate_use_chains(ctx: &IrContext, module: Module) -> Vec<UseChainError> {
    let mut errors = Vec::new();
    let Some(body) = module.body(ctx) else {
        return errors;
    };

    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let mut defined: HashSet<ValueRef> = HashSet::new();
    let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
        }
        defined.extend(ctx.op_results(op).iter().copied());
        for &region in &ctx.op(op).regions {
            for &block in &ctx.region(region).blocks {
                defined.extend(ctx.block_args(block).iter().copied());
            }
        }
        ControlFlow::Continue(WalkAction::Advance)
    });

    for &(val, op, idx) in &actual_uses {
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(UseChainError {
                message: format!(
                    "operand #{idx} of {} ({op}) uses {val} but no use-chain entry exists",
                    ctx.full_name(op),
                ),
            });
        }
    }

    let mut checked: Vec<ValueRef> = defined.into_iter().collect();
    checked.sort();
    for val in checked {
        for u in ctx.uses(val) {
            if !actual_uses.contains(&(val, u.user, u.operand_index)) {
                errors.push(UseChainError {
                    message: format!(
                        "use-chain entry for {val} claims use by {} operand #{}, but no such operand exists",
                        u.user, u.operand_index,
                    ),
                });
            }
        }
    }
    errors
}
