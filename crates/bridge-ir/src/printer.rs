//! Text format printer for the bridge IR.
//!
//! Output is deterministic and is what snapshot dumps contain:
//!
//! ```text
//! core.module @train {
//!   func.func @main(%0: tf.tensor) -> (tf.tensor) {
//!     %1 = tf_executor.graph : tf.tensor {
//!       %2, %3 = tf_executor.island : tf.tensor, tf_executor.control {
//!         %4 = tf.Neg %0 : tf.tensor
//!         tf_executor.yield %4
//!       }
//!       tf_executor.fetch %2
//!     }
//!     func.return %1
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write;

use crate::context::IrContext;
use crate::dialect::{core, func};
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

/// Print state for value numbering.
struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, String>,
    next_value_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            next_value_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value_num);
        self.next_value_num += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn get_value_name(&self, v: ValueRef) -> &str {
        self.value_names.get(&v).map(|s| s.as_str()).unwrap_or("%?")
    }

    fn reset_numbering(&mut self) {
        self.next_value_num = 0;
        self.value_names.clear();
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print an operation as IR text.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    let _ = print_operation(&mut state, &mut out, op, 0);
    out
}

/// Print a module (root operation with nested functions) as IR text.
pub fn print_module(ctx: &IrContext, root: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    let _ = print_module_op(&mut state, &mut out, root);
    out
}

// ============================================================================
// Types and attributes
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let data = ctx.types.get(ty);
    if data.dialect == func::DIALECT_NAME() && data.name == func::FN_TYPE() {
        return write_fn_type(ctx, f, data);
    }
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        f.write_char('(')?;
        write_type_list(ctx, f, &data.params)?;
        f.write_char(')')?;
    }
    Ok(())
}

fn write_fn_type(ctx: &IrContext, f: &mut impl Write, data: &TypeData) -> fmt::Result {
    let num_inputs = data
        .attrs
        .get(&func::ATTR_NUM_INPUTS())
        .and_then(Attribute::as_int)
        .map_or(data.params.len(), |n| n as usize)
        .min(data.params.len());
    let (inputs, outputs) = data.params.split_at(num_inputs);
    f.write_char('(')?;
    write_type_list(ctx, f, inputs)?;
    f.write_str(") -> (")?;
    write_type_list(ctx, f, outputs)?;
    f.write_char(')')
}

fn write_type_list(ctx: &IrContext, f: &mut impl Write, types: &[TypeRef]) -> fmt::Result {
    for (i, &ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(ctx, f, ty)?;
    }
    Ok(())
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(v) => write!(f, "{}", *v as i64),
        Attribute::String(s) => {
            f.write_char('"')?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        }
        Attribute::Symbol(sym) => write_symbol(f, *sym),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::List(list) => {
            f.write_char('[')?;
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(ctx, f, item)?;
            }
            f.write_char(']')
        }
        Attribute::Location(loc) => {
            f.write_str("loc(\"")?;
            write_escaped_string(f, ctx.paths.get(loc.path))?;
            write!(f, "\" {}:{})", loc.span.start, loc.span.end)
        }
    }
}

fn write_escaped_string(f: &mut impl Write, s: &str) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn write_symbol(f: &mut impl Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        let needs_quoting = s.is_empty() || !s.chars().all(|c| c.is_alphanumeric() || c == '_');
        if needs_quoting {
            f.write_str("@\"")?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        } else {
            write!(f, "@{s}")
        }
    })
}

fn write_attributes(
    ctx: &IrContext,
    f: &mut impl Write,
    attrs: &std::collections::BTreeMap<Symbol, Attribute>,
    skip: &[Symbol],
) -> fmt::Result {
    let mut first = true;
    for (key, val) in attrs.iter().filter(|(k, _)| !skip.contains(k)) {
        f.write_str(if first { " {" } else { ", " })?;
        first = false;
        write!(f, "{key} = ")?;
        write_attribute(ctx, f, val)?;
    }
    if !first {
        f.write_char('}')?;
    }
    Ok(())
}

// ============================================================================
// Operations
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    if core::Module::from_op(state.ctx, op).is_some() {
        return print_module_op(state, f, op);
    }
    if func::Func::from_op(state.ctx, op).is_some() {
        return print_func_op(state, f, op, indent);
    }
    print_generic_op(state, f, op, indent)
}

fn print_generic_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    write!(f, "{indent_str}")?;

    let results = state.ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(v);
            f.write_str(&name)?;
        }
        f.write_str(" = ")?;
    }

    let data = state.ctx.op(op);
    write!(f, "{}.{}", data.dialect, data.name)?;

    let operands = state.ctx.op_operands(op);
    if !operands.is_empty() {
        f.write_char(' ')?;
        for (i, &v) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(state.get_value_name(v))?;
        }
    }

    write_attributes(state.ctx, f, &state.ctx.op(op).attributes, &[])?;

    let result_types = state.ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        write_type_list(state.ctx, f, result_types)?;
    }

    let regions = state.ctx.op(op).regions.clone();
    for region in regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2)?;
        write!(f, "{indent_str}}}")?;
    }

    f.write_char('\n')
}

fn print_region(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
) -> fmt::Result {
    let blocks: Vec<_> = state.ctx.region(region).blocks.iter().copied().collect();
    for (i, &block) in blocks.iter().enumerate() {
        let args = state.ctx.block_args(block);
        if blocks.len() > 1 || !args.is_empty() {
            let indent_str = " ".repeat(indent);
            write!(f, "{indent_str}^bb{i}")?;
            if !args.is_empty() {
                f.write_char('(')?;
                for (j, &arg) in args.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    let arg_name = state.assign_value_name(arg);
                    write!(f, "{arg_name}: ")?;
                    write_type(state.ctx, f, state.ctx.value_ty(arg))?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
        }

        let ops: Vec<_> = state.ctx.block(block).ops.iter().copied().collect();
        for op in ops {
            print_operation(state, f, op, indent)?;
        }
    }
    Ok(())
}

fn print_module_op(state: &mut PrintState<'_>, f: &mut impl Write, op: OpRef) -> fmt::Result {
    f.write_str("core.module")?;
    if let Some(name) = state
        .ctx
        .attr(op, core::ATTR_SYM_NAME())
        .and_then(Attribute::as_symbol)
    {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }
    f.write_str(" {\n")?;
    if let Some(module) = core::Module::from_op(state.ctx, op) {
        for child in module.ops(state.ctx) {
            state.reset_numbering();
            print_operation(state, f, child, 2)?;
        }
    }
    f.write_str("}\n")
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    write!(f, "{indent_str}func.func")?;

    let ctx = state.ctx;
    let private = func::Func::from_op(ctx, op).is_some_and(|func| func.is_private(ctx));
    if private {
        f.write_str(" private")?;
    }
    if let Some(name) = ctx.attr(op, func::ATTR_SYM_NAME()).and_then(Attribute::as_symbol) {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }

    state.reset_numbering();

    let entry = crate::dialect::region_block(ctx, op, 0);
    f.write_char('(')?;
    if let Some(entry) = entry {
        for (i, &arg) in ctx.block_args(entry).iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(arg);
            write!(f, "{name}: ")?;
            write_type(ctx, f, ctx.value_ty(arg))?;
        }
    }
    f.write_char(')')?;

    if let Some(Attribute::Type(ty)) = ctx.attr(op, func::ATTR_TYPE()) {
        let data = ctx.types.get(*ty);
        let num_inputs = data
            .attrs
            .get(&func::ATTR_NUM_INPUTS())
            .and_then(Attribute::as_int)
            .map_or(0, |n| n as usize)
            .min(data.params.len());
        f.write_str(" -> (")?;
        write_type_list(ctx, f, &data.params[num_inputs..])?;
        f.write_char(')')?;
    }

    let skip = [
        func::ATTR_SYM_NAME(),
        func::ATTR_TYPE(),
        func::ATTR_SYM_VISIBILITY(),
    ];
    write_attributes(ctx, f, &ctx.op(op).attributes, &skip)?;

    f.write_str(" {\n")?;
    if let Some(entry) = entry {
        let ops: Vec<_> = ctx.block(entry).ops.iter().copied().collect();
        for child in ops {
            print_operation(state, f, child, indent + 2)?;
        }
    }
    writeln!(f, "{indent_str}}}")
}
