//! Conveniences for constructing modules in code.
//!
//! ```
//! use bridge_ir::IrContext;
//! use bridge_ir::builder::ModuleBuilder;
//! use bridge_ir::dialect::tf;
//!
//! let mut ctx = IrContext::new();
//! let mut mb = ModuleBuilder::new(&mut ctx, "demo");
//! let tensor = tf::tensor_type(mb.ctx());
//! let mut fb = mb.func("main", &[tensor], &[tensor]);
//! let x = fb.arg(0);
//! let neg = fb.tf_op("Neg", &[x], 1);
//! let y = fb.result(neg, 0);
//! fb.ret(&[y]);
//! let module = mb.finish();
//! assert_eq!(module.functions(&ctx).len(), 1);
//! ```

use crate::context::{BlockData, IrContext, OperationDataBuilder};
use crate::dialect::core::Module;
use crate::dialect::func::{self, Func};
use crate::dialect::{tf, tf_device};
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, Location, Span};

/// Builds a `core.module` and its top-level functions.
pub struct ModuleBuilder<'a> {
    ctx: &'a mut IrContext,
    module: Module,
    location: Location,
}

impl<'a> ModuleBuilder<'a> {
    pub fn new(ctx: &'a mut IrContext, name: &str) -> Self {
        let path = ctx.paths.intern(format!("{name}.mlir"));
        let location = Location::new(path, Span::default());
        let module = Module::create(ctx, location, Some(name));
        Self {
            ctx,
            module,
            location,
        }
    }

    pub fn ctx(&mut self) -> &mut IrContext {
        self.ctx
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Start a public function appended to the module.
    pub fn func(&mut self, name: &str, inputs: &[TypeRef], outputs: &[TypeRef]) -> FuncBuilder<'_> {
        self.add_func(name, inputs, outputs, false)
    }

    /// Start a private function appended to the module.
    pub fn private_func(&mut self, name: &str, inputs: &[TypeRef], outputs: &[TypeRef]) -> FuncBuilder<'_> {
        self.add_func(name, inputs, outputs, true)
    }

    fn add_func(&mut self, name: &str, inputs: &[TypeRef], outputs: &[TypeRef], private: bool) -> FuncBuilder<'_> {
        let location = self.location;
        let func = Func::create(self.ctx, location, Symbol::from_dynamic(name), inputs, outputs, private);
        if let Some(body) = self.module.first_block(self.ctx) {
            self.ctx.push_op(body, func.op());
        }
        let entry = func
            .entry_block(self.ctx)
            .unwrap_or_else(|| self.ctx.create_block(BlockData::new(location, [])));
        FuncBuilder {
            ctx: self.ctx,
            func,
            blocks: vec![entry],
            location,
        }
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

/// Appends operations to a function body, one block at a time.
pub struct FuncBuilder<'a> {
    ctx: &'a mut IrContext,
    func: Func,
    blocks: Vec<BlockRef>,
    location: Location,
}

impl FuncBuilder<'_> {
    pub fn ctx(&mut self) -> &mut IrContext {
        self.ctx
    }

    pub fn func(&self) -> Func {
        self.func
    }

    /// The block new operations are appended to.
    pub fn current_block(&self) -> BlockRef {
        self.blocks[self.blocks.len() - 1]
    }

    /// The i-th argument of the block currently being built.
    pub fn arg(&self, index: u32) -> ValueRef {
        self.ctx.block_arg(self.current_block(), index)
    }

    pub fn result(&self, op: OpRef, index: u32) -> ValueRef {
        self.ctx.op_result(op, index)
    }

    /// Build an operation and append it to the current block.
    pub fn append(&mut self, builder: OperationDataBuilder) -> OpRef {
        let op = builder.create(self.ctx);
        let block = self.current_block();
        self.ctx.push_op(block, op);
        op
    }

    /// Append `tf.<name>` with `num_results` tensor results.
    pub fn tf_op(&mut self, name: &str, operands: &[ValueRef], num_results: usize) -> OpRef {
        let tensor = tf::tensor_type(self.ctx);
        self.append(
            OperationDataBuilder::new(self.location, tf::DIALECT_NAME(), Symbol::from_dynamic(name))
                .operands(operands.iter().copied())
                .results(std::iter::repeat_n(tensor, num_results)),
        )
    }

    /// Append `tf.<name>` carrying the given attributes.
    pub fn tf_op_with(
        &mut self,
        name: &str,
        operands: &[ValueRef],
        num_results: usize,
        attrs: impl IntoIterator<Item = (&'static str, Attribute)>,
    ) -> OpRef {
        let op = self.tf_op(name, operands, num_results);
        for (key, value) in attrs {
            self.ctx.set_attr(op, Symbol::new(key), value);
        }
        op
    }

    /// Build a single-block region whose block takes `args`.
    pub fn region(&mut self, args: &[TypeRef], build: impl FnOnce(&mut Self)) -> RegionRef {
        let block = self
            .ctx
            .create_block(BlockData::new(self.location, args.iter().copied()));
        self.blocks.push(block);
        build(self);
        self.blocks.pop();
        self.ctx.create_single_block_region(self.location, block)
    }

    pub fn tf_yield(&mut self, values: &[ValueRef]) -> OpRef {
        self.append(
            OperationDataBuilder::new(self.location, tf::DIALECT_NAME(), tf::YIELD())
                .operands(values.iter().copied()),
        )
    }

    pub fn device_return(&mut self, values: &[ValueRef]) -> OpRef {
        self.append(
            OperationDataBuilder::new(self.location, tf_device::DIALECT_NAME(), tf_device::RETURN())
                .operands(values.iter().copied()),
        )
    }

    /// Append `tf.IfRegion` with two regions built by `then_branch` and
    /// `else_branch`; both must end in `tf.Yield`.
    pub fn if_region(
        &mut self,
        cond: ValueRef,
        num_results: usize,
        then_branch: impl FnOnce(&mut Self),
        else_branch: impl FnOnce(&mut Self),
    ) -> OpRef {
        let tensor = tf::tensor_type(self.ctx);
        let then_region = self.region(&[], then_branch);
        let else_region = self.region(&[], else_branch);
        self.append(
            OperationDataBuilder::new(self.location, tf::DIALECT_NAME(), tf::IF_REGION())
                .operand(cond)
                .results(std::iter::repeat_n(tensor, num_results))
                .region(then_region)
                .region(else_region),
        )
    }

    /// Append `tf.WhileRegion` over `inits`; `cond` and `body` blocks take
    /// one argument per carried value.
    pub fn while_region(
        &mut self,
        inits: &[ValueRef],
        cond: impl FnOnce(&mut Self),
        body: impl FnOnce(&mut Self),
    ) -> OpRef {
        let types: Vec<TypeRef> = inits.iter().map(|&v| self.ctx.value_ty(v)).collect();
        let cond_region = self.region(&types, cond);
        let body_region = self.region(&types, body);
        self.append(
            OperationDataBuilder::new(self.location, tf::DIALECT_NAME(), tf::WHILE_REGION())
                .operands(inits.iter().copied())
                .results(types.iter().copied())
                .region(cond_region)
                .region(body_region),
        )
    }

    /// Append `tf_device.replicate` with `n` replicas.
    ///
    /// `operands` hold `n` consecutive values per block argument, and the op
    /// gets `num_results` results per replica. `body` must end with
    /// `tf_device.return`. An empty `devices` leaves the attribute unset.
    pub fn replicate(
        &mut self,
        n: u64,
        operands: &[ValueRef],
        devices: Vec<Attribute>,
        num_results: usize,
        body: impl FnOnce(&mut Self),
    ) -> OpRef {
        let tensor = tf::tensor_type(self.ctx);
        let num_args = operands.len().checked_div(n as usize).unwrap_or(0);
        let region = self.region(&vec![tensor; num_args], body);
        let mut builder = OperationDataBuilder::new(self.location, tf_device::DIALECT_NAME(), tf_device::REPLICATE())
            .operands(operands.iter().copied())
            .results(std::iter::repeat_n(tensor, num_results * n.max(1) as usize))
            .attr(tf_device::ATTR_N(), n)
            .region(region);
        if !devices.is_empty() {
            builder = builder.attr(tf_device::ATTR_DEVICES(), devices);
        }
        self.append(builder)
    }

    /// Append `tf_device.cluster` whose body is built by `body`; the body
    /// must end with `tf_device.return`.
    pub fn cluster(&mut self, num_results: usize, body: impl FnOnce(&mut Self)) -> OpRef {
        let tensor = tf::tensor_type(self.ctx);
        let region = self.region(&[], body);
        self.append(
            OperationDataBuilder::new(self.location, tf_device::DIALECT_NAME(), tf_device::CLUSTER())
                .results(std::iter::repeat_n(tensor, num_results))
                .region(region),
        )
    }

    /// Terminate the function with `func.return`.
    pub fn ret(&mut self, values: &[ValueRef]) -> OpRef {
        let op = func::create_return(self.ctx, self.location, values);
        let block = self.current_block();
        self.ctx.push_op(block, op);
        op
    }
}
