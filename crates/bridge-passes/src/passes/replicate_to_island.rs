//! Expand `tf_device.replicate` into one island per replica.
//!
//! Each replica gets a copy of the replicate body with the block arguments
//! bound to that replica's operands. Inside the copy:
//!
//! - `TPU_REPLICATED_CORE_<k>` device aliases become `devices[k][r]`,
//! - ops carrying `device_ordinal` are tagged with `_xla_replica_id = r`,
//! - `tf._TPUDeviceOrdinalPlaceholder` becomes a `tf.Const` of the replica's
//!   device ordinal.
//!
//! Replicate result `i * n + r` is the `i`-th value returned by replica `r`.

use bridge_ir::dialect::tf_device::{self, Replicate};
use bridge_ir::dialect::tf_executor::{self, Island};
use bridge_ir::dialect::{body_ops_without_terminator, tf};
use bridge_ir::helpers::{ValueMapping, clone_op, erase_op};
use bridge_ir::walk::collect_ops;
use bridge_ir::{Attribute, IrContext, OpRef, TypeRef, ValueRef};

use crate::islands::{function_islands, retire_island, split_island};
use crate::pass::{Pass, PassFailure, PassResult};

pub struct ReplicateToIsland;

pub fn create_replicate_to_island_pass() -> Box<dyn Pass> {
    Box::new(ReplicateToIsland)
}

impl Pass for ReplicateToIsland {
    fn name(&self) -> &'static str {
        "ReplicateToIslandPass"
    }

    fn argument(&self) -> &'static str {
        "tf-replicate-to-island"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        for island in function_islands(ctx, op) {
            let Some(replicate) = island.single_op(ctx).and_then(|o| Replicate::from_op(ctx, o)) else {
                continue;
            };
            expand_replicate(ctx, island, replicate)?;
        }
        Ok(())
    }
}

fn expand_replicate(ctx: &mut IrContext, island: Island, replicate: Replicate) -> PassResult {
    let n = match replicate.n(ctx) {
        Some(0) | None => {
            return Err(PassFailure::new(
                "tf_device.replicate must have a positive replica count `n`",
            ));
        }
        Some(n) => n as usize,
    };
    let body = replicate
        .block(ctx)
        .ok_or_else(|| PassFailure::new("tf_device.replicate has no body"))?;
    let num_args = ctx.block(body).args.len();
    if ctx.op_operands(replicate.op()).len() != num_args * n {
        return Err(PassFailure::new(format!(
            "tf_device.replicate expects {} operands for {num_args} block arguments and n = {n}, found {}",
            num_args * n,
            ctx.op_operands(replicate.op()).len()
        )));
    }
    let terminator = ctx
        .block_terminator(body)
        .filter(|&t| ctx.is_op(t, tf_device::DIALECT_NAME(), tf_device::RETURN()))
        .ok_or_else(|| PassFailure::new("tf_device.replicate body is not terminated by tf_device.return"))?;
    let num_returned = ctx.op_operands(terminator).len();
    if ctx.op_results(replicate.op()).len() != num_returned * n {
        return Err(PassFailure::new(format!(
            "tf_device.replicate returns {num_returned} values per replica but has {} results for n = {n}",
            ctx.op_results(replicate.op()).len()
        )));
    }

    let devices = replicate.devices(ctx);
    let body_ops = body_ops_without_terminator(ctx, body);
    let returned = ctx.op_operands(terminator).to_vec();
    let return_types: Vec<TypeRef> = returned.iter().map(|&v| ctx.value_ty(v)).collect();
    let controls = island.control_inputs(ctx).to_vec();
    let location = ctx.op(island.op()).location;
    let graph_block = ctx
        .op(island.op())
        .parent_block
        .ok_or_else(|| PassFailure::new("replicate island is detached"))?;

    let mut replicas = Vec::with_capacity(n);
    for r in 0..n {
        let replica = Island::create(ctx, location, &return_types, &controls);
        ctx.insert_op_before(graph_block, island.op(), replica.op());
        let replica_block = replica
            .block(ctx)
            .ok_or_else(|| PassFailure::new("replica island has no body"))?;

        let mut mapping = ValueMapping::new();
        for a in 0..num_args {
            let arg = ctx.block_arg(body, a as u32);
            let operand = replicate.replica_operand(ctx, a, r, n);
            mapping.map(arg, operand);
        }
        let mut cloned = Vec::with_capacity(body_ops.len());
        for &body_op in &body_ops {
            let op = clone_op(ctx, body_op, &mut mapping);
            ctx.push_op(replica_block, op);
            cloned.push(op);
        }
        let yielded: Vec<ValueRef> = returned.iter().map(|&v| mapping.lookup(v)).collect();
        let y = tf_executor::create_yield(ctx, location, &yielded);
        ctx.push_op(replica_block, y);
        // Placeholders are replaced through their uses, so the whole replica
        // must be cloned first.
        for op in cloned {
            specialize_for_replica(ctx, op, r, &devices)?;
        }
        replicas.push(replica);
    }

    let results = ctx.op_results(replicate.op()).to_vec();
    for (k, result) in results.into_iter().enumerate() {
        let (i, r) = (k / n, k % n);
        let output = replicas[r].outputs(ctx)[i];
        ctx.replace_all_uses(result, output);
    }

    let replacements = match island.yield_op(ctx) {
        Some(y) => ctx.op_operands(y).to_vec(),
        None => Vec::new(),
    };
    let replica_controls: Vec<ValueRef> = replicas.iter().map(|r| r.control(ctx)).collect();
    retire_island(ctx, island, &replacements, &replica_controls);
    tracing::debug!(replicas = n, "expanded tf_device.replicate");

    for replica in replicas {
        split_island(ctx, replica);
    }
    Ok(())
}

/// Rewrite a freshly cloned op (and everything nested in it) for replica `r`.
fn specialize_for_replica(ctx: &mut IrContext, root: OpRef, r: usize, devices: &[Vec<String>]) -> PassResult {
    let mut ops = vec![root];
    ops.extend(collect_ops(ctx, root, |_| true));
    for op in ops {
        if let Some(k) = tf::device(ctx, op).and_then(tf_device::parse_replicated_core_alias) {
            let device = devices
                .get(k)
                .and_then(|row| row.get(r))
                .ok_or_else(|| {
                    PassFailure::new(format!(
                        "no device for {} in replica {r}",
                        tf_device::replicated_core_alias(k)
                    ))
                })?
                .clone();
            ctx.set_attr(op, tf::ATTR_DEVICE(), Attribute::from(device));
        }
        if ctx.attr(op, tf::ATTR_DEVICE_ORDINAL()).is_some() {
            ctx.set_attr(op, tf::ATTR_XLA_REPLICA_ID(), Attribute::from(r as u64));
        }
        if ctx.is_op(op, tf::DIALECT_NAME(), tf::DEVICE_ORDINAL_PLACEHOLDER()) {
            replace_ordinal_placeholder(ctx, op, device_ordinal(devices, r))?;
        }
    }
    Ok(())
}

/// The ordinal of replica `r`'s first device, falling back to `r` when the
/// device table does not name one.
fn device_ordinal(devices: &[Vec<String>], r: usize) -> i64 {
    devices
        .first()
        .and_then(|row| row.get(r))
        .and_then(|device| device.rsplit(':').next())
        .and_then(|ordinal| ordinal.parse().ok())
        .unwrap_or(r as i64)
}

fn replace_ordinal_placeholder(ctx: &mut IrContext, placeholder: OpRef, ordinal: i64) -> PassResult {
    let block = ctx
        .op(placeholder)
        .parent_block
        .ok_or_else(|| PassFailure::new("ordinal placeholder is detached"))?;
    let location = ctx.op(placeholder).location;
    let constant = tf::create_int_const(ctx, location, ordinal);
    if let Some(device) = ctx.attr(placeholder, tf::ATTR_DEVICE()).cloned() {
        ctx.set_attr(constant, tf::ATTR_DEVICE(), device);
    }
    ctx.insert_op_before(block, placeholder, constant);
    let results = ctx.op_results(placeholder).to_vec();
    if let Some(&value) = ctx.op_results(constant).first() {
        for result in results {
            ctx.replace_all_uses(result, value);
        }
    }
    erase_op(ctx, placeholder);
    Ok(())
}
