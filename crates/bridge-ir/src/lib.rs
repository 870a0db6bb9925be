//! Arena-based mutable IR for lowering TensorFlow functional graphs to the
//! executor dialect.
//!
//! All entities live in an [`IrContext`] and are addressed by small `Copy`
//! references ([`OpRef`], [`ValueRef`], ...). Use-chains are maintained by the
//! context, so replacing a value is a single call.

pub mod builder;
pub mod context;
pub mod dialect;
pub mod helpers;
pub mod printer;
pub mod refs;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

pub use context::{BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use};
pub use dialect::core::Module;
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use types::{Attribute, Location, Span, TypeData, TypeDataBuilder};
pub use validation::{ValidationError, ValidationResult, validate_module};
