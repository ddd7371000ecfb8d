//! weaver-delta: the operation algebra behind weaver rich-text documents.
//!
//! A document, and every edit to one, is a `Delta`: an ordered list of
//! insert / retain / delete operations. Inserts carry either a text run or a
//! single embed, plus an `AttributeMap` of formats.
//!
//! All lengths are measured in Unicode scalar values (chars). An embed
//! occupies exactly one unit.

pub mod attributes;
mod delta;
mod iter;
mod op;

pub use attributes::AttributeMap;
pub use delta::{Delta, Line};
pub use iter::OpIterator;
pub use op::{Embed, Insert, Op, OpKind};
