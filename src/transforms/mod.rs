//! Post-resolution tree rewrites.
//!
//! Both passes run between resolution and backend printing, in order:
//! property-type coercion first (it annotates rollup requests the planner
//! reads), then lazy-join materialization. Both are idempotent so a
//! replanned tree prints identically.

pub mod lazy_joins;
pub mod property_types;
