/**********************************************
  > File Name		: mod.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! B+-tree indexes over recids, stored in paged files managed by
//! `page_management`, mirroring the original access-method (AM) layer.
//! Indexed attributes are fixed-length `INT`, `FLOAT` or `CHAR(n)` values;
//! duplicate keys are chained through an in-page overflow pool rather than
//! forcing a leaf split (see `DESIGN.md`).

pub mod attr;
pub mod node;
pub mod scan;
pub mod tree;

#[cfg(test)]
mod tests;

pub use attr::AttrType;
pub use scan::ScanOp;
pub use tree::IndexHandle;
