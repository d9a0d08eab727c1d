/**********************************************
  > File Name		: record_management/mod.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! The record_management component lays variable-length records out on top
//! of paged_file pages using a slot directory per page, mirroring the
//! original splayer's page header `{magic, slot_count, free_offset,
//! free_space}` plus a slot array growing from the front while record data
//! grows down from the end of the page.

pub mod file;
pub mod slotted_page;

#[cfg(test)]
mod tests;

pub use file::RecordFile;
pub use slotted_page::RecId;
