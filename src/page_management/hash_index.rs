/**********************************************
  > File Name		: page_management/hash_index.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Maps resident `(file, page)` pairs to the buffer-pool frame holding them.
//! The original PF layer used a fixed bucket array with manual chaining
//! (`PFhash(fd,page) = (fd+page) % PF_HASH_TBL_SIZE`); a `HashMap` gives the
//! same O(1) find/insert/delete contract without reproducing that array by
//! hand, while still enforcing the same presence/absence failure modes.

use std::collections::HashMap;

use crate::errors::PfError;

use super::{FileId, PageNum};

#[derive(Debug, Default)]
pub struct HashIndex {
    table: HashMap<(FileId, PageNum), usize>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn find(&self, file: FileId, page: PageNum) -> Option<usize> {
        self.table.get(&(file, page)).copied()
    }

    pub fn insert(&mut self, file: FileId, page: PageNum, frame: usize) -> Result<(), PfError> {
        if self.table.contains_key(&(file, page)) {
            return Err(PfError::HashPageExist);
        }
        self.table.insert((file, page), frame);
        Ok(())
    }

    pub fn delete(&mut self, file: FileId, page: PageNum) -> Result<(), PfError> {
        if self.table.remove(&(file, page)).is_none() {
            return Err(PfError::HashNotFound);
        }
        Ok(())
    }
}
