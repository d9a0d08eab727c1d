/**********************************************
  > File Name		: indexing/attr.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Indexed attribute types and the 3-way comparator used throughout the
//! B+-tree, mirroring `AM_Compare`'s dispatch on `attrType`.

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::AmError;

pub const MAX_ATTR_LENGTH: u16 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Float,
    Char,
}

impl AttrType {
    pub fn tag(&self) -> u8 {
        match self {
            AttrType::Int => 0,
            AttrType::Float => 1,
            AttrType::Char => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, AmError> {
        match tag {
            0 => Ok(AttrType::Int),
            1 => Ok(AttrType::Float),
            2 => Ok(AttrType::Char),
            _ => Err(AmError::InvalidAttrType),
        }
    }
}

/// Validates that `attr_length` is sane for `attr_type`, mirroring
/// `AME_INVALIDATTRLENGTH`: 4 bytes for int/float, 1..=255 for char.
pub fn check_attr_length(attr_type: AttrType, attr_length: u16) -> Result<(), AmError> {
    let ok = match attr_type {
        AttrType::Int | AttrType::Float => attr_length == 4,
        AttrType::Char => attr_length >= 1 && attr_length <= MAX_ATTR_LENGTH,
    };
    if ok {
        Ok(())
    } else {
        Err(AmError::InvalidAttrLength(attr_length as usize))
    }
}

/// Three-way comparison of two attribute values of the same type/length.
pub fn compare(a: &[u8], b: &[u8], attr_type: AttrType) -> Ordering {
    match attr_type {
        AttrType::Int => LittleEndian::read_i32(a).cmp(&LittleEndian::read_i32(b)),
        AttrType::Float => LittleEndian::read_f32(a)
            .partial_cmp(&LittleEndian::read_f32(b))
            .unwrap_or(Ordering::Equal),
        AttrType::Char => a.cmp(b),
    }
}
