//! General-purpose containers shared by the stratum workspace.

mod aligned_byte_vec;
mod key_index_mapper;

pub use aligned_byte_vec::{AlignedByteVec, Alignment};
pub use key_index_mapper::KeyIndexMapper;
