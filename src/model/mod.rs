//! Domain models shared by the store and onboarding layers.

pub mod block;
pub mod user;

pub use block::{Block, BlockFields, BlockType, Container, ContentOrderEntry, new_block_id};
pub use user::{UserPropPatch, UserProps};
