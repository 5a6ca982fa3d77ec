#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

mod log;

pub mod protocol;

mod router;
pub use router::*;

mod sink;
pub use sink::*;
