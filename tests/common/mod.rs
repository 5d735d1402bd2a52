#![allow(dead_code)]

pub mod builders;
pub mod scripted_executor;
pub mod strategies;

pub use builders::*;
pub use scripted_executor::*;
pub use strategies::*;
