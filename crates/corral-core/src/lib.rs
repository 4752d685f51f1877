// corral-core: Environment handle, index subsets, batched tensors, and errors
// for the Corral manager engine.

pub mod batch;
pub mod env;
pub mod error;
pub mod subset;
