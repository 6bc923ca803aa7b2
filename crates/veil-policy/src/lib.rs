mod authority;
mod errors;
mod evaluator;
mod registry;

pub use authority::AuthorityPattern;
pub use errors::PolicyError;
pub use evaluator::PassThroughEvaluator;
pub use registry::{PassThroughEntry, PassThroughRegistry, PassThroughRule};
