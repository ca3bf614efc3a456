//! param/mod.rs
//! Messages exchanged by ports and the operations combining them.

pub mod cartesian;
pub mod error;
pub mod load_ops;
pub mod math_ops;
pub mod random;
pub mod response_ops;
pub mod types;

pub use error::ParamError;
pub use random::Sampler;
pub use types::{
    Aspect, AspectType, GraphParam, MessageParam, NumberParam, ParamType, RandomDistribution, RandomNumberParam,
    ResponseAspect, ResponseAspectType, ResponseEntry, ResponseNumberParam, ResponseValue, NORM_FREQ, UNKNOWN_SLICE,
};
