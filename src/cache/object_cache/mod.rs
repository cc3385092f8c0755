pub mod moka;
pub mod null;

pub use moka::MokaObjectCache;
pub use null::NullObjectCache;
