#![doc = "Core timing engine for the MBot time-base subsystem."]

pub mod broadcaster;
pub mod clock;
pub mod pacer;

pub use broadcaster::*;
pub use clock::*;
pub use pacer::*;
