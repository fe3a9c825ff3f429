pub mod effect;

pub use effect::{CallEffect, CallEffectKind};
