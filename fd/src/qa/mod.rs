//! QA iteration loop

mod r#loop;

pub use r#loop::{QaLoop, QaLoopConfig, QaLoopResult};
