pub mod run;
pub mod workflow;

pub use run::*;
pub use workflow::*;
