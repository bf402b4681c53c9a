pub mod analysis;
pub mod enums;
pub mod intel;
pub mod run;

pub use analysis::*;
pub use enums::*;
pub use intel::*;
pub use run::*;
