pub mod preprocessing;
pub mod binarization;
pub mod labeling;
pub mod regions;
pub mod index;

pub use preprocessing::*;
pub use binarization::*;
pub use labeling::*;
pub use regions::*;
pub use index::*;
