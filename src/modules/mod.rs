//! Built-in modules.
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | [`Documents`] | create documents, or pull other pipelines' output    |
//! | [`ReadFiles`] | read input files matching glob patterns              |
//! | [`WriteFiles`]| write documents under the output directory           |
//! | [`Concat`]    | append the output of child modules to the inputs     |
//! | [`Execute`]   | run a closure per document                           |
//! | [`OrderBy`]   | sort by a metadata key                               |
//! | [`GroupBy`]   | group by a metadata key                              |
//! | [`Paginate`]  | split into fixed-size pages                          |

mod concat;
mod documents;
mod execute;
mod files;
mod group_by;
mod order_by;
mod paginate;

pub use concat::Concat;
pub use documents::Documents;
pub use execute::Execute;
pub use files::{ReadFiles, WriteFiles};
pub use group_by::GroupBy;
pub use order_by::OrderBy;
pub use paginate::Paginate;
