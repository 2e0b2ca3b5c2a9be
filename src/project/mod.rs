//! Project descriptor (`project.json`) and per-build identity.
//!
//! A project directory holds scripts plus a descriptor naming the package,
//! versions, the entry script and the build counter. Every build rewrites the
//! descriptor with a fresh [`BuildInfo`].

mod build_info;
mod descriptor;

pub use build_info::BuildInfo;
pub use descriptor::{DESCRIPTOR_FILE_NAME, ProjectDescriptor};
