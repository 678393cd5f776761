pub mod assets;
pub mod config;
pub mod error;
pub mod feeds;
pub mod helpers;
pub mod pagination;
pub mod parsing;
pub mod pipeline;
pub mod search;
pub mod site;
pub mod sitemap;
pub mod theme;
pub mod types;
pub mod xml;

pub use assets::{copy_static, minify_output};
pub use config::*;
pub use error::*;
pub use pagination::*;
pub use parsing::*;
pub use pipeline::*;
pub use site::*;
pub use theme::*;
pub use types::*;
