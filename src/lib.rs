pub mod util;
pub use util::*;

mod custom_trait;
mod geometry;

mod rtree;
pub use rtree::*;

mod rtree_id;
pub use rtree_id::*;

pub mod helper;
pub mod k_selector;
pub mod num_formater;
pub mod scipy;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod class;
pub use class::*;

mod design;
pub use design::*;

mod timing;
pub use timing::*;

mod tray;
pub use tray::*;

mod inventory;
pub use inventory::*;

mod cluster;
pub use cluster::*;

mod assignment;
pub use assignment::*;

mod multistart;
pub use multistart::*;

mod legalizer;
pub use legalizer::*;

mod observer;
pub use observer::*;

mod report;
pub use report::*;

mod mbffg;
pub use mbffg::*;
