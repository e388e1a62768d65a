//! Tile subsystem (C5-C8): aggregates many CVF2 files on a regular tile grid, maintains a bounded
//! pool of open readers, and answers point/bbox queries and pyramid-build requests.

pub mod index;
pub mod manager;
pub mod pool;
pub mod pyramid;
pub mod query;
pub mod slippy;

pub use index::{ScanReport, Tile, TileErrorFlags};
pub use manager::TileManager;
pub use pool::LruPool;
pub use pyramid::{render_downsampled_meta_tiles, render_meta_tiles, MetaTilePathFn, PyramidReport};
pub use query::RenderScratch;
pub use slippy::{default_meta_tile_path, meta_tile_bbox_lonlat, meta_tile_range_for_bbox, MetaTileRange};
