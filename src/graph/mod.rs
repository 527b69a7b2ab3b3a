//! Calendar renderings of cleaned tables.
//!
//! A [heatmap::Heatmap] shows how many resolutions were met each day, a
//! [minimap::MinimapSet] shows one small calendar per resolution. Both are saved as svg files
//! with a fixed name and can also be printed to a terminal.

mod canvas;
pub mod grid;
pub mod heatmap;
pub mod minimap;
pub mod notable;
pub mod palette;
pub mod terminal;
