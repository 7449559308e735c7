//! Static data loading for the Brachisto engine.
//!
//! Data files live in one directory and are found by base name with a
//! `.ron`, `.toml` or `.json` extension: `orbital_mechanics`, `buildings`,
//! `research_trees` and `economic_rules`. A missing file falls back to the
//! built-in defaults in [`defaults`].

pub mod defaults;
pub mod game_data;
pub mod loader;

pub use game_data::{GameData, load_game_data, load_game_data_or_default};
pub use loader::{DataLoadError, Format, deserialize_file, deserialize_list, find_data_file};
