//! Dataset catalog storage.
//!
//! The catalog lists the datasets a query can be scoped to. Datasets can be
//! collections of other datasets: scoping a query to a collection scopes it to
//! the collection and every dataset it transitively contains. An embedded
//! catalog is compiled into the binary, but custom catalogs can also be loaded
//! from JSON files.
//!
//! ## Example
//!
//! ```rust
//! use entity_matcher::DatasetCatalog;
//!
//! let catalog = DatasetCatalog::load_embedded().unwrap();
//!
//! let sanctions = catalog.resolve("sanctions").unwrap();
//! for name in catalog.scope(sanctions) {
//!     println!("{name}: {}", catalog.title(&name));
//! }
//! ```
//!
//! ## Custom Catalogs
//!
//! ```rust,no_run
//! use entity_matcher::DatasetCatalog;
//! use std::path::Path;
//!
//! let catalog = DatasetCatalog::load_embedded().unwrap();
//! let json = catalog.to_json().unwrap();
//!
//! let custom = DatasetCatalog::load_from_file(Path::new("my_catalog.json")).unwrap();
//! ```

pub mod store;

pub use store::{CatalogError, DatasetCatalog, DatasetNotFound};
