//! Core data types for entity matching.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Schema`](schema::Schema): The entity type taxonomy (`Person`, `Company`, ...)
//! - [`EntityExample`](entity::EntityExample): A raw query-by-example entity
//! - [`ExampleEntity`](entity::ExampleEntity): A validated example entity
//! - [`EntityRecord`](entity::EntityRecord): An entity as stored in the index
//! - [`Dataset`](dataset::Dataset): A data source or collection in the catalog
//! - [`TraceToken`](types::TraceToken), [`Total`](types::Total): Request metadata types
//!
//! ## Properties
//!
//! All properties are multi-valued. Their type decides how they are used:
//!
//! | Type       | Query signal              | Example properties           |
//! |------------|---------------------------|------------------------------|
//! | name       | fuzzy text on `names`     | name, alias, previousName    |
//! | identifier | exact term `identifiers`  | registrationNumber, imoNumber|
//! | date       | exact term `dates`        | birthDate, incorporationDate |
//! | country    | exact term `countries`    | nationality, jurisdiction    |
//! | entity     | none (used for nesting)   | Sanction.entity              |

pub mod dataset;
pub mod entity;
pub mod schema;
pub mod types;
