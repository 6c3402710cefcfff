//! The library code for the `catalog` content builder. A site's catalog is
//! authored as CSV files (one directory per collection) plus a directory of
//! Markdown pages, and building it is broken into two steps:
//!
//! 1. Loading and validating content ([`crate::collection`], [`crate::page`])
//! 2. Publishing the validated content as JSON ([`crate::build`])
//!
//! The first step is where the real work happens. Every CSV row is validated
//! against its collection's schema ([`crate::pipeline`],
//! [`crate::resource`]); every field is checked so that a failed build lists
//! all of the problems with a row at once, annotated with the file and line it
//! came from. Keyword cells are split on commas into trimmed lists.
//!
//! Once loaded, content is read-only and can be queried through
//! [`crate::query::Catalog`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod collection;
pub mod config;
pub mod page;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod resource;
