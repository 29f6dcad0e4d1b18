//! Ingestion, ranking and querying for the Vicinity nearby-feed pipeline.
//!
//! This crate wires the leaf crates together: producers feed the event
//! store through a bounded fan-in, and the query service combines the
//! neighbor finder with the content ranker.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait for event timestamps, with system and
//!   manual implementations.
//! - [`config`] -- Configuration loading from `vicinity-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- Shared stop/pause state and run boundaries.
//! - [`ingest`] -- [`ProducerPool`], the fan-in conduit, and ingest counters.
//! - [`query`] -- [`QueryService`], the single read entry point.
//! - [`ranker`] -- Popularity ordering of a neighborhood's content.
//! - [`runner`] -- The periodic query loop.
//! - [`source`] -- [`EventSource`] trait with random and scripted sources.
//!
//! [`Clock`]: clock::Clock
//! [`ProducerPool`]: ingest::ProducerPool
//! [`QueryService`]: query::QueryService
//! [`EventSource`]: source::EventSource

pub mod clock;
pub mod config;
pub mod control;
pub mod ingest;
pub mod query;
pub mod ranker;
pub mod runner;
pub mod source;
