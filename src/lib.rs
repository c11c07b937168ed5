//! # Gemstore
//!
//! Backend for a gem and jewelry retailer: catalog CRUD with filtered and
//! paginated listings, category indexes, contact and custom-design
//! submissions, orders, and image uploads, served as a JSON HTTP API.
//!
//! Domain logic lives in the `gemstore-core` crate. This crate supplies the
//! SQLite document store, configuration, the HTTP layer, and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │   HTTP   │──▶│ Repositories │──▶│ DocumentStore │
//! │  (axum)  │   │    (core)    │   │ SQLite/memory │
//! └────┬─────┘   └──────────────┘   └───────────────┘
//!      │
//!      ▼
//! ┌──────────┐
//! │ uploads/ │
//! └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gemstore init                 # create database
//! gemstore serve                # start HTTP API
//! gemstore reconcile-types      # merge duplicate category entries
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection and store selection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`response`] | Response envelope and error mapping |
//! | [`uploads`] | Request payloads and image storage |
//! | [`server`] | HTTP API |
//! | [`reconcile`] | Category index reconciliation |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod reconcile;
pub mod response;
pub mod server;
pub mod sqlite_store;
pub mod uploads;
