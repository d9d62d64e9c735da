//! # elastic-scout
//!
//! Finds publicly exposed Elasticsearch servers through the Shodan host
//! search API, enumerates their indices, and pulls sample documents into a
//! local SQLite database for later review.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  search  │──▶│  scrape  │──▶│  sample  │──▶│   dump   │
//! │  Shodan  │   │  _stats  │   │ _search  │   │   JSON   │
//! └────┬─────┘   └────┬─────┘   └────┬─────┘   └──────────┘
//!      ▼              ▼              ▼
//! ip_search_result  es_indexes    es_samples        (SQLite)
//! ```
//!
//! Every stage reads what the previous one wrote and upserts on the row's
//! natural key, so any stage can be re-run or resumed without duplicates.
//!
//! ## Quick Start
//!
//! ```bash
//! escout create data.db
//! escout search --database data.db --api-key $KEY "country:DE"
//! escout scrape --database data.db
//! escout sample --database data.db --count 10
//! escout dump --database data.db > samples.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Connection pool and lock-contention retry |
//! | [`migrate`] | Schema bootstrap |
//! | [`store`] | Upserts and reads for the three relations |
//! | [`exclusion`] | Index exclusion rules |
//! | [`shodan`] | Shodan client and search cursor |
//! | [`elastic`] | Elasticsearch client |
//! | [`ingest`] | `search` stage |
//! | [`scrape`] | `scrape` stage |
//! | [`sample`] | `sample` stage |
//! | [`dump`] | JSON export |
//! | [`workers`] | Bounded worker pool |
//! | [`progress`] | Stage progress bar on stderr |

pub mod config;
pub mod db;
pub mod dump;
pub mod elastic;
pub mod exclusion;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod sample;
pub mod scrape;
pub mod shodan;
pub mod stats;
pub mod store;
pub mod traits;
pub mod units;
pub mod workers;
