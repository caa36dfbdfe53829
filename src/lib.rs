//! mqlhelp - offline MQL5 documentation lookup with a compiler error
//! knowledge base.
//!
//! mqlhelp indexes the HTML reference and the markdown books that ship next
//! to it, answers free-form queries with condensed extracts, and remembers
//! compiler errors together with their fixes in a local
//! [redb](https://github.com/cberner/redb) store. The same operations are
//! exposed as MCP tools over stdio.
//!
//! # Quick start
//!
//! ```no_run
//! use mqlhelp::{DataDir, DocIndex, DocRoots, ErrorStore, QueryEngine};
//! use mqlhelp::formatter::{self, Mode};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let roots = DocRoots::resolve(None).unwrap();
//! let index = DocIndex::build(&roots).unwrap();
//! let store = ErrorStore::new(data_dir.errors_db());
//!
//! let engine = QueryEngine::new(&index, &store);
//! let result = engine.query("OrderSend", Mode::Quick).unwrap();
//! println!("{}", formatter::render_text(&result, "OrderSend"));
//! ```

pub mod classifier;
pub mod data_dir;
pub mod doc_index;
pub mod docs;
pub mod engine;
pub mod error;
pub mod error_store;
pub mod extractor;
pub mod formatter;
pub mod mcp;
pub mod migration;
pub mod ranker;
pub mod report;
pub mod text_util;
pub mod walker;

pub use data_dir::{DataDir, DocRoots};
pub use doc_index::{Collection, DocIndex};
pub use engine::QueryEngine;
pub use error::{Error, Result};
pub use error_store::ErrorStore;
