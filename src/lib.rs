//! Stamp a semi-transparent watermark onto photos and keep a history of
//! exports.
//!
//! The watermark is scaled to a fixed 100x100 tile, every visible pixel of it
//! gets the same alpha level, and it is pasted 10px in from one of the four
//! corners of the photo. Exports are written next to each other in an output
//! directory and recorded in a small SQLite table.
//!
//! # Quick Start
//!
//! ```no_run
//! use photo_watermark::{composite, Anchor, Opacity};
//!
//! let photo = image::open("photo.jpg").unwrap();
//! let logo = image::open("logo.png").unwrap();
//! let opacity = Opacity::from_percent(60).unwrap();
//! let stamped = composite(&photo, &logo, opacity, Anchor::BottomRight);
//! stamped.save("stamped.png").unwrap();
//! ```
//!
//! # Sessions and history
//!
//! [`Session`] holds the current selections and writes exports through a
//! [`HistoryStore`]:
//!
//! ```no_run
//! use std::path::Path;
//! use photo_watermark::{Anchor, HistoryStore, Opacity, Session};
//!
//! let store = HistoryStore::open("history.db").unwrap();
//! let mut session = Session::new(Opacity::OPAQUE, Anchor::TopRight);
//! session.select_image("photo.jpg").unwrap();
//! session.select_watermark("logo.png").unwrap();
//! let outcome = session.export(&store, Path::new("output images")).unwrap();
//! println!("saved {}", outcome.output_path.display());
//!
//! for record in store.list().unwrap() {
//!     println!("{} {}", record.timestamp, record.display_name());
//! }
//! ```

#![deny(missing_docs)]

pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod preview;
mod session;

pub use compositor::{composite, Anchor, Opacity, ParseAnchorError};
pub use config::Config;
pub use error::{Error, Result, Selection};
pub use history::{DeleteReport, FileRemoval, HistoryRecord, HistoryStore, RecordId};
pub use session::{delete_confirmed, ExportOutcome, Session};
