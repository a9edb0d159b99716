//! Spreadsheet and JSON I/O.
//!
//! # Architecture
//!
//! - **Row codec** ([`RowCodec`]) converts records to flat rows and back
//! - **Format adapters** implement [`SheetSource`] and [`SheetSink`]
//! - JSON bypasses the codec: it carries records in their nested shape
//!
//! # Supported Formats
//!
//! | Format | Import | Export | Notes |
//! |--------|--------|--------|-------|
//! | JSON | ✓ | ✓ | Bare batch or `{version, timestamp, data}` document |
//! | CSV | ✓ | ✓ | One sheet per file |
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetbridge::io::{Format, RowCodec};
//!
//! let codec = RowCodec::new(&registry, &config.codec);
//! let row = codec.flatten(&record, record_type);
//! let back = codec.unflatten(&row, record_type);
//! ```

pub mod codec;
pub mod formats;
pub mod traits;

pub use codec::RowCodec;
pub use formats::Format;
pub use traits::{SheetSink, SheetSource};
