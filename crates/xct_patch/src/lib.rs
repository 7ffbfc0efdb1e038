//! Text and binary patch engines.
//!
//! Text patches ([`DiffPatch`]) are zero-context line diffs that replay with a
//! running line offset and verify every deleted line. Markup can optionally be
//! passed through [`canonicalize_markup`] first so that cosmetic reformatting
//! by external editors does not show up as changes.
//!
//! Binary patches ([`BinaryPatch`]) are equal-length byte substitutions that
//! only apply when the bytes at the offset match a recorded reference.
//!
//! # Example
//!
//! ```
//! use xct_patch::DiffPatch;
//!
//! let patch = DiffPatch::generate("A;10;20;B;\n", "A;15;20;B;\n");
//! assert_eq!(patch.to_patch_string(), "@@ -1 +1 @@\n-A;10;20;B;\n+A;15;20;B;\n");
//! assert_eq!(patch.replay("A;10;20;B;\n").unwrap(), "A;15;20;B;\n");
//! ```

pub mod binary;
pub mod canonical;
pub mod diff;
pub mod error;
pub mod text;

pub use binary::{apply_batch, header_len_for, load_descriptors, BatchReport, BinaryPatch};
pub use canonical::{canonicalize_markup, CanonicalOptions};
pub use error::{Error, Result};
pub use text::{DiffPatch, Hunk, CANONICAL_MARKER};
