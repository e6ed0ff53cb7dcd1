//! kartei is an engine for Zettelkasten-style note collections: plain
//! markdown documents named by a 14-digit identity, linked with `[[id]]`
//! tokens, and tagged on a `Tags:` line.
//!
//! The engine has four layers:
//!
//! - a structural [`Scanner`] that annotates each line of a document with
//!   code-block membership and the active heading path,
//! - a [`Note`] parser extracting title, tags, and outbound links,
//! - the [`Zettelkasten`] graph with derived views (root, depth, backlinks,
//!   orphans) and a tiered [`search`](Zettelkasten::search),
//! - a [`NoteTransformer`] that rewrites documents in place: heading
//!   normalization, tag maintenance, link annotation, and a regenerated
//!   backlinks section. Rewriting is idempotent.
//!
//! Recoverable conditions are reported through an injected
//! [`DiagnosticSink`] instead of a global logger; the default [`LogSink`]
//! forwards to the `log` facade.
//!
//! ```no_run
//! use kartei::{NoteTransformer, Zettelkasten};
//!
//! # fn main() -> kartei::Result<()> {
//! let mut zk = Zettelkasten::default();
//! zk.ingest_directory(std::path::Path::new("my-notes"))?;
//!
//! let transformer = NoteTransformer::new(&zk);
//! for note in zk.notes() {
//!     transformer.transform_write(note, None)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod config;
pub mod diag;
pub mod error;
pub mod id;
pub mod kasten;
pub mod note;
pub mod scanner;
pub mod transform;

pub use color::{ColorConfig, FALLBACK_COLOR};
pub use config::{KastenConfig, RootSelection};
pub use diag::{Diagnostic, DiagnosticSink, LogSink, MemorySink, Severity};
pub use error::{KastenError, Result};
pub use id::{
    extract_identity, find_identities, identity_for_path, path_with_identity, IdentityMatch,
    NoteId, ID_LEN,
};
pub use kasten::{Stats, Zettelkasten, DEFAULT_DEPTH};
pub use note::{Note, NoteSummary};
pub use scanner::{LineRecord, Scanner};
pub use transform::{format_tags, NoteTransformer};
