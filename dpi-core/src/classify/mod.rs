//! ## dpi-core::classify
//! **Application tags and the SNI classifier contract**
//!
//! Application identifiers form an open registry rather than a closed enum, so
//! deployments add new ones from configuration. Classification is a total,
//! deterministic function from a server name to a tag, with
//! [`AppTag::UNKNOWN`] for anything unmatched. Matching rules are input: the
//! only built-in implementation is an exact-match [`RuleTable`].

pub mod registry;
pub mod rules;

pub use registry::{AppRegistry, AppTag, DEFAULT_APPS};
pub use rules::RuleTable;

/// Maps a server name indicator to an application tag.
pub trait SniClassifier: Send + Sync {
    /// Must be deterministic and return [`AppTag::UNKNOWN`] when nothing matches.
    fn classify(&self, server_name: &str) -> AppTag;
}

/// Classifier that knows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClassifier;

impl SniClassifier for NullClassifier {
    fn classify(&self, _server_name: &str) -> AppTag {
        AppTag::UNKNOWN
    }
}
