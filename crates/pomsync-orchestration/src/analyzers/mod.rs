//! Analyzer components: versions, descriptor documents and project discovery

pub mod document;
pub mod encoding;
pub mod version;
pub mod workspace_scanner;

pub use document::{Element, Node, XmlDocument};
pub use encoding::Encoding;
pub use version::Version;
pub use workspace_scanner::WorkspaceScanner;
