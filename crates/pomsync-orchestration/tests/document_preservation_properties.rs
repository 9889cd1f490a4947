//! Property-based tests for lossless descriptor editing
//!
//! Descriptors are generated with random layout between elements; editing a
//! value must leave every other byte where it was.

use proptest::prelude::*;
use pomsync_orchestration::XmlDocument;

/// Strategy for generating inter-element whitespace
fn whitespace_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ \t\n]{0,6}".prop_map(|s| s.to_string()),
        "( {2}|\t)?".prop_map(|s| format!("\r\n{}", s)),
    ]
}

/// Strategy for generating an optional comment
fn comment_strategy() -> impl Strategy<Value = String> {
    prop::option::of("[a-z ]{0,12}").prop_map(|text| match text {
        Some(text) => format!("<!--{}-->", text),
        None => String::new(),
    })
}

fn version_text_strategy() -> impl Strategy<Value = String> {
    r"[0-9]{1,2}\.[0-9]{1,2}\.[0-9]{1,2}(-SNAPSHOT)?".prop_map(|s| s.to_string())
}

/// Strategy for generating a descriptor and the version it declares
fn descriptor_strategy() -> impl Strategy<Value = (String, String)> {
    (
        prop::collection::vec(whitespace_strategy(), 7),
        comment_strategy(),
        version_text_strategy(),
        "[a-z ]{0,12}",
    )
        .prop_map(|(ws, comment, version, description)| {
            let source = format!(
                "<?xml version=\"1.0\"?>{}<project>{}{}{}<artifactId>demo</artifactId>{}<version>{}</version>{}<description>{}</description>{}</project>{}",
                ws[0], ws[1], comment, ws[2], ws[3], version, ws[4], description, ws[5], ws[6]
            );
            (source, version)
        })
}

proptest! {
    /// Parsing and serializing without edits is the identity
    #[test]
    fn prop_untouched_document_is_identical((source, _) in descriptor_strategy()) {
        let document = XmlDocument::parse(&source).unwrap();
        prop_assert_eq!(document.to_xml(), source);
    }

    /// Rewriting the version changes only the version text
    #[test]
    fn prop_version_edit_preserves_layout(
        (source, old) in descriptor_strategy(),
        new in version_text_strategy(),
    ) {
        let mut document = XmlDocument::parse(&source).unwrap();
        document.write_text("project/version", &new).unwrap();

        let expected = source.replace(
            &format!("<version>{}</version>", old),
            &format!("<version>{}</version>", new),
        );
        prop_assert_eq!(document.to_xml(), expected);
        prop_assert_eq!(document.read_text("project/version"), Some(new));
    }

    /// Writing the same value twice is the same as writing it once
    #[test]
    fn prop_edits_are_idempotent(
        (source, _) in descriptor_strategy(),
        value in "[a-z0-9.]{1,10}",
    ) {
        let mut document = XmlDocument::parse(&source).unwrap();
        document.write_text("project/properties/revision", &value).unwrap();
        let once = document.to_xml();
        document.write_text("project/properties/revision", &value).unwrap();

        prop_assert_eq!(document.to_xml(), once.clone());
        prop_assert_eq!(document.read_text("project/properties/revision"), Some(value));

        let reparsed = XmlDocument::parse(&once).unwrap();
        prop_assert_eq!(reparsed.to_xml(), once);
    }
}
