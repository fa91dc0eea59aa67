//! Shared setup for the end-to-end tests

use std::sync::{Once, OnceLock};

use docsign_core::{DocSign, DocSignConfig, MemoryStorage, SubjectInfo};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const KEY_ID: &str = "test-signer";
pub const PASSWORD: &str = "correct-horse";

/// Route `tracing` output through the test harness
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Workflow with one 2048-bit "Test Signer" identity, created once per binary
pub fn docsign() -> &'static DocSign<MemoryStorage> {
    static APP: OnceLock<DocSign<MemoryStorage>> = OnceLock::new();
    APP.get_or_init(|| {
        init_tracing();
        let config = DocSignConfig::default().with_key_size(2048);
        let app = DocSign::new(MemoryStorage::new(), config).unwrap();
        app.create_identity(KEY_ID, PASSWORD, &SubjectInfo::new("Test Signer"))
            .unwrap();
        app
    })
}

/// Minimal one-page document
pub fn one_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 18.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("Service agreement")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
