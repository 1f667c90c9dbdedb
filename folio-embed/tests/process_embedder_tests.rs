use std::path::PathBuf;

use folio_embed::process::{ProcessEmbedder, ProcessEmbedderConfig};
use folio_embed::Embedder;

fn fixture_embedder() -> ProcessEmbedder {
    let script = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/echo_embedder.sh");
    ProcessEmbedder::new(ProcessEmbedderConfig {
        command: PathBuf::from("/bin/sh"),
        args: vec![script.to_string_lossy().into_owned()],
        dimension: 3,
        provider_name: "fixture-process".into(),
    })
    .unwrap()
}

#[test]
fn embeds_single_text_through_subprocess() {
    let embedder = fixture_embedder();
    let vector = embedder.embed("hi").unwrap();
    assert_eq!(vector.len(), 3);
    assert_eq!(vector[1], 0.5);
    assert_eq!(vector[2], 1.0);
}

#[test]
fn embed_batch_returns_one_vector_per_input_in_order() {
    let embedder = fixture_embedder();
    let batch = embedder.embed_batch(&["a", "bb", "ccc"]).unwrap();
    assert_eq!(batch.len(), 3);
    // lengths strictly increase because the fixture embeds JSON-encoded
    // line length, and longer raw text yields a longer JSON string.
    assert!(batch[0][0] < batch[1][0]);
    assert!(batch[1][0] < batch[2][0]);
}

#[test]
fn empty_batch_short_circuits_without_spawning() {
    let embedder = fixture_embedder();
    assert_eq!(embedder.embed_batch(&[]).unwrap(), Vec::<Vec<f32>>::new());
}
