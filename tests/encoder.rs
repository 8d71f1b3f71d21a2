//! End-to-end tests for the text encoder pipeline.
//!
//! These download pretrained checkpoints from the Hugging Face Hub.
//! Run with: cargo test --features integration

#![cfg(feature = "integration")]

use text_encoders::{EncoderError, ModelFamily, TextEncoderBuilder};

#[test]
fn encode_preserves_row_count_and_order() -> anyhow::Result<()> {
    let mut encoder = TextEncoderBuilder::new(ModelFamily::DistilBert)
        .cpu()
        .build()?;
    encoder.prepare()?;

    let column = [
        Some("hello world"),
        None,
        Some("a longer sentence with several tokens"),
    ];
    let vectors = encoder.encode(&column)?;

    assert_eq!(vectors.len(), column.len());
    let dim = encoder.embedding_dim()?;
    for vector in &vectors {
        assert_eq!(vector.len(), dim);
    }

    // Row 1 came from a missing value and must match the empty string
    // exactly.
    let empty = encoder.encode(&[Some("")])?;
    assert_eq!(vectors[1], empty[0]);
    Ok(())
}

#[test]
fn prepare_twice_fails() -> anyhow::Result<()> {
    let mut encoder = TextEncoderBuilder::new(ModelFamily::Gpt2).cpu().build()?;
    encoder.prepare()?;
    assert!(encoder.is_prepared());

    let err = encoder.prepare().unwrap_err();
    assert!(matches!(err, EncoderError::AlreadyPrepared));
    Ok(())
}

#[test]
fn gpt2_vectors_are_768_wide() -> anyhow::Result<()> {
    let mut encoder = TextEncoderBuilder::from_model_name("gpt2").cpu().build()?;
    encoder.prepare()?;
    assert_eq!(encoder.embedding_dim()?, 768);

    // GPT-2's tokenizer yields no ids for an empty string; the degenerate
    // path must still produce a full-width vector.
    let vectors = encoder.encode(&[None])?;
    assert_eq!(vectors[0].len(), 768);
    Ok(())
}

#[test]
fn every_family_resolves_and_encodes() -> anyhow::Result<()> {
    for name in ["distilbert", "albert", "bart", "gpt2", "not-a-model"] {
        let mut encoder = TextEncoderBuilder::from_model_name(name).cpu().build()?;
        encoder.prepare()?;

        let vectors = encoder.encode(&[Some("feature pipelines"), None])?;
        assert_eq!(vectors.len(), 2, "family {name}");
        assert_eq!(vectors[0].len(), encoder.embedding_dim()?, "family {name}");
    }
    Ok(())
}

#[test]
fn decode_fails_after_prepare() -> anyhow::Result<()> {
    let mut encoder = TextEncoderBuilder::new(ModelFamily::DistilBert)
        .cpu()
        .build()?;
    encoder.prepare()?;

    let err = encoder.decode(&[vec![0.0; 768]]).unwrap_err();
    assert!(matches!(err, EncoderError::Unimplemented(_)));
    Ok(())
}
