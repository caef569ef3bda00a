//! Deterministic in-memory `Generator` test double (SPEC_FULL §2): a
//! faithful stand-in for the tensor-runtime engine, exercising the
//! scenarios in spec §8 without a real model.

use futures::stream::{self, BoxStream};

use crate::error::GatewayError;
use crate::model::GeneratorChunk;

use super::{Generator, GeneratorRequest};

/// Replays a fixed sequence of text pieces, exactly as spec §8's
/// scenarios are phrased ("Generator pieces: [...]").
pub struct MockGenerator {
    pieces: Vec<GeneratorChunk>,
}

impl MockGenerator {
    pub fn from_text_pieces(pieces: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            pieces: pieces
                .into_iter()
                .map(|text| GeneratorChunk {
                    text: text.into(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    pub fn from_chunks(chunks: Vec<GeneratorChunk>) -> Self {
        Self { pieces: chunks }
    }
}

#[async_trait::async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        _prompt: GeneratorRequest,
    ) -> Result<BoxStream<'static, Result<GeneratorChunk, GatewayError>>, GatewayError> {
        let chunks: Vec<Result<GeneratorChunk, GatewayError>> =
            self.pieces.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_pieces_in_order() {
        let gen = MockGenerator::from_text_pieces(["Hello <thi", "nk>secret</thi", "nk> world"]);
        let mut stream = gen
            .generate(GeneratorRequest {
                prompt: "hi".to_string(),
                temperature: None,
                top_p: None,
                top_k: None,
                min_p: None,
                presence_penalty: None,
                repetition_penalty: None,
                seed: None,
                max_tokens: 4096,
                stop: vec![],
            })
            .await
            .unwrap();

        let mut texts = Vec::new();
        while let Some(chunk) = stream.next().await {
            texts.push(chunk.unwrap().text);
        }
        assert_eq!(texts, vec!["Hello <thi", "nk>secret</thi", "nk> world"]);
    }
}
