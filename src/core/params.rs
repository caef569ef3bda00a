//! Effective-parameter resolver (spec §4.7): request-level values win
//! over server-level defaults; `max_tokens` additionally falls back to
//! a hardcoded default.

use crate::config::ServerDefaults;
use crate::error::GatewayError;
use crate::model::ChatRequest;

const HARDCODED_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct EffectiveParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub min_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub max_tokens: u32,
    pub top_logprobs: Option<u32>,
}

pub fn resolve(request: &ChatRequest, server: &ServerDefaults) -> Result<EffectiveParams, GatewayError> {
    if let Some(top_logprobs) = request.top_logprobs {
        if top_logprobs > server.max_logprobs {
            return Err(GatewayError::Validation(format!(
                "top_logprobs must be <= {}. Received {}.",
                server.max_logprobs, top_logprobs
            )));
        }
    }

    let max_tokens = request
        .max_tokens
        .filter(|v| *v > 0)
        .or(server.max_tokens.filter(|v| *v > 0))
        .unwrap_or(HARDCODED_MAX_TOKENS);

    Ok(EffectiveParams {
        temperature: request.temperature.or(server.temperature),
        top_p: request.top_p.or(server.top_p),
        top_k: request.top_k.or(server.top_k),
        min_p: request.min_p.or(server.min_p),
        presence_penalty: request.presence_penalty.or(server.presence_penalty),
        repetition_penalty: request.repetition_penalty.or(server.repetition_penalty),
        seed: request.seed.or(server.seed),
        max_tokens,
        top_logprobs: request.top_logprobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_request() -> ChatRequest {
        ChatRequest {
            model: None,
            messages: vec![],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            min_p: None,
            presence_penalty: None,
            repetition_penalty: None,
            seed: None,
            max_tokens: None,
            logprobs: false,
            top_logprobs: None,
            tools: vec![],
            stop: None,
            response_format: None,
        }
    }

    #[test]
    fn top_logprobs_cap_scenario() {
        let mut req = empty_request();
        req.top_logprobs = Some(10);
        let server = ServerDefaults {
            max_logprobs: 5,
            ..Default::default()
        };
        let err = resolve(&req, &server).unwrap_err();
        assert_eq!(
            err.to_string(),
            "top_logprobs must be <= 5. Received 10."
        );
    }

    #[test]
    fn max_tokens_falls_back_through_three_levels() {
        let server = ServerDefaults::default();
        let params = resolve(&empty_request(), &server).unwrap();
        assert_eq!(params.max_tokens, HARDCODED_MAX_TOKENS);

        let server_with_default = ServerDefaults {
            max_tokens: Some(2048),
            ..Default::default()
        };
        let params = resolve(&empty_request(), &server_with_default).unwrap();
        assert_eq!(params.max_tokens, 2048);

        let mut req = empty_request();
        req.max_tokens = Some(128);
        let params = resolve(&req, &server_with_default).unwrap();
        assert_eq!(params.max_tokens, 128);
    }

    #[test]
    fn request_overrides_server_default_for_sampling_knobs() {
        let mut req = empty_request();
        req.temperature = Some(0.2);
        let server = ServerDefaults {
            temperature: Some(0.9),
            ..Default::default()
        };
        let params = resolve(&req, &server).unwrap();
        assert_eq!(params.temperature, Some(0.2));
    }
}
