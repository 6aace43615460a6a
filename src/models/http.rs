use std::io::{BufRead, BufReader};
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::error::{Result, TranslateError};
use crate::models::{ChatBackend, Completion, ModelRequest, StreamEvent, TokenUsage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ENDPOINT_DETAIL_LIMIT: usize = 500;

#[derive(Clone, Debug)]
pub struct HttpModelConfig {
    pub name: String,
    pub model_id: String,
    pub url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Messages-API chat backend over blocking HTTP. Streaming uses server-sent
/// events read line by line off the response body.
pub struct HttpChatBackend {
    client: Client,
    cfg: HttpModelConfig,
}

impl HttpChatBackend {
    pub fn new(cfg: HttpModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { client, cfg })
    }

    fn request_body(&self, req: &ModelRequest, stream: bool) -> Value {
        let mut messages = vec![json!({"role": "user", "content": req.prompt})];
        if let Some(prefill) = &req.prefill {
            messages.push(json!({"role": "assistant", "content": prefill}));
        }
        json!({
            "model": self.cfg.model_id,
            "max_tokens": self.cfg.max_tokens,
            "temperature": self.cfg.temperature,
            "stream": stream,
            "messages": messages,
        })
    }

    fn send(&self, body: &Value) -> Result<reqwest::blocking::Response> {
        let resp = self
            .client
            .post(&self.cfg.url)
            .header("x-api-key", &self.cfg.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .map_err(|e| self.classify(e))?;
        let status = resp.status();
        if !status.is_success() {
            let mut detail = resp.text().unwrap_or_default();
            detail.truncate(floor_char_boundary(&detail, ENDPOINT_DETAIL_LIMIT));
            return Err(TranslateError::Endpoint {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(resp)
    }

    fn classify(&self, err: reqwest::Error) -> TranslateError {
        if err.is_timeout() {
            TranslateError::Timeout(self.cfg.timeout)
        } else {
            TranslateError::Other(anyhow!(err).context("model request failed"))
        }
    }

    fn classify_io(&self, err: std::io::Error) -> TranslateError {
        if matches!(
            err.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) {
            return TranslateError::Timeout(self.cfg.timeout);
        }
        if let Some(inner) = err.get_ref() {
            if let Some(re) = inner.downcast_ref::<reqwest::Error>() {
                if re.is_timeout() {
                    return TranslateError::Timeout(self.cfg.timeout);
                }
            }
        }
        TranslateError::Other(anyhow!(err).context("read model stream"))
    }
}

impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn invoke(&mut self, req: &ModelRequest) -> Result<Completion> {
        let body = self.request_body(req, false);
        let resp = self.send(&body)?;
        let value: Value = resp.json().map_err(|e| self.classify(e))?;

        let text = value
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TranslateError::Parse("model reply missing content[0].text".to_string())
            })?
            .to_string();
        let usage = TokenUsage {
            input_tokens: value
                .pointer("/usage/input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            output_tokens: value
                .pointer("/usage/output_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        };
        Ok(Completion { text, usage })
    }

    fn invoke_streaming(
        &mut self,
        req: &ModelRequest,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<()> {
        let body = self.request_body(req, true);
        let resp = self.send(&body)?;

        let reader = BufReader::new(resp);
        for line in reader.lines() {
            let line = line.map_err(|e| self.classify_io(e))?;
            match parse_sse_line(line.trim_end()) {
                Frame::Event(ev) => on_event(ev),
                Frame::Stop => break,
                Frame::Fail(msg) => {
                    return Err(TranslateError::Other(anyhow!("model stream error: {msg}")))
                }
                Frame::Skip => {}
            }
        }
        Ok(())
    }
}

enum Frame {
    Event(StreamEvent),
    Stop,
    Fail(String),
    Skip,
}

/// One server-sent-events line to at most one stream event. Non-data lines,
/// keepalives, and frame types we do not consume map to `Skip`.
fn parse_sse_line(line: &str) -> Frame {
    let Some(data) = line.strip_prefix("data:") else {
        return Frame::Skip;
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Frame::Skip;
    }
    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return Frame::Skip;
    };

    match value.get("type").and_then(Value::as_str) {
        Some("message_start") => {
            let input_tokens = value
                .pointer("/message/usage/input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let output_tokens = value
                .pointer("/message/usage/output_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Frame::Event(StreamEvent::Metrics {
                input_tokens,
                output_tokens,
            })
        }
        Some("content_block_delta") => match value.pointer("/delta/text").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => Frame::Event(StreamEvent::Text(t.to_string())),
            _ => Frame::Skip,
        },
        Some("message_delta") => match value.pointer("/usage/output_tokens").and_then(Value::as_u64)
        {
            Some(output_tokens) => Frame::Event(StreamEvent::Usage { output_tokens }),
            None => Frame::Skip,
        },
        Some("message_stop") => Frame::Stop,
        Some("error") => Frame::Fail(
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_string(),
        ),
        _ => Frame::Skip,
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
