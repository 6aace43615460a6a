use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context;

use crate::error::{Result, TranslateError};
use crate::html::{apply_translations, extract_fragments, parse};
use crate::ir::ChunkMetrics;
use crate::languages::display_name;
use crate::models::{ChatBackend, ModelRequest, StreamEvent};
use crate::progress::ConsoleProgress;
use crate::session::{ArtifactSink, SessionId, SessionStore, StatusUpdate};

use super::chunker::plan_chunks;
use super::codec::{build_request, decode_reply, DecodeMode};
use super::prompts::render_template;
use super::trace::TraceWriter;
use super::PipelineConfig;

const TRANSLATED_HTML_ARTIFACT: &str = "translated_html.html";
const ORIGINAL_HTML_ARTIFACT: &str = "original_html.html";
const TEXT_ARTIFACT: &str = "translation.txt";

/// Drives a whole translation: extract, chunk, invoke, decode, reinsert.
/// Progress and metrics go through the session store; generated documents go
/// through the artifact sink. Clones share the store and sink, so one
/// pipeline can serve many concurrent sessions.
#[derive(Clone)]
pub struct TranslatorPipeline {
    cfg: PipelineConfig,
    store: SessionStore,
    sink: Arc<dyn ArtifactSink>,
    progress: ConsoleProgress,
    trace: Arc<TraceWriter>,
}

impl TranslatorPipeline {
    pub fn new(
        cfg: PipelineConfig,
        store: SessionStore,
        sink: Arc<dyn ArtifactSink>,
        progress: ConsoleProgress,
    ) -> Self {
        let trace = match cfg.trace_dir.clone() {
            Some(dir) => {
                TraceWriter::new(dir, cfg.trace_prompts).unwrap_or_else(|_| TraceWriter::disabled())
            }
            None => TraceWriter::disabled(),
        };
        Self {
            cfg,
            store,
            sink,
            progress,
            trace: Arc::new(trace),
        }
    }

    /// Translates an HTML document into `target_language` with the named
    /// catalog model. Terminal state, progress and metrics are recorded on
    /// the session; the translated document is returned and also written to
    /// the sink as an artifact.
    pub fn translate_html(
        &self,
        session: &SessionId,
        html: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String> {
        self.begin(session, "Preparing translation", 10, model);
        let mut backend = match self.cfg.connect_model(model) {
            Ok(b) => b,
            Err(err) => return Err(self.record_failure(session, err)),
        };
        self.translate_html_with_backend(session, html, target_language, backend.as_mut())
    }

    /// Same flow against a caller-supplied backend.
    pub fn translate_html_with_backend(
        &self,
        session: &SessionId,
        html: &str,
        target_language: &str,
        backend: &mut dyn ChatBackend,
    ) -> Result<String> {
        match self.run_html(session, html, target_language, backend) {
            Ok(out) => Ok(out),
            Err(err) => Err(self.record_failure(session, err)),
        }
    }

    /// Translates a plain text blob with the named catalog model.
    pub fn translate_text(
        &self,
        session: &SessionId,
        text: &str,
        source_language: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String> {
        self.begin(session, "Preparing translation", 10, model);
        let mut backend = match self.cfg.connect_model(model) {
            Ok(b) => b,
            Err(err) => return Err(self.record_failure(session, err)),
        };
        self.translate_text_with_backend(
            session,
            text,
            source_language,
            target_language,
            backend.as_mut(),
        )
    }

    pub fn translate_text_with_backend(
        &self,
        session: &SessionId,
        text: &str,
        source_language: &str,
        target_language: &str,
        backend: &mut dyn ChatBackend,
    ) -> Result<String> {
        match self.run_text(session, text, source_language, target_language, backend) {
            Ok(out) => Ok(out),
            Err(err) => Err(self.record_failure(session, err)),
        }
    }

    /// Runs the HTML flow on a dedicated worker thread; callers poll the
    /// session store for progress and the terminal state.
    pub fn spawn_html_translation(
        &self,
        session: SessionId,
        html: String,
        target_language: String,
        model: String,
    ) -> anyhow::Result<thread::JoinHandle<()>> {
        let worker = self.clone();
        thread::Builder::new()
            .name(format!("translate-{}", session.short()))
            .spawn(move || {
                let _ = worker.translate_html(&session, &html, &target_language, &model);
            })
            .context("spawn html translation worker")
    }

    pub fn spawn_text_translation(
        &self,
        session: SessionId,
        text: String,
        source_language: String,
        target_language: String,
        model: String,
    ) -> anyhow::Result<thread::JoinHandle<()>> {
        let worker = self.clone();
        thread::Builder::new()
            .name(format!("translate-{}", session.short()))
            .spawn(move || {
                let _ =
                    worker.translate_text(&session, &text, &source_language, &target_language, &model);
            })
            .context("spawn text translation worker")
    }

    fn run_html(
        &self,
        session: &SessionId,
        html: &str,
        target_language: &str,
        backend: &mut dyn ChatBackend,
    ) -> Result<String> {
        self.begin(session, "Parsing HTML content", 15, backend.name());

        let mut doc = parse(html);
        let fragments = extract_fragments(&doc);
        let total = fragments.len();
        if total == 0 {
            return Err(TranslateError::EmptyContent);
        }
        self.update_stage(session, format!("Found {total} text elements to translate"), 20);

        let target_name = display_name(target_language, false);
        let chunks = plan_chunks(&fragments, self.cfg.max_chunk_chars);
        let started = Instant::now();

        let mut translated: HashMap<String, String> = HashMap::new();
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        let mut stream_events = 0u64;
        let mut first_token_time: Option<f64> = None;
        let mut processed = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            processed += chunk.len();
            let label = if i + 1 == chunks.len() {
                format!("Translating final chunk ({processed}/{total} elements)")
            } else {
                format!("Translating chunk ({processed}/{total} elements)")
            };
            self.update_stage(session, label, (20 + 70 * processed / total) as u8);

            let request = build_request(chunk, target_name, &self.cfg.prompts);
            let _ = self
                .trace
                .write_chunk_text(session.short(), i, "prompt", &request.prompt);

            let (reply, metrics) = invoke_chunk(backend, &request, self.cfg.use_streaming)?;
            let _ = self
                .trace
                .write_chunk_text(session.short(), i, "reply", &reply);

            input_tokens += metrics.input_tokens;
            output_tokens += metrics.output_tokens;
            stream_events += metrics.stream_events;
            if first_token_time.is_none() {
                first_token_time = metrics.first_token_time.map(|d| d.as_secs_f64());
            }

            let (decoded, mode) = decode_reply(&reply);
            if mode == DecodeMode::LineScan {
                self.progress.warn(format!(
                    "chunk {}/{} reply was not well-formed; recovered {} of {} fragments by line scan",
                    i + 1,
                    chunks.len(),
                    decoded.len(),
                    chunk.len()
                ));
            }
            translated.extend(decoded);
        }

        self.update_stage(session, "Generating translated HTML".to_string(), 90);
        let applied = apply_translations(&mut doc, &fragments, &translated);
        self.progress
            .info(format!("Applied {applied}/{total} fragment translations"));
        doc.verify_structure_unchanged()?;
        let output = doc.to_html();

        let processing_time = started.elapsed().as_secs_f64();
        let tokens_per_second = if output_tokens > 0 && processing_time > 0.0 {
            output_tokens as f64 / processing_time
        } else {
            0.0
        };

        self.sink
            .write_artifact(session, TRANSLATED_HTML_ARTIFACT, &output)
            .context("save translated html")?;
        self.sink
            .write_artifact(session, ORIGINAL_HTML_ARTIFACT, html)
            .context("save original html")?;

        self.store.update(
            session,
            StatusUpdate {
                current_task: Some("HTML translation complete".to_string()),
                progress_percentage: Some(100),
                is_processing: Some(false),
                processing_complete: Some(true),
                input_tokens: Some(input_tokens),
                output_tokens: Some(output_tokens),
                streaming_chunks: Some(stream_events),
                first_token_time,
                processing_time: Some(processing_time),
                tokens_per_second: Some(tokens_per_second),
                ..StatusUpdate::default()
            },
        );
        self.progress.stage("HTML translation complete", 100);

        Ok(output)
    }

    fn run_text(
        &self,
        session: &SessionId,
        text: &str,
        source_language: &str,
        target_language: &str,
        backend: &mut dyn ChatBackend,
    ) -> Result<String> {
        let prompt = render_template(
            &self.cfg.prompts.plain_text,
            &[
                ("source_language", display_name(source_language, false)),
                ("target_language", display_name(target_language, false)),
                ("text", text),
            ],
        );
        let request = ModelRequest {
            prompt,
            prefill: None,
        };
        let _ = self
            .trace
            .write_named_text(&format!("{}.text.prompt.txt", session.short()), &request.prompt);

        self.update_stage(session, "Sending request to model".to_string(), 20);
        let started = Instant::now();

        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        let mut stream_events = 0u64;
        let mut first_token_time: Option<f64> = None;

        let translated = if self.cfg.use_streaming {
            self.update_stage(session, "Receiving streaming response".to_string(), 30);

            let mut buf = String::new();
            let store = &self.store;
            backend.invoke_streaming(&request, &mut |event| match event {
                StreamEvent::Text(piece) => {
                    if stream_events == 0 {
                        first_token_time = Some(started.elapsed().as_secs_f64());
                    }
                    stream_events += 1;
                    buf.push_str(&piece);
                    store.update(
                        session,
                        StatusUpdate {
                            current_task: Some(format!(
                                "Receiving translation (chunk {stream_events})"
                            )),
                            progress_percentage: Some(
                                (30 + stream_events * 60 / 100).min(90) as u8
                            ),
                            streaming_chunks: Some(stream_events),
                            ..StatusUpdate::default()
                        },
                    );
                }
                StreamEvent::Metrics {
                    input_tokens: it,
                    output_tokens: ot,
                } => {
                    input_tokens = it;
                    output_tokens = ot;
                }
                StreamEvent::Usage { output_tokens: ot } => {
                    output_tokens = ot;
                }
            })?;
            buf
        } else {
            self.update_stage(session, "Waiting for model response".to_string(), 50);
            let completion = backend.invoke(&request)?;
            input_tokens = completion.usage.input_tokens;
            output_tokens = completion.usage.output_tokens;
            completion.text
        };

        let _ = self
            .trace
            .write_named_text(&format!("{}.text.reply.txt", session.short()), &translated);
        self.sink
            .write_artifact(session, TEXT_ARTIFACT, &translated)
            .context("save translation text")?;

        let processing_time = started.elapsed().as_secs_f64();
        let tokens_per_second = if output_tokens > 0 && processing_time > 0.0 {
            output_tokens as f64 / processing_time
        } else {
            0.0
        };

        self.store.update(
            session,
            StatusUpdate {
                current_task: Some("Translation complete".to_string()),
                progress_percentage: Some(100),
                is_processing: Some(false),
                processing_complete: Some(true),
                input_tokens: Some(input_tokens),
                output_tokens: Some(output_tokens),
                streaming_chunks: Some(stream_events),
                first_token_time,
                processing_time: Some(processing_time),
                tokens_per_second: Some(tokens_per_second),
                ..StatusUpdate::default()
            },
        );
        self.progress.stage("Translation complete", 100);

        Ok(translated)
    }

    /// First update of a flow: stage label plus the fields pollers need to
    /// see from the start.
    fn begin(&self, session: &SessionId, label: &str, pct: u8, model: &str) {
        self.store.update(
            session,
            StatusUpdate {
                current_task: Some(label.to_string()),
                progress_percentage: Some(pct),
                is_processing: Some(true),
                selected_model: Some(model.to_string()),
                use_streaming: Some(self.cfg.use_streaming),
                ..StatusUpdate::default()
            },
        );
        self.progress.stage(label, pct);
    }

    fn update_stage(&self, session: &SessionId, label: String, pct: u8) {
        self.progress.stage(&label, pct);
        self.store.update(session, StatusUpdate::task(label, pct));
    }

    /// Records a terminal failure on the session so pollers observe it, then
    /// hands the error back to the caller.
    fn record_failure(&self, session: &SessionId, err: TranslateError) -> TranslateError {
        self.progress.warn(format!("translation failed: {err}"));
        self.store.update(
            session,
            StatusUpdate {
                is_processing: Some(false),
                error_message: Some(err.to_string()),
                ..StatusUpdate::default()
            },
        );
        err
    }
}

/// One model round trip with metric capture. Streaming counts text events
/// and stamps the first-token latency; both modes report token usage.
fn invoke_chunk(
    backend: &mut dyn ChatBackend,
    request: &ModelRequest,
    use_streaming: bool,
) -> Result<(String, ChunkMetrics)> {
    let started = Instant::now();
    let mut metrics = ChunkMetrics::default();

    let text = if use_streaming {
        let mut buf = String::new();
        backend.invoke_streaming(request, &mut |event| match event {
            StreamEvent::Text(piece) => {
                if metrics.stream_events == 0 {
                    metrics.first_token_time = Some(started.elapsed());
                }
                metrics.stream_events += 1;
                buf.push_str(&piece);
            }
            StreamEvent::Metrics {
                input_tokens,
                output_tokens,
            } => {
                metrics.input_tokens = input_tokens;
                metrics.output_tokens = output_tokens;
            }
            StreamEvent::Usage { output_tokens } => {
                metrics.output_tokens = output_tokens;
            }
        })?;
        buf
    } else {
        let completion = backend.invoke(request)?;
        metrics.input_tokens = completion.usage.input_tokens;
        metrics.output_tokens = completion.usage.output_tokens;
        completion.text
    };

    metrics.elapsed = started.elapsed();
    Ok((text, metrics))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::models::{Completion, TokenUsage};

    /// Scripted backend: pops one reply per invocation and counts calls.
    struct MockBackend {
        replies: VecDeque<Result<String>>,
        calls: usize,
    }

    impl MockBackend {
        fn with_replies(replies: &[&str]) -> Self {
            Self {
                replies: replies.iter().map(|r| Ok(r.to_string())).collect(),
                calls: 0,
            }
        }

        fn failing(err: TranslateError) -> Self {
            Self {
                replies: VecDeque::from([Err(err)]),
                calls: 0,
            }
        }

        fn next_reply(&mut self) -> Result<String> {
            self.calls += 1;
            self.replies.pop_front().expect("scripted reply")
        }
    }

    impl ChatBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn invoke(&mut self, _req: &ModelRequest) -> Result<Completion> {
            let text = self.next_reply()?;
            Ok(Completion {
                text,
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
            })
        }

        fn invoke_streaming(
            &mut self,
            _req: &ModelRequest,
            on_event: &mut dyn FnMut(StreamEvent),
        ) -> Result<()> {
            let text = self.next_reply()?;
            on_event(StreamEvent::Metrics {
                input_tokens: 100,
                output_tokens: 0,
            });
            for piece in text.split_inclusive('\n') {
                on_event(StreamEvent::Text(piece.to_string()));
            }
            on_event(StreamEvent::Usage { output_tokens: 50 });
            Ok(())
        }
    }

    struct NullSink;

    impl ArtifactSink for NullSink {
        fn write_artifact(&self, _id: &SessionId, _name: &str, _contents: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CaptureSink(Mutex<Vec<(String, String)>>);

    impl ArtifactSink for CaptureSink {
        fn write_artifact(&self, _id: &SessionId, name: &str, contents: &str) -> anyhow::Result<()> {
            self.0
                .lock()
                .expect("sink lock")
                .push((name.to_string(), contents.to_string()));
            Ok(())
        }
    }

    fn quiet_cfg(streaming: bool) -> PipelineConfig {
        let mut cfg = PipelineConfig::defaults();
        cfg.use_streaming = streaming;
        cfg
    }

    fn pipeline_with(
        cfg: PipelineConfig,
        sink: Arc<dyn ArtifactSink>,
    ) -> (TranslatorPipeline, SessionStore) {
        let store = SessionStore::new();
        let pipeline =
            TranslatorPipeline::new(cfg, store.clone(), sink, ConsoleProgress::new(false));
        (pipeline, store)
    }

    #[test]
    fn translates_document_end_to_end() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();
        let mut backend =
            MockBackend::with_replies(&["<content><a0>Hola</a0><a1>Mundo</a1></content>"]);

        let out = pipeline
            .translate_html_with_backend(
                &session,
                "<p>Hello</p><script>ignore()</script><p>World</p>",
                "es",
                &mut backend,
            )
            .expect("translate");

        assert_eq!(out, "<p>Hola</p><script>ignore()</script><p>Mundo</p>");
        assert_eq!(backend.calls, 1);

        let status = store.status(&session).expect("status");
        assert_eq!(status.current_task, "HTML translation complete");
        assert_eq!(status.progress_percentage, 100);
        assert!(status.processing_complete);
        assert!(!status.is_processing);
        assert!(status.error_message.is_none());
        assert_eq!(status.selected_model.as_deref(), Some("mock"));
        assert_eq!(status.input_tokens, 100);
        assert_eq!(status.output_tokens, 50);
    }

    #[test]
    fn missing_fragment_keeps_original_text() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();
        let mut backend = MockBackend::with_replies(&["<content><a0>Hola</a0></content>"]);

        let out = pipeline
            .translate_html_with_backend(
                &session,
                "<p>Hello</p><script>ignore()</script><p>World</p>",
                "es",
                &mut backend,
            )
            .expect("translate");

        assert_eq!(out, "<p>Hola</p><script>ignore()</script><p>World</p>");
        assert!(store.status(&session).expect("status").processing_complete);
    }

    #[test]
    fn empty_document_fails_before_any_model_call() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();
        let mut backend = MockBackend::with_replies(&[]);

        let err = pipeline
            .translate_html_with_backend(&session, "<script>only()</script>", "es", &mut backend)
            .expect_err("no content");

        assert!(matches!(err, TranslateError::EmptyContent));
        assert!(err.is_precondition());
        assert_eq!(backend.calls, 0);

        let status = store.status(&session).expect("status");
        assert_eq!(
            status.error_message.as_deref(),
            Some("no translatable content found in HTML")
        );
        assert!(!status.is_processing);
        assert!(!status.processing_complete);
    }

    #[test]
    fn invalid_model_fails_fast_and_is_recorded() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();

        let err = pipeline
            .translate_html(&session, "<p>Hi</p>", "es", "gpt-7")
            .expect_err("unknown model");

        assert!(matches!(err, TranslateError::InvalidModel(_)));
        let status = store.status(&session).expect("status");
        assert_eq!(status.error_message.as_deref(), Some("invalid model: gpt-7"));
        assert!(!status.is_processing);
    }

    #[test]
    fn chunk_error_aborts_whole_operation() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(CaptureSink::default()));
        let session = store.create();
        let mut backend = MockBackend::failing(TranslateError::Timeout(Duration::from_secs(300)));

        let err = pipeline
            .translate_html_with_backend(&session, "<p>Hello</p>", "es", &mut backend)
            .expect_err("timeout");

        assert!(matches!(err, TranslateError::Timeout(_)));
        assert!(!err.is_precondition());
        let status = store.status(&session).expect("status");
        assert!(status
            .error_message
            .as_deref()
            .expect("error recorded")
            .contains("timed out"));
        assert!(!status.processing_complete);
    }

    #[test]
    fn multi_chunk_document_sums_metrics() {
        let mut cfg = quiet_cfg(true);
        cfg.max_chunk_chars = 10;
        let (pipeline, store) = pipeline_with(cfg, Arc::new(NullSink));
        let session = store.create();
        let mut backend = MockBackend::with_replies(&[
            "<content><a0>AAAA</a0></content>",
            "<content><a1>BBBB</a1></content>",
        ]);

        let out = pipeline
            .translate_html_with_backend(
                &session,
                "<p>aaaaaaaa</p><p>bbbbbbbb</p>",
                "es",
                &mut backend,
            )
            .expect("translate");

        assert_eq!(out, "<p>AAAA</p><p>BBBB</p>");
        assert_eq!(backend.calls, 2);

        let status = store.status(&session).expect("status");
        assert_eq!(status.input_tokens, 200);
        assert_eq!(status.output_tokens, 100);
        assert_eq!(status.streaming_chunks, 2);
        assert!(status.first_token_time.is_some());
        assert!(status.use_streaming);
    }

    #[test]
    fn prose_wrapped_reply_degrades_to_line_scan() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();
        let mut backend = MockBackend::with_replies(&[
            "sure, here it is:\n<a0>Hola</a0>\n<a1>Mundo</a1>\nhope that helps",
        ]);

        let out = pipeline
            .translate_html_with_backend(&session, "<p>Hello</p><p>World</p>", "es", &mut backend)
            .expect("translate");

        assert_eq!(out, "<p>Hola</p><p>Mundo</p>");
        assert!(store.status(&session).expect("status").processing_complete);
    }

    #[test]
    fn undecodable_reply_still_completes_with_original_text() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();
        let mut backend = MockBackend::with_replies(&["I cannot translate this."]);

        let out = pipeline
            .translate_html_with_backend(&session, "<p>Hello</p>", "es", &mut backend)
            .expect("translate");

        assert_eq!(out, "<p>Hello</p>");
        assert!(store.status(&session).expect("status").processing_complete);
    }

    #[test]
    fn html_artifacts_written_on_success() {
        let sink = Arc::new(CaptureSink::default());
        let (pipeline, store) = pipeline_with(quiet_cfg(false), sink.clone());
        let session = store.create();
        let mut backend = MockBackend::with_replies(&["<content><a0>Hallo</a0></content>"]);

        pipeline
            .translate_html_with_backend(&session, "<p>Hello</p>", "de", &mut backend)
            .expect("translate");

        let artifacts = sink.0.lock().expect("sink lock");
        assert_eq!(
            artifacts
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>(),
            vec![TRANSLATED_HTML_ARTIFACT, ORIGINAL_HTML_ARTIFACT]
        );
        assert_eq!(artifacts[0].1, "<p>Hallo</p>");
        assert_eq!(artifacts[1].1, "<p>Hello</p>");
    }

    #[test]
    fn plain_text_flow_records_metrics_and_artifact() {
        let sink = Arc::new(CaptureSink::default());
        let (pipeline, store) = pipeline_with(quiet_cfg(true), sink.clone());
        let session = store.create();
        let mut backend = MockBackend::with_replies(&["Hola mundo"]);

        let out = pipeline
            .translate_text_with_backend(&session, "Hello world", "en", "es", &mut backend)
            .expect("translate");

        assert_eq!(out, "Hola mundo");
        let artifacts = sink.0.lock().expect("sink lock");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0], (TEXT_ARTIFACT.to_string(), "Hola mundo".to_string()));

        let status = store.status(&session).expect("status");
        assert_eq!(status.current_task, "Translation complete");
        assert_eq!(status.progress_percentage, 100);
        assert!(status.processing_complete);
        assert_eq!(status.streaming_chunks, 1);
        assert_eq!(status.input_tokens, 100);
        assert_eq!(status.output_tokens, 50);
        assert!(status.first_token_time.is_some());
    }

    #[test]
    fn plain_text_nonstreaming_uses_completion_usage() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();
        let mut backend = MockBackend::with_replies(&["Bonjour"]);

        let out = pipeline
            .translate_text_with_backend(&session, "Hello", "en", "fr", &mut backend)
            .expect("translate");

        assert_eq!(out, "Bonjour");
        let status = store.status(&session).expect("status");
        assert_eq!(status.streaming_chunks, 0);
        assert_eq!(status.input_tokens, 100);
        assert_eq!(status.output_tokens, 50);
        assert!(status.first_token_time.is_none());
    }

    #[test]
    fn spawned_worker_reports_through_store() {
        let (pipeline, store) = pipeline_with(quiet_cfg(false), Arc::new(NullSink));
        let session = store.create();

        let handle = pipeline
            .spawn_html_translation(
                session.clone(),
                "<p>Hi</p>".to_string(),
                "es".to_string(),
                "no-such-model".to_string(),
            )
            .expect("spawn");
        handle.join().expect("join worker");

        let status = store.status(&session).expect("status");
        assert_eq!(
            status.error_message.as_deref(),
            Some("invalid model: no-such-model")
        );
        assert!(!status.is_processing);
    }
}
