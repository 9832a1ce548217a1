//! Engine backed by an external synthesizer process
//!
//! Each session runs the configured program once. The text is written to its
//! stdin and raw PCM is read from its stdout as it is produced, so any
//! command-line synthesizer that can emit s16le mono audio (Piper with
//! `--output_raw`, a Kokoro wrapper script, ...) can be plugged in.
//!
//! Cancellation kills the spawned process only. A wrapper script must `exec`
//! the synthesizer: a forked grandchild holding stdout open keeps the session
//! reading until that grandchild exits.

use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use murmur_config::EngineOptions;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::parse_options;
use crate::engine::{
    BYTES_PER_FRAME, SAMPLE_RATE, SessionCallbacks, StopReason, SynthesisEngine, Utterance, spawn_session,
};
use crate::error::{Result, TtsError};
use crate::registry::TtsPlugin;

const PLUGIN_KEY: &str = "command";

/// Canonical RIFF/WAVE header size
const WAV_HEADER_BYTES: usize = 44;
/// How often the watcher checks for exit or cancellation
const WATCH_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandOptions {
    lang_code: String,
    /// Killed on cancellation; wrappers must `exec` the real synthesizer
    program: PathBuf,
    /// Arguments; `{lang}`, `{voice}` and `{speed}` are substituted
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
    #[serde(default = "default_chunk_bytes")]
    chunk_bytes: usize,
    #[serde(default = "default_strip_wav_header")]
    strip_wav_header: bool,
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

fn default_chunk_bytes() -> usize {
    4096
}

fn default_strip_wav_header() -> bool {
    true
}

/// Registers the process engine under `command`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPlugin;

impl TtsPlugin for CommandPlugin {
    fn key(&self) -> &'static str {
        PLUGIN_KEY
    }

    fn build_engine(&self, options: &EngineOptions) -> Result<Arc<dyn SynthesisEngine>> {
        let mut options: CommandOptions = parse_options(PLUGIN_KEY, options)?;

        if options.chunk_bytes < BYTES_PER_FRAME {
            return Err(TtsError::InvalidOptions {
                plugin: PLUGIN_KEY.to_string(),
                message: format!("chunk_bytes must be at least {BYTES_PER_FRAME}"),
            });
        }
        if options.sample_rate == 0 {
            return Err(TtsError::InvalidOptions {
                plugin: PLUGIN_KEY.to_string(),
                message: "sample_rate must be greater than zero".to_string(),
            });
        }

        // Chunks never split a frame
        options.chunk_bytes -= options.chunk_bytes % BYTES_PER_FRAME;

        tracing::debug!(
            lang = %options.lang_code,
            program = %options.program.display(),
            "command engine ready"
        );

        Ok(Arc::new(CommandEngine { options }))
    }
}

/// Language-bound engine spawning one process per session
#[derive(Debug)]
pub struct CommandEngine {
    options: CommandOptions,
}

impl CommandEngine {
    fn command_for(&self, utterance: &Utterance) -> Command {
        let speed = utterance.speed.to_string();

        let mut command = Command::new(&self.options.program);
        command
            .args(self.options.args.iter().map(|arg| {
                arg.replace("{lang}", &self.options.lang_code)
                    .replace("{voice}", &utterance.voice)
                    .replace("{speed}", &speed)
            }))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        command
    }
}

impl SynthesisEngine for CommandEngine {
    fn language(&self) -> &str {
        &self.options.lang_code
    }

    fn sample_rate(&self) -> u32 {
        self.options.sample_rate
    }

    fn start(&self, utterance: Utterance, callbacks: SessionCallbacks, cancel: CancellationToken) -> Result<()> {
        let program = self.options.program.display().to_string();

        let mut child = self
            .command_for(&utterance)
            .spawn()
            .map_err(|e| TtsError::SessionStart(format!("failed to spawn {program}: {e}")))?;

        let (Some(stdin), Some(stdout), Some(stderr)) = (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TtsError::SessionStart(format!("failed to open pipes to {program}")));
        };

        tracing::debug!(program = %program, pid = child.id(), "synthesizer process spawned");

        let session = Session {
            program,
            chunk_bytes: self.options.chunk_bytes,
            strip_wav_header: self.options.strip_wav_header,
        };

        spawn_session(format!("command-{}", self.options.lang_code), move || {
            let text = utterance.text;
            let writer = std::thread::spawn(move || {
                let mut stdin = stdin;
                if let Err(e) = stdin.write_all(text.as_bytes()) {
                    tracing::debug!("synthesizer stopped reading stdin: {e}");
                }
            });

            let errors = std::thread::spawn(move || {
                let mut stderr = stderr;
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            });

            let watcher = watch(child, cancel.clone());

            session.run(stdout, callbacks, writer, errors, watcher, &cancel);
        })
    }
}

/// Per-session settings moved onto the worker thread
struct Session {
    program: String,
    chunk_bytes: usize,
    strip_wav_header: bool,
}

impl Session {
    fn run(
        self,
        stdout: ChildStdout,
        mut callbacks: SessionCallbacks,
        writer: JoinHandle<()>,
        errors: JoinHandle<String>,
        watcher: JoinHandle<std::io::Result<ExitStatus>>,
        cancel: &CancellationToken,
    ) {
        let read_result = self.pump(stdout, &mut callbacks);

        let _ = writer.join();
        let status = watcher.join();
        let stderr = errors.join().unwrap_or_default();

        if cancel.is_cancelled() {
            tracing::debug!(program = %self.program, "synthesizer process cancelled");
            callbacks.stop(StopReason::Cancelled);
            return;
        }

        let reason = match (read_result, status) {
            (Err(e), _) => StopReason::Failed(format!("failed reading output of {}: {e}", self.program)),
            (Ok(()), Ok(Ok(status))) if status.success() => StopReason::Finished,
            (Ok(()), Ok(Ok(status))) => {
                StopReason::Failed(format!("{} exited with {status}: {}", self.program, stderr.trim()))
            }
            (Ok(()), Ok(Err(e))) => StopReason::Failed(format!("failed waiting for {}: {e}", self.program)),
            (Ok(()), Err(_)) => StopReason::Failed(format!("lost track of {}", self.program)),
        };

        callbacks.stop(reason);
    }

    /// Forward stdout to the callbacks in frame-aligned chunks until EOF
    fn pump(&self, mut stdout: ChildStdout, callbacks: &mut SessionCallbacks) -> std::io::Result<()> {
        let mut buffer = vec![0u8; self.chunk_bytes];
        let mut pending = BytesMut::with_capacity(self.chunk_bytes * 2);
        let mut header_pending = self.strip_wav_header;

        loop {
            let read = match stdout.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            pending.extend_from_slice(&buffer[..read]);

            if header_pending {
                if pending.len() < WAV_HEADER_BYTES {
                    continue;
                }
                header_pending = false;
                skip_wav_header(&mut pending);
            }

            self.emit_frames(&mut pending, callbacks);
        }

        if header_pending {
            skip_wav_header(&mut pending);
        }
        self.emit_frames(&mut pending, callbacks);

        if !pending.is_empty() {
            tracing::debug!(program = %self.program, "dropping {} trailing byte(s) of a partial frame", pending.len());
        }

        Ok(())
    }

    /// Hand over every whole frame in `pending`, at most `chunk_bytes` at a time
    fn emit_frames(&self, pending: &mut BytesMut, callbacks: &mut SessionCallbacks) {
        while pending.len() >= BYTES_PER_FRAME {
            let aligned = pending.len() - pending.len() % BYTES_PER_FRAME;
            callbacks.chunk(pending.split_to(aligned.min(self.chunk_bytes)).freeze());
        }
    }
}

fn skip_wav_header(pending: &mut BytesMut) {
    if pending.starts_with(b"RIFF") {
        pending.advance(WAV_HEADER_BYTES.min(pending.len()));
    }
}

/// Reap the child, killing it once `cancel` fires
fn watch(mut child: Child, cancel: CancellationToken) -> JoinHandle<std::io::Result<ExitStatus>> {
    std::thread::spawn(move || {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if cancel.is_cancelled() {
                // Already exited is fine; wait reports the status either way
                let _ = child.kill();
                return child.wait();
            }
            std::thread::sleep(WATCH_INTERVAL);
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::mpsc;

    use bytes::Bytes;
    use serde_json::json;

    use super::*;

    fn engine(options: serde_json::Value) -> Arc<dyn SynthesisEngine> {
        let serde_json::Value::Object(options) = options else {
            unreachable!()
        };
        CommandPlugin.build_engine(&options).unwrap()
    }

    fn utterance(text: &str) -> Utterance {
        Utterance {
            text: text.to_string(),
            voice: "af_heart".to_string(),
            lang: "a".to_string(),
            speed: 1.5,
        }
    }

    fn run(engine: &Arc<dyn SynthesisEngine>, text: &str) -> (Vec<Bytes>, StopReason) {
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let callbacks = SessionCallbacks::new(
            move |chunk| chunk_tx.send(chunk).unwrap(),
            move |reason| stop_tx.send(reason).unwrap(),
        );

        engine.start(utterance(text), callbacks, CancellationToken::new()).unwrap();

        let reason = stop_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        (chunk_rx.iter().collect(), reason)
    }

    fn joined(chunks: &[Bytes]) -> Vec<u8> {
        chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect()
    }

    #[test]
    fn streams_process_output() {
        let engine = engine(json!({ "lang_code": "a", "program": "cat" }));

        let (chunks, reason) = run(&engine, "abcdef");

        assert_eq!(reason, StopReason::Finished);
        assert_eq!(joined(&chunks), b"abcdef");
    }

    #[test]
    fn chunks_are_frame_aligned_and_bounded() {
        let engine = engine(json!({ "lang_code": "a", "program": "cat", "chunk_bytes": 5 }));
        let text = "0123456789abcdefghij";

        let (chunks, reason) = run(&engine, text);

        assert_eq!(reason, StopReason::Finished);
        assert!(chunks.iter().all(|chunk| chunk.len() % 2 == 0 && chunk.len() <= 4));
        assert_eq!(joined(&chunks), text.as_bytes());
    }

    #[test]
    fn trailing_partial_frame_dropped() {
        let engine = engine(json!({ "lang_code": "a", "program": "cat" }));

        let (chunks, _) = run(&engine, "abc");

        assert_eq!(joined(&chunks), b"ab");
    }

    #[test]
    fn wav_header_stripped() {
        let engine = engine(json!({ "lang_code": "a", "program": "cat" }));
        let text = format!("RIFF{}pcm!", "x".repeat(40));

        let (chunks, reason) = run(&engine, &text);

        assert_eq!(reason, StopReason::Finished);
        assert_eq!(joined(&chunks), b"pcm!");
    }

    #[test]
    fn wav_header_kept_when_disabled() {
        let engine = engine(json!({ "lang_code": "a", "program": "cat", "strip_wav_header": false }));
        let text = format!("RIFF{}pcm!", "x".repeat(40));

        let (chunks, _) = run(&engine, &text);

        assert_eq!(joined(&chunks), text.as_bytes());
    }

    #[test]
    fn placeholders_substituted() {
        let engine = engine(json!({
            "lang_code": "b",
            "program": "sh",
            "args": ["-c", "printf '%s|%s|%s' {lang} {voice} {speed}"],
        }));

        let (chunks, reason) = run(&engine, "ignored");

        assert_eq!(reason, StopReason::Finished);
        assert_eq!(joined(&chunks), b"b|af_heart|1.5");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let engine = engine(json!({
            "lang_code": "a",
            "program": "sh",
            "args": ["-c", "echo 'voice not installed' >&2; exit 3"],
        }));

        let (chunks, reason) = run(&engine, "hello");

        assert!(chunks.is_empty());
        assert!(matches!(reason, StopReason::Failed(ref msg) if msg.contains("voice not installed")));
    }

    #[test]
    fn missing_program_fails_to_start() {
        let engine = engine(json!({ "lang_code": "a", "program": "/nonexistent/murmur-synth" }));
        let callbacks = SessionCallbacks::new(|_| {}, |_| {});

        let err = engine
            .start(utterance("hello"), callbacks, CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, TtsError::SessionStart(ref msg) if msg.contains("murmur-synth")));
    }

    #[test]
    fn cancellation_kills_process() {
        let engine = engine(json!({
            "lang_code": "a",
            "program": "sh",
            "args": ["-c", "exec sleep 30"],
        }));
        let (stop_tx, stop_rx) = mpsc::channel();
        let callbacks = SessionCallbacks::new(|_| {}, move |reason| stop_tx.send(reason).unwrap());
        let cancel = CancellationToken::new();

        engine.start(utterance("hello"), callbacks, cancel.clone()).unwrap();
        cancel.cancel();

        assert_eq!(
            stop_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            StopReason::Cancelled
        );
    }

    #[test]
    fn options_validated() {
        let serde_json::Value::Object(missing_program) = json!({ "lang_code": "a" }) else {
            unreachable!()
        };
        assert!(matches!(
            CommandPlugin.build_engine(&missing_program),
            Err(TtsError::InvalidOptions { .. })
        ));

        let serde_json::Value::Object(tiny_chunks) = json!({ "lang_code": "a", "program": "cat", "chunk_bytes": 1 })
        else {
            unreachable!()
        };
        assert!(CommandPlugin.build_engine(&tiny_chunks).is_err());
    }
}
