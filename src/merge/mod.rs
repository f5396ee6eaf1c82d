//! Multi-file merge pipeline
//!
//! Turns an ordered list of audio files into one continuous file with fade
//! envelopes and optional silence between tracks:
//!
//! 1. validate the request (no workspace, no processes on failure)
//! 2. open a per-run workspace next to the output file
//! 3. normalize and fade every track into the workspace, in order
//! 4. generate one silence clip (only when the pause is non-zero)
//! 5. concatenate into a staged file inside the workspace
//! 6. verify the staged file and move it onto the output path
//! 7. close the workspace, whatever happened before
//!
//! Nothing is retried. The first failing step ends the run, and the real
//! output path is only written once every step has succeeded.

mod concat;
mod fade;
mod silence;
mod workspace;

use workspace::Workspace;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::audio::{formats, FormatDescriptor};
use crate::error::{MergeError, Result};
use crate::tools::{ProcessRunner, Toolchain};

/// Target sample rate for every intermediate and final file
pub const SAMPLE_RATE: &str = "44100";
/// Target channel count (stereo)
pub const CHANNELS: &str = "2";

/// States of a merge run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Idle,
    ValidatingInputs,
    PreparingWorkspace,
    FadingTracks,
    GeneratingSilence,
    Concatenating,
    VerifyingOutput,
    CleaningUp,
    Succeeded,
    Failed,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ValidatingInputs => "validating inputs",
            Self::PreparingWorkspace => "preparing workspace",
            Self::FadingTracks => "fading tracks",
            Self::GeneratingSilence => "generating silence",
            Self::Concatenating => "concatenating",
            Self::VerifyingOutput => "verifying output",
            Self::CleaningUp => "cleaning up",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A single merge job
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    /// Input files, in playback order (duplicates allowed)
    pub inputs: Vec<PathBuf>,
    /// Final output file; its extension selects the format
    pub output: PathBuf,
    /// Silence between adjacent tracks, in seconds
    pub pause_seconds: f64,
    /// Fade-in/fade-out length, in seconds
    pub fade_seconds: f64,
}

impl MergeRequest {
    pub fn new(
        inputs: Vec<PathBuf>,
        output: impl Into<PathBuf>,
        pause_seconds: f64,
        fade_seconds: f64,
    ) -> Self {
        Self {
            inputs,
            output: output.into(),
            pause_seconds,
            fade_seconds,
        }
    }

    /// Check the request and resolve its paths and output format
    fn validate(&self) -> Result<ValidatedRequest> {
        if self.inputs.len() < 2 {
            return Err(MergeError::TooFewInputs(self.inputs.len()));
        }

        for (name, value) in [("pause", self.pause_seconds), ("fade", self.fade_seconds)] {
            if !value.is_finite() || value < 0.0 {
                return Err(MergeError::InvalidDuration { name, value });
            }
        }

        let format = formats::for_path(&self.output).ok_or_else(|| {
            MergeError::UnsupportedFormat(
                self.output
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "(none)".to_string()),
            )
        })?;

        let mut inputs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !input.exists() {
                return Err(MergeError::InputNotFound(input.clone()));
            }
            if !input.is_file() {
                return Err(MergeError::InputNotAFile(input.clone()));
            }
            inputs.push(
                std::path::absolute(input)
                    .map_err(MergeError::io(MergeStage::ValidatingInputs, input))?,
            );
        }

        let output = std::path::absolute(&self.output)
            .map_err(MergeError::io(MergeStage::ValidatingInputs, &self.output))?;

        Ok(ValidatedRequest {
            inputs,
            output,
            format,
        })
    }
}

#[derive(Debug)]
struct ValidatedRequest {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    format: &'static FormatDescriptor,
}

/// Progress notifications emitted at stage boundaries
#[derive(Debug, Clone, PartialEq)]
pub enum MergeEvent {
    StageEntered(MergeStage),
    TrackProcessed {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    Finished { success: bool },
}

/// Cooperative cancellation flag, checked between stages and tracks
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a merge run
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Requested output path
    pub output_path: PathBuf,
    /// Whether the output file was produced
    pub success: bool,
    /// Human-readable diagnostic if the merge failed
    pub error: Option<String>,
    /// Stages visited, in order
    pub stages: Vec<MergeStage>,
}

/// Runs merge requests against a toolchain
pub struct Merger<R: ProcessRunner> {
    runner: R,
    tools: Toolchain,
    cancel: CancelToken,
    events: Option<Sender<MergeEvent>>,
}

impl<R: ProcessRunner> Merger<R> {
    pub fn new(runner: R, tools: Toolchain) -> Self {
        Self {
            runner,
            tools,
            cancel: CancelToken::new(),
            events: None,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Sender<MergeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one merge to completion
    ///
    /// Never panics on tool or filesystem failures; the result carries the
    /// diagnostic instead.
    pub fn run(&self, request: &MergeRequest) -> MergeResult {
        let mut stages = vec![MergeStage::Idle];

        log::info!(
            "Merging {} files into {} (pause {}s, fade {}s)",
            request.inputs.len(),
            request.output.display(),
            request.pause_seconds,
            request.fade_seconds
        );

        let outcome = self.execute(request, &mut stages);
        let success = outcome.is_ok();
        self.enter(
            &mut stages,
            if success {
                MergeStage::Succeeded
            } else {
                MergeStage::Failed
            },
        );
        self.emit(MergeEvent::Finished { success });

        let error = match outcome {
            Ok(()) => {
                log::info!("Merge complete: {}", request.output.display());
                None
            }
            Err(e) => {
                if e.is_validation() {
                    log::warn!("Merge request rejected: {}", e);
                } else if let Some(stage) = e.stage() {
                    log::error!("Merge failed while {}: {}", stage, e);
                } else {
                    log::error!("Merge failed: {}", e);
                }
                Some(e.to_string())
            }
        };

        MergeResult {
            output_path: request.output.clone(),
            success,
            error,
            stages,
        }
    }

    fn execute(&self, request: &MergeRequest, stages: &mut Vec<MergeStage>) -> Result<()> {
        self.enter(stages, MergeStage::ValidatingInputs);
        let validated = request.validate()?;
        self.checkpoint()?;

        let output_dir = validated
            .output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.enter(stages, MergeStage::PreparingWorkspace);
        fs::create_dir_all(&output_dir)
            .map_err(MergeError::io(MergeStage::PreparingWorkspace, &output_dir))?;
        workspace::sweep_stale(&output_dir, workspace::STALE_AFTER);
        let workspace = Workspace::open(&output_dir)?;
        log::debug!("Merge run {} staging in {:?}", workspace.run_id(), workspace.dir());

        let result = self.run_stages(request, &validated, &workspace, stages);

        self.enter(stages, MergeStage::CleaningUp);
        workspace.close();

        result
    }

    fn run_stages(
        &self,
        request: &MergeRequest,
        validated: &ValidatedRequest,
        workspace: &Workspace,
        stages: &mut Vec<MergeStage>,
    ) -> Result<()> {
        let format = validated.format;
        let total = validated.inputs.len();

        self.checkpoint()?;
        self.enter(stages, MergeStage::FadingTracks);
        let mut tracks = Vec::with_capacity(total);
        for (index, input) in validated.inputs.iter().enumerate() {
            self.checkpoint()?;
            let track = fade::apply(
                &self.runner,
                &self.tools,
                input,
                index,
                total,
                request.fade_seconds,
                format,
                workspace,
            )?;
            self.emit(MergeEvent::TrackProcessed {
                index,
                total,
                path: input.clone(),
            });
            tracks.push(track);
        }
        debug_assert_eq!(tracks.len(), total);

        let silence = if request.pause_seconds > 0.0 {
            self.checkpoint()?;
            self.enter(stages, MergeStage::GeneratingSilence);
            silence::generate(
                &self.runner,
                &self.tools,
                request.pause_seconds,
                format,
                workspace,
            )?
        } else {
            None
        };

        self.checkpoint()?;
        self.enter(stages, MergeStage::Concatenating);
        let staged = workspace.path(&format.file_name("merged"));
        concat::concat(
            &self.runner,
            &self.tools,
            &tracks,
            silence.as_deref(),
            request.pause_seconds,
            format,
            workspace,
            &staged,
        )?;

        self.enter(stages, MergeStage::VerifyingOutput);
        publish(&staged, &validated.output)
    }

    fn enter(&self, stages: &mut Vec<MergeStage>, stage: MergeStage) {
        log::debug!("Merge stage: {}", stage);
        stages.push(stage);
        self.emit(MergeEvent::StageEntered(stage));
    }

    fn emit(&self, event: MergeEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            log::info!("Merge cancelled");
            Err(MergeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Move the verified staged file onto the real output path
fn publish(staged: &Path, output: &Path) -> Result<()> {
    let non_empty = fs::metadata(staged).map(|m| m.len() > 0).unwrap_or(false);
    if !non_empty {
        return Err(MergeError::MissingOutput {
            stage: MergeStage::VerifyingOutput,
            path: staged.to_path_buf(),
        });
    }

    fs::rename(staged, output).map_err(MergeError::io(MergeStage::VerifyingOutput, output))?;

    if !output.exists() {
        return Err(MergeError::MissingOutput {
            stage: MergeStage::VerifyingOutput,
            path: output.to_path_buf(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{touch_inputs, FakeRunner};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn merger(runner: &FakeRunner) -> Merger<&FakeRunner> {
        Merger::new(runner, FakeRunner::toolchain())
    }

    /// Directories left next to the output after a run
    fn leftover_workspaces(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect()
    }

    /// The single manifest handed to the concat step, as file names
    fn manifest_names(runner: &FakeRunner) -> Vec<String> {
        let manifests = runner.manifests();
        assert_eq!(manifests.len(), 1, "exactly one concat invocation");
        manifests[0]
            .iter()
            .map(|p| {
                Path::new(p)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_scenario_two_tracks_with_pause_and_fade() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let output = temp.path().join("out").join("mix.mp3");
        let runner = FakeRunner::new().with_duration("b.mp3", 12.0);

        let result = merger(&runner).run(&MergeRequest::new(inputs.clone(), &output, 2.0, 1.0));

        assert!(result.success, "{:?}", result.error);
        assert!(output.exists());

        let calls = runner.codec_calls();
        assert_eq!(calls.len(), 4, "two fades, one silence, one concat");

        assert_eq!(calls[0].arg_after("-i"), Some(inputs[0].to_str().unwrap()));
        assert_eq!(calls[0].arg_after("-af"), Some("afade=t=in:st=0:d=1"));

        assert_eq!(calls[1].arg_after("-i"), Some(inputs[1].to_str().unwrap()));
        assert_eq!(calls[1].arg_after("-af"), Some("afade=t=out:st=11:d=1"));

        assert_eq!(calls[2].arg_after("-i"), Some("anullsrc=r=44100:cl=stereo:d=2"));
        assert_eq!(calls[3].arg_after("-f"), Some("concat"));

        // Only the fade-out track needed a duration
        assert_eq!(runner.probe_calls().len(), 1);

        assert_eq!(
            manifest_names(&runner),
            vec!["track_000.mp3", "silence.mp3", "track_001.mp3"]
        );
        assert!(runner.manifests()[0].iter().all(|p| Path::new(p).is_absolute()));
    }

    #[test]
    fn test_scenario_three_tracks_no_pause_no_fade() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3", "c.mp3"]);
        let output = temp.path().join("mix.mp3");
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 0.0, 0.0));

        assert!(result.success, "{:?}", result.error);
        let calls = runner.codec_calls();
        assert_eq!(calls.len(), 4, "three normalizations and one concat");
        assert!(calls.iter().all(|c| !c.has_arg("-af")));
        assert!(calls.iter().all(|c| !c.args.iter().any(|a| a.contains("anullsrc"))));
        assert!(runner.probe_calls().is_empty());
        assert!(!result.stages.contains(&MergeStage::GeneratingSilence));
        assert_eq!(
            manifest_names(&runner),
            vec!["track_000.mp3", "track_001.mp3", "track_002.mp3"]
        );
    }

    #[test]
    fn test_scenario_missing_input_fails_before_anything_runs() {
        let temp = TempDir::new().unwrap();
        let mut inputs = touch_inputs(temp.path(), &["a.mp3"]);
        inputs.push(temp.path().join("missing.mp3"));
        let output = temp.path().join("mix.mp3");
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 1.0, 1.0));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing.mp3"));
        assert!(runner.calls().is_empty());
        assert!(leftover_workspaces(temp.path()).is_empty());
        assert_eq!(
            result.stages,
            vec![MergeStage::Idle, MergeStage::ValidatingInputs, MergeStage::Failed]
        );
    }

    #[test]
    fn test_scenario_unsupported_output_extension() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let output = temp.path().join("mix.xyz");
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 1.0, 1.0));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("xyz"));
        assert!(runner.calls().is_empty());
        assert!(!result.stages.contains(&MergeStage::PreparingWorkspace));
    }

    #[test]
    fn test_too_few_inputs() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3"]);
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(
            inputs,
            temp.path().join("mix.mp3"),
            0.0,
            0.0,
        ));

        assert!(!result.success);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_negative_durations_are_rejected() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(
            inputs,
            temp.path().join("mix.mp3"),
            -1.0,
            0.0,
        ));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("pause"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_track_failure_names_file_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "bad.mp3", "c.mp3"]);
        let output = temp.path().join("mix.mp3");
        let runner = FakeRunner::new().failing_on("bad.mp3");

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 1.0, 0.0));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("bad.mp3"));
        assert!(!output.exists());
        assert!(leftover_workspaces(temp.path()).is_empty());
        // c.mp3 was never attempted
        assert!(runner.calls().iter().all(|c| !c.args.iter().any(|a| a.ends_with("c.mp3"))));
        assert_eq!(
            &result.stages[result.stages.len() - 2..],
            &[MergeStage::CleaningUp, MergeStage::Failed]
        );
    }

    #[test]
    fn test_concat_failure_leaves_output_untouched() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let output = temp.path().join("mix.mp3");
        fs::write(&output, b"previous mix").unwrap();
        let runner = FakeRunner::new().failing_on("concat");

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 0.5, 0.5));

        assert!(!result.success);
        assert_eq!(fs::read(&output).unwrap(), b"previous mix");
        assert!(leftover_workspaces(temp.path()).is_empty());
    }

    #[test]
    fn test_concat_without_output_is_post_condition_failure() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let output = temp.path().join("mix.mp3");
        let runner = FakeRunner::new().without_output_on("concat");

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 0.0, 0.0));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("was not created"));
        assert!(!output.exists());
    }

    #[test]
    fn test_silence_failure_aborts() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let output = temp.path().join("mix.ogg");
        let runner = FakeRunner::new().failing_on("anullsrc");

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 3.0, 0.0));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("silence"));
        assert!(runner.codec_calls().iter().all(|c| c.arg_after("-f") != Some("concat")));
        assert!(leftover_workspaces(temp.path()).is_empty());
    }

    #[test]
    fn test_cleanup_after_success() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.wav", "b.flac"]);
        let output = temp.path().join("mix.flac");
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 1.0, 1.0));

        assert!(result.success);
        assert!(leftover_workspaces(temp.path()).is_empty());
        assert_eq!(
            result.stages,
            vec![
                MergeStage::Idle,
                MergeStage::ValidatingInputs,
                MergeStage::PreparingWorkspace,
                MergeStage::FadingTracks,
                MergeStage::GeneratingSilence,
                MergeStage::Concatenating,
                MergeStage::VerifyingOutput,
                MergeStage::CleaningUp,
                MergeStage::Succeeded,
            ]
        );
    }

    #[test]
    fn test_duplicate_inputs_are_processed_separately() {
        let temp = TempDir::new().unwrap();
        let a = touch_inputs(temp.path(), &["a.mp3"]).remove(0);
        let output = temp.path().join("mix.mp3");
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(
            vec![a.clone(), a.clone(), a],
            &output,
            0.0,
            1.0,
        ));

        assert!(result.success);
        assert_eq!(
            manifest_names(&runner),
            vec!["track_000.mp3", "track_001.mp3", "track_002.mp3"]
        );
    }

    #[test]
    fn test_identical_runs_visit_identical_stages() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3", "c.mp3"]);

        let first = merger(&FakeRunner::new()).run(&MergeRequest::new(
            inputs.clone(),
            temp.path().join("one.mp3"),
            1.0,
            2.0,
        ));
        let second = merger(&FakeRunner::new()).run(&MergeRequest::new(
            inputs,
            temp.path().join("two.mp3"),
            1.0,
            2.0,
        ));

        assert!(first.success && second.success);
        assert_eq!(first.stages, second.stages);
    }

    #[test]
    fn test_cancel_before_start() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let runner = FakeRunner::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = merger(&runner)
            .with_cancel_token(cancel)
            .run(&MergeRequest::new(inputs, temp.path().join("mix.mp3"), 0.0, 0.0));

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Merge cancelled"));
        assert!(runner.calls().is_empty());
        assert!(leftover_workspaces(temp.path()).is_empty());
    }

    /// Runner that requests cancellation once the first ffmpeg call returns
    struct CancelAfterFirstTrack {
        inner: FakeRunner,
        cancel: CancelToken,
    }

    impl ProcessRunner for CancelAfterFirstTrack {
        fn run(&self, program: &Path, args: &[std::ffi::OsString]) -> crate::tools::Invocation {
            let result = self.inner.run(program, args);
            if program == FakeRunner::toolchain().ffmpeg {
                self.cancel.cancel();
            }
            result
        }
    }

    #[test]
    fn test_cancel_between_tracks_still_cleans_up() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3", "c.mp3"]);
        let output = temp.path().join("mix.mp3");
        let cancel = CancelToken::new();
        let runner = CancelAfterFirstTrack {
            inner: FakeRunner::new(),
            cancel: cancel.clone(),
        };

        let result = Merger::new(&runner, FakeRunner::toolchain())
            .with_cancel_token(cancel)
            .run(&MergeRequest::new(inputs, &output, 0.0, 0.0));

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Merge cancelled"));
        assert_eq!(runner.inner.codec_calls().len(), 1);
        assert!(result.stages.contains(&MergeStage::FadingTracks));
        assert_eq!(
            &result.stages[result.stages.len() - 2..],
            &[MergeStage::CleaningUp, MergeStage::Failed]
        );
        assert!(!output.exists());
        assert!(leftover_workspaces(temp.path()).is_empty());
    }

    #[test]
    fn test_failed_publish_names_stage_and_output() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        // A non-empty directory squatting on the output path blocks the rename
        let output = temp.path().join("mix.mp3");
        fs::create_dir(&output).unwrap();
        fs::write(output.join("keep.txt"), b"x").unwrap();
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(inputs, &output, 0.0, 0.0));

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("verifying output"), "{error}");
        assert!(error.contains("mix.mp3"), "{error}");
        assert!(output.join("keep.txt").exists());
        assert_eq!(
            &result.stages[result.stages.len() - 3..],
            &[MergeStage::VerifyingOutput, MergeStage::CleaningUp, MergeStage::Failed]
        );
    }

    #[test]
    fn test_directory_input_is_not_reported_missing() {
        let temp = TempDir::new().unwrap();
        let mut inputs = touch_inputs(temp.path(), &["a.mp3"]);
        let album = temp.path().join("album");
        fs::create_dir(&album).unwrap();
        inputs.push(album);
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(
            inputs,
            temp.path().join("mix.mp3"),
            0.0,
            0.0,
        ));

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("not a regular file"), "{error}");
        assert!(!error.contains("not found"), "{error}");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_run_sweeps_abandoned_workspaces_only() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let recent = temp.path().join(".audio-merge-recent");
        fs::create_dir(&recent).unwrap();
        let runner = FakeRunner::new();

        let result = merger(&runner).run(&MergeRequest::new(
            inputs,
            temp.path().join("mix.mp3"),
            0.0,
            0.0,
        ));

        assert!(result.success, "{:?}", result.error);
        // Too young to be considered abandoned
        assert!(recent.is_dir());
    }

    #[test]
    fn test_events_report_track_progress() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let runner = FakeRunner::new();
        let (tx, rx) = mpsc::channel();

        let result = merger(&runner)
            .with_events(tx)
            .run(&MergeRequest::new(inputs, temp.path().join("mix.mp3"), 0.0, 0.0));
        assert!(result.success);

        let events: Vec<MergeEvent> = rx.try_iter().collect();
        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                MergeEvent::TrackProcessed { index, total, .. } => Some((*index, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(0, 2), (1, 2)]);
        assert_eq!(events.last(), Some(&MergeEvent::Finished { success: true }));
    }

    #[test]
    fn test_relative_output_is_resolved() {
        let temp = TempDir::new().unwrap();
        let inputs = touch_inputs(temp.path(), &["a.mp3", "b.mp3"]);
        let request = MergeRequest::new(inputs, "relative/mix.mp3", 0.0, 0.0);

        let validated = request.validate().unwrap();
        assert!(validated.output.is_absolute());
        assert!(validated.inputs.iter().all(|p| p.is_absolute()));
        assert_eq!(validated.format.name, "MP3");
    }
}
