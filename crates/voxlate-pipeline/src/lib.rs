//! Pipeline orchestrator: speech in one language to speech in another.
//!
//! [`Pipeline::run`] takes a [`TranslationRequest`](voxlate_core::types::TranslationRequest)
//! through `Validating → Decoding → Recognizing → Translating → Synthesizing → Encoding`.
//! Every failure leaves as a [`StageError`] naming the stage that produced it.
//! When recognition hears nothing, translation and synthesis are skipped and a
//! header-only WAV is returned.

pub mod orchestrator;
pub mod stage;

pub use orchestrator::{Pipeline, PipelineOutcome, StageTimeouts, StageTiming, TranslatedSpeech};
pub use stage::{Fault, Stage, StageCause, StageError};
