#![forbid(unsafe_code)]

pub mod audio;
pub mod background;
pub mod compose;
pub mod config;
pub mod core;
pub mod encode;
pub mod error;
pub mod generate;
pub mod layers;
pub mod paging;
pub mod progress;
pub mod quran;
pub mod raster;
pub mod render;
pub mod sequencer;
pub mod style;
pub mod timeline;
pub mod timing;
pub mod translation;

pub use config::ReelConfig;
pub use core::{Canvas, Fps, PixelBuffer, TimeSpan};
pub use error::{TilawahError, TilawahResult};
pub use generate::{GenerateRequest, GeneratedReel, generate_reel, prepare_reel};
pub use paging::{Page, compute_pages};
pub use sequencer::{
    AssembledReel, CancelToken, NarrationUnit, ReelTimeline, SequencerConfig, UnitData,
    UnitSequencer, UnitSource,
};
pub use style::ReelStyle;
pub use timeline::{FrameQuery, TextState, TextTimeline};
pub use timing::{WordTexts, WordTiming};
pub use translation::split_translation;
