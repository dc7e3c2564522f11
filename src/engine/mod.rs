//! Game-state reconstruction engine
//!
//! A deterministic fold over ordered play-by-play events: normalize, track
//! running state, derive features, window, materialize.

pub mod derive;
pub mod normalize;
pub mod table;
pub mod tracker;
pub mod window;

pub use derive::{EnrichedEvent, FeatureDeriver, GameStaticFacts};
pub use normalize::{CanonicalEvent, EventKind, EventNormalizer, ShotCategory};
pub use table::{
    BatchOutcome, DataQualityFlags, GameBuildResult, GameInput, GameStateTable, TableBuilder,
};
pub use tracker::{StateTracker, TeamRunningState};
pub use window::{select_clutch, TimeBin};
