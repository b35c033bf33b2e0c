pub mod features;
pub mod report;
pub mod roles;
pub mod scoring;
pub mod tuning;

pub use features::{PlayerFeatures, PlayerId};
pub use report::{MatchInput, MatchRater, MatchReport, rate_match, rate_matches};
pub use roles::{Role, RoleAssignment, RoleClassifier, RoleConfig};
pub use scoring::{CategoryScores, ScoreConfig, ScoreEngine, UTILITY_HIDDEN};
pub use tuning::{Tuning, default_tuning, load_tuning, load_tuning_from};
