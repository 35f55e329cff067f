//! Value resolution: candidate-profile lookup and option matching.

mod matcher;
mod profile;

pub use matcher::{is_placeholder_option, match_option, normalize, token_overlap_match, AliasGroup, ALIAS_GROUPS};
pub use profile::{
    AiResponses, CandidateProfile, Compliance, Education, JobContext, Links, PersonalInfo,
    ProfileValue, ValueMap,
};
