pub mod episode;
pub mod title;

pub use episode::{detect_individual_episode_pattern, extract_episodes, extract_pack_file_counts};
pub use title::{
    CanonicalTitle, WordMatch, extract_season, extract_seasons, extract_year,
    is_complete_word_match, normalize, similarity,
};
