pub mod matching {

    pub const EPISODE_TITLE_THRESHOLD: u8 = 65;

    pub const SEASON_TITLE_THRESHOLD: u8 = 75;

    pub const MOVIE_TITLE_THRESHOLD: u8 = 90;

    pub const YEAR_TOLERANCE: i32 = 1;
}

pub mod retry {

    pub const MAX_ATTEMPTS: u32 = 3;

    pub const INITIAL_BACKOFF_MS: u64 = 500;

    pub const MAX_BACKOFF_MS: u64 = 8_000;

    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
}

pub mod limits {

    pub const MAX_CANDIDATES_PER_SEARCH: usize = 50;

    pub const DEFAULT_HISTORY_LIMIT: u64 = 10;
}
