pub mod cache {

    /// How long a cached catalog entry stays fresh before the next read
    /// triggers a re-fetch.
    pub const METADATA_STALENESS_MINUTES: u64 = 30;
}

pub mod catalog {

    pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

    pub const USER_AGENT: &str = "Trackarr/0.1";
}
