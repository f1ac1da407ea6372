use clap::{Arg, Command};

pub const ARG_CACHE_PATH: &str = "cache-path";
pub const ARG_CACHE_TTL: &str = "cache-ttl";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CACHE_PATH)
                .long("cache-path")
                .help("Credential cache database file (created if missing)")
                .default_value("gardisto.db")
                .env("GARDISTO_CACHE_PATH"),
        )
        .arg(
            Arg::new(ARG_CACHE_TTL)
                .long("cache-ttl")
                .help("Seconds a verified credential stays cached; 0 disables caching")
                .default_value("300")
                .env("GARDISTO_CACHE_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
}
