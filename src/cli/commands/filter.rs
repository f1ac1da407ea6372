use clap::{Arg, ArgAction, Command};

pub const ARG_ONLY: &str = "only";
pub const ARG_EXCEPT: &str = "except";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ONLY)
                .long("only")
                .help("Require authentication only for paths under this prefix (repeatable)")
                .env("GARDISTO_ONLY")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .conflicts_with(ARG_EXCEPT),
        )
        .arg(
            Arg::new(ARG_EXCEPT)
                .long("except")
                .help("Skip authentication for paths under this prefix (repeatable)")
                .env("GARDISTO_EXCEPT")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
}
