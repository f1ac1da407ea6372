use clap::{Arg, ArgAction, Command};

pub const ARG_SERVER: &str = "server";
pub const ARG_SECRET: &str = "secret";
pub const ARG_NAS_ID: &str = "nas-id";
pub const ARG_REALM: &str = "realm";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SERVER)
                .short('s')
                .long("server")
                .help("RADIUS server address (host:port); repeat in failover order")
                .env("GARDISTO_SERVER")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .required(true),
        )
        .arg(
            Arg::new(ARG_SECRET)
                .long("secret")
                .help("Shared secret for all RADIUS servers")
                .env("GARDISTO_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_NAS_ID)
                .long("nas-id")
                .help("NAS-Identifier attribute sent with every request (default: machine hostname)")
                .env("GARDISTO_NAS_ID"),
        )
        .arg(
            Arg::new(ARG_REALM)
                .long("realm")
                .help("Realm named in the authentication challenge")
                .default_value("Restricted")
                .env("GARDISTO_REALM"),
        )
}
