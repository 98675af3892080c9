use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email-from")
                .long("email-from")
                .help("From address for outbound account emails")
                .env("BLOCKBUSTRE_EMAIL_FROM")
                .default_value("no-reply@blockbustre.com"),
        )
        .arg(
            Arg::new("email-api-url")
                .long("email-api-url")
                .help("Delivery API endpoint; when unset, emails are logged instead of sent")
                .env("BLOCKBUSTRE_EMAIL_API_URL"),
        )
        .arg(
            Arg::new("email-api-token")
                .long("email-api-token")
                .help("Bearer token for the delivery API")
                .env("BLOCKBUSTRE_EMAIL_API_TOKEN"),
        )
}
