use clap::{Arg, ArgAction, Command};

pub const COMMAND: &str = "client";

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_TOKEN_FILE: &str = "token-file";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_NAME: &str = "name";
pub const ARG_TOKEN: &str = "token";
pub const ARG_NEW_PASSWORD: &str = "new-password";
pub const ARG_CURRENT_PASSWORD: &str = "current-password";
pub const ARG_RECAPTCHA_TOKEN: &str = "recaptcha-token";

pub const CMD_REGISTER: &str = "register";
pub const CMD_LOGIN: &str = "login";
pub const CMD_ME: &str = "me";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_FORGOT_PASSWORD: &str = "forgot-password";
pub const CMD_RESET_PASSWORD: &str = "reset-password";
pub const CMD_CHANGE_PASSWORD: &str = "change-password";

fn email() -> Arg {
    Arg::new(ARG_EMAIL)
        .long(ARG_EMAIL)
        .help("Account email")
        .required(true)
}

fn password(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .required(true)
        .action(ArgAction::Set)
}

fn recaptcha_token() -> Arg {
    Arg::new(ARG_RECAPTCHA_TOKEN)
        .long(ARG_RECAPTCHA_TOKEN)
        .help("reCAPTCHA token, when the server requires one")
}

#[must_use]
pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Talk to a running server, keeping tokens in a file")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Server base URL")
                .env("SAASKIT_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_TOKEN_FILE)
                .long(ARG_TOKEN_FILE)
                .help("File holding the access and refresh tokens")
                .env("SAASKIT_TOKEN_FILE")
                .default_value(".saaskit-tokens.json"),
        )
        .subcommand(
            Command::new(CMD_REGISTER)
                .about("Create an account and sign in")
                .arg(email())
                .arg(password(ARG_PASSWORD, "Account password"))
                .arg(
                    Arg::new(ARG_NAME)
                        .long(ARG_NAME)
                        .help("Display name")
                        .required(true),
                )
                .arg(recaptcha_token()),
        )
        .subcommand(
            Command::new(CMD_LOGIN)
                .about("Sign in and store the tokens")
                .arg(email())
                .arg(password(ARG_PASSWORD, "Account password"))
                .arg(recaptcha_token()),
        )
        .subcommand(Command::new(CMD_ME).about("Show the signed in user"))
        .subcommand(Command::new(CMD_LOGOUT).about("Revoke the session and forget the tokens"))
        .subcommand(
            Command::new(CMD_FORGOT_PASSWORD)
                .about("Request a password reset link")
                .arg(email())
                .arg(recaptcha_token()),
        )
        .subcommand(
            Command::new(CMD_RESET_PASSWORD)
                .about("Set a new password with a reset token")
                .arg(
                    Arg::new(ARG_TOKEN)
                        .long(ARG_TOKEN)
                        .help("Token from the reset link")
                        .required(true),
                )
                .arg(password(ARG_NEW_PASSWORD, "New password")),
        )
        .subcommand(
            Command::new(CMD_CHANGE_PASSWORD)
                .about("Change the password of the signed in user")
                .arg(password(ARG_CURRENT_PASSWORD, "Current password"))
                .arg(password(ARG_NEW_PASSWORD, "New password")),
        )
}
