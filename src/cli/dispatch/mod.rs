use crate::{
    api::handlers::auth::{Environment, RateLimit, RateLimits},
    cli::{
        actions::{
            client::{self as client_action, Command as ClientCommand},
            server::{self as server_action, GoogleArgs, RecaptchaArgs},
            Action,
        },
        commands::{client, server},
    },
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((server::COMMAND, sub)) => server_args(sub).map(Action::Server),
        Some((client::COMMAND, sub)) => client_args(sub).map(Action::Client),
        Some((name, _)) => Err(anyhow!("unknown command: {name}")),
        None => Err(anyhow!("missing command")),
    }
}

fn string(matches: &ArgMatches, name: &str) -> Option<String> {
    matches.get_one::<String>(name).cloned()
}

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    string(matches, name).with_context(|| format!("missing required argument: --{name}"))
}

fn secret(matches: &ArgMatches, name: &str) -> Result<SecretString> {
    required(matches, name).map(SecretString::from)
}

fn rate_limit(matches: &ArgMatches, name: &str) -> Result<RateLimit> {
    matches
        .get_one::<RateLimit>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn i64_arg(matches: &ArgMatches, name: &str) -> Result<i64> {
    matches
        .get_one::<i64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn server_args(matches: &ArgMatches) -> Result<server_action::Args> {
    let rate_limits = RateLimits {
        register: rate_limit(matches, server::ARG_RATE_LIMIT_REGISTER)?,
        login: rate_limit(matches, server::ARG_RATE_LIMIT_LOGIN)?,
        refresh: rate_limit(matches, server::ARG_RATE_LIMIT_REFRESH)?,
        password_change: rate_limit(matches, server::ARG_RATE_LIMIT_PASSWORD_CHANGE)?,
    };

    let recaptcha = match string(matches, server::ARG_RECAPTCHA_SECRET) {
        Some(secret) => Some(RecaptchaArgs {
            secret: SecretString::from(secret),
            min_score: matches
                .get_one::<f64>(server::ARG_RECAPTCHA_MIN_SCORE)
                .copied()
                .unwrap_or(crate::api::handlers::auth::DEFAULT_RECAPTCHA_MIN_SCORE),
            verify_url: required(matches, server::ARG_RECAPTCHA_VERIFY_URL)?,
        }),
        None => None,
    };

    let google = match string(matches, server::ARG_GOOGLE_CLIENT_ID) {
        Some(client_id) => Some(GoogleArgs {
            client_id,
            client_secret: secret(matches, server::ARG_GOOGLE_CLIENT_SECRET)?,
            redirect_url: required(matches, server::ARG_GOOGLE_REDIRECT_URL)?,
            auth_url: required(matches, server::ARG_GOOGLE_AUTH_URL)?,
            token_url: required(matches, server::ARG_GOOGLE_TOKEN_URL)?,
            userinfo_url: required(matches, server::ARG_GOOGLE_USERINFO_URL)?,
        }),
        None => None,
    };

    Ok(server_action::Args {
        port: matches.get_one::<u16>(server::ARG_PORT).copied().unwrap_or(8080),
        dsn: string(matches, server::ARG_DSN),
        jwt_secret: secret(matches, server::ARG_JWT_SECRET)?,
        access_token_ttl_minutes: i64_arg(matches, server::ARG_ACCESS_TOKEN_TTL_MINUTES)?,
        refresh_token_ttl_days: i64_arg(matches, server::ARG_REFRESH_TOKEN_TTL_DAYS)?,
        reset_token_ttl_seconds: i64_arg(matches, server::ARG_RESET_TOKEN_TTL_SECONDS)?,
        frontend_url: required(matches, server::ARG_FRONTEND_URL)?,
        environment: matches
            .get_one::<Environment>(server::ARG_ENVIRONMENT)
            .copied()
            .unwrap_or_default(),
        rate_limits,
        recaptcha,
        google,
    })
}

fn client_args(matches: &ArgMatches) -> Result<client_action::Args> {
    let command = match matches.subcommand() {
        Some((client::CMD_REGISTER, sub)) => ClientCommand::Register {
            email: required(sub, client::ARG_EMAIL)?,
            password: secret(sub, client::ARG_PASSWORD)?,
            name: required(sub, client::ARG_NAME)?,
            recaptcha_token: string(sub, client::ARG_RECAPTCHA_TOKEN),
        },
        Some((client::CMD_LOGIN, sub)) => ClientCommand::Login {
            email: required(sub, client::ARG_EMAIL)?,
            password: secret(sub, client::ARG_PASSWORD)?,
            recaptcha_token: string(sub, client::ARG_RECAPTCHA_TOKEN),
        },
        Some((client::CMD_ME, _)) => ClientCommand::Me,
        Some((client::CMD_LOGOUT, _)) => ClientCommand::Logout,
        Some((client::CMD_FORGOT_PASSWORD, sub)) => ClientCommand::ForgotPassword {
            email: required(sub, client::ARG_EMAIL)?,
            recaptcha_token: string(sub, client::ARG_RECAPTCHA_TOKEN),
        },
        Some((client::CMD_RESET_PASSWORD, sub)) => ClientCommand::ResetPassword {
            token: secret(sub, client::ARG_TOKEN)?,
            new_password: secret(sub, client::ARG_NEW_PASSWORD)?,
        },
        Some((client::CMD_CHANGE_PASSWORD, sub)) => ClientCommand::ChangePassword {
            current_password: secret(sub, client::ARG_CURRENT_PASSWORD)?,
            new_password: secret(sub, client::ARG_NEW_PASSWORD)?,
        },
        Some((name, _)) => return Err(anyhow!("unknown client command: {name}")),
        None => return Err(anyhow!("missing client command")),
    };

    Ok(client_action::Args {
        base_url: required(matches, client::ARG_BASE_URL)?,
        token_file: PathBuf::from(required(matches, client::ARG_TOKEN_FILE)?),
        command,
    })
}
