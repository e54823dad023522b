use crate::api::handlers::auth::{
    Environment, RateLimit, DEFAULT_GOOGLE_AUTH_URL, DEFAULT_GOOGLE_TOKEN_URL,
    DEFAULT_GOOGLE_USERINFO_URL, DEFAULT_RECAPTCHA_VERIFY_URL, MAX_ACCESS_TOKEN_TTL_MINUTES,
    MAX_REFRESH_TOKEN_TTL_DAYS, MAX_RESET_TOKEN_TTL_SECONDS,
};
use clap::{Arg, Command};

pub const COMMAND: &str = "server";

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ACCESS_TOKEN_TTL_MINUTES: &str = "access-token-ttl-minutes";
pub const ARG_REFRESH_TOKEN_TTL_DAYS: &str = "refresh-token-ttl-days";
pub const ARG_RESET_TOKEN_TTL_SECONDS: &str = "reset-token-ttl-seconds";
pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_RATE_LIMIT_REGISTER: &str = "rate-limit-register";
pub const ARG_RATE_LIMIT_LOGIN: &str = "rate-limit-login";
pub const ARG_RATE_LIMIT_REFRESH: &str = "rate-limit-refresh";
pub const ARG_RATE_LIMIT_PASSWORD_CHANGE: &str = "rate-limit-password-change";
pub const ARG_RECAPTCHA_SECRET: &str = "recaptcha-secret";
pub const ARG_RECAPTCHA_MIN_SCORE: &str = "recaptcha-min-score";
pub const ARG_RECAPTCHA_VERIFY_URL: &str = "recaptcha-verify-url";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_REDIRECT_URL: &str = "google-redirect-url";
pub const ARG_GOOGLE_AUTH_URL: &str = "google-auth-url";
pub const ARG_GOOGLE_TOKEN_URL: &str = "google-token-url";
pub const ARG_GOOGLE_USERINFO_URL: &str = "google-userinfo-url";

#[must_use]
pub fn command() -> Command {
    let command = Command::new(COMMAND)
        .about("Run the authentication API server")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("SAASKIT_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help(
                    "PostgreSQL connection string. Without it users are kept in memory and lost on restart.",
                )
                .env("SAASKIT_DSN"),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign access, refresh and reset tokens")
                .env("SAASKIT_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment: development or production")
                .env("SAASKIT_ENVIRONMENT")
                .default_value("development")
                .value_parser(|value: &str| value.parse::<Environment>()),
        );

    let command = with_token_args(command);
    let command = with_rate_limit_args(command);
    let command = with_recaptcha_args(command);
    with_google_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .long(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .help("Access token TTL in minutes")
                .env("SAASKIT_ACCESS_TOKEN_TTL_MINUTES")
                .default_value("30")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_ACCESS_TOKEN_TTL_MINUTES)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_DAYS)
                .long(ARG_REFRESH_TOKEN_TTL_DAYS)
                .help("Refresh token TTL in days")
                .env("SAASKIT_REFRESH_TOKEN_TTL_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_REFRESH_TOKEN_TTL_DAYS)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_RESET_TOKEN_TTL_SECONDS)
                .help("Password reset token TTL in seconds")
                .env("SAASKIT_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_RESET_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend base URL, used for CORS and password reset links")
                .env("SAASKIT_FRONTEND_URL")
                .default_value("http://localhost:3000"),
        )
}

fn rate_limit_arg(name: &'static str, env: &'static str, default: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help("Requests allowed per client IP, as N/unit (second, minute, hour, day)")
        .env(env)
        .default_value(default)
        .value_parser(|value: &str| value.parse::<RateLimit>())
}

fn with_rate_limit_args(command: Command) -> Command {
    command
        .arg(rate_limit_arg(
            ARG_RATE_LIMIT_REGISTER,
            "SAASKIT_RATE_LIMIT_REGISTER",
            "5/minute",
        ))
        .arg(rate_limit_arg(
            ARG_RATE_LIMIT_LOGIN,
            "SAASKIT_RATE_LIMIT_LOGIN",
            "10/minute",
        ))
        .arg(rate_limit_arg(
            ARG_RATE_LIMIT_REFRESH,
            "SAASKIT_RATE_LIMIT_REFRESH",
            "20/minute",
        ))
        .arg(rate_limit_arg(
            ARG_RATE_LIMIT_PASSWORD_CHANGE,
            "SAASKIT_RATE_LIMIT_PASSWORD_CHANGE",
            "3/minute",
        ))
}

fn with_recaptcha_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RECAPTCHA_SECRET)
                .long(ARG_RECAPTCHA_SECRET)
                .help("reCAPTCHA v3 secret key, enables captcha checks when set")
                .env("SAASKIT_RECAPTCHA_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_RECAPTCHA_MIN_SCORE)
                .long(ARG_RECAPTCHA_MIN_SCORE)
                .help("Minimum reCAPTCHA score accepted")
                .env("SAASKIT_RECAPTCHA_MIN_SCORE")
                .default_value("0.5")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_RECAPTCHA_VERIFY_URL)
                .long(ARG_RECAPTCHA_VERIFY_URL)
                .help("reCAPTCHA siteverify endpoint")
                .env("SAASKIT_RECAPTCHA_VERIFY_URL")
                .default_value(DEFAULT_RECAPTCHA_VERIFY_URL),
        )
}

fn with_google_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id, enables Google sign-in when set")
                .env("SAASKIT_GOOGLE_CLIENT_ID")
                .requires_all([ARG_GOOGLE_CLIENT_SECRET, ARG_GOOGLE_REDIRECT_URL]),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("SAASKIT_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GOOGLE_REDIRECT_URL)
                .long(ARG_GOOGLE_REDIRECT_URL)
                .help("Callback URL registered with Google")
                .env("SAASKIT_GOOGLE_REDIRECT_URL"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_AUTH_URL)
                .long(ARG_GOOGLE_AUTH_URL)
                .help("Google authorization endpoint")
                .env("SAASKIT_GOOGLE_AUTH_URL")
                .default_value(DEFAULT_GOOGLE_AUTH_URL),
        )
        .arg(
            Arg::new(ARG_GOOGLE_TOKEN_URL)
                .long(ARG_GOOGLE_TOKEN_URL)
                .help("Google token endpoint")
                .env("SAASKIT_GOOGLE_TOKEN_URL")
                .default_value(DEFAULT_GOOGLE_TOKEN_URL),
        )
        .arg(
            Arg::new(ARG_GOOGLE_USERINFO_URL)
                .long(ARG_GOOGLE_USERINFO_URL)
                .help("Google userinfo endpoint")
                .env("SAASKIT_GOOGLE_USERINFO_URL")
                .default_value(DEFAULT_GOOGLE_USERINFO_URL),
        )
}
