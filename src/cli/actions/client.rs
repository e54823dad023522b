use crate::{
    api::handlers::auth::types::{
        ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest, UserLogin,
        UserRegister, UserResponse,
    },
    client::{AuthClient, FileTokenStore},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, sync::Arc};
use tracing::warn;

#[derive(Debug)]
pub enum Command {
    Register {
        email: String,
        password: SecretString,
        name: String,
        recaptcha_token: Option<String>,
    },
    Login {
        email: String,
        password: SecretString,
        recaptcha_token: Option<String>,
    },
    Me,
    Logout,
    ForgotPassword {
        email: String,
        recaptcha_token: Option<String>,
    },
    ResetPassword {
        token: SecretString,
        new_password: SecretString,
    },
    ChangePassword {
        current_password: SecretString,
        new_password: SecretString,
    },
}

#[derive(Debug)]
pub struct Args {
    pub base_url: String,
    pub token_file: PathBuf,
    pub command: Command,
}

/// Execute a client command against a running server.
/// # Errors
/// Returns an error if the token file is unreadable or the request fails.
pub async fn execute(args: Args) -> Result<()> {
    let store = Arc::new(
        FileTokenStore::open(&args.token_file)
            .with_context(|| format!("Failed to open {}", args.token_file.display()))?,
    );
    let client = AuthClient::new(&args.base_url)?
        .with_token_store(store)
        .with_session_expired_hook(|login_path| {
            warn!("Session expired, run `saaskit client login` ({login_path})");
        });

    match args.command {
        Command::Register {
            email,
            password,
            name,
            recaptcha_token,
        } => {
            let login = client
                .register(&UserRegister {
                    email,
                    password: password.expose_secret().to_string(),
                    name,
                    recaptcha_token,
                })
                .await?;
            print_user(&login.user)?;
            println!("Tokens saved to {}", args.token_file.display());
        }
        Command::Login {
            email,
            password,
            recaptcha_token,
        } => {
            let login = client
                .login(&UserLogin {
                    email,
                    password: password.expose_secret().to_string(),
                    recaptcha_token,
                })
                .await?;
            print_user(&login.user)?;
            println!("Tokens saved to {}", args.token_file.display());
        }
        Command::Me => print_user(&client.me().await?)?,
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::ForgotPassword {
            email,
            recaptcha_token,
        } => {
            let response = client
                .forgot_password(&ForgotPasswordRequest {
                    email,
                    recaptcha_token,
                })
                .await?;
            println!("{}", response.message);
        }
        Command::ResetPassword {
            token,
            new_password,
        } => {
            let response = client
                .reset_password(&ResetPasswordRequest {
                    token: token.expose_secret().to_string(),
                    new_password: new_password.expose_secret().to_string(),
                })
                .await?;
            println!("{}", response.message);
        }
        Command::ChangePassword {
            current_password,
            new_password,
        } => {
            let response = client
                .change_password(&ChangePasswordRequest {
                    current_password: current_password.expose_secret().to_string(),
                    new_password: new_password.expose_secret().to_string(),
                })
                .await?;
            println!("{}", response.message);
        }
    }

    Ok(())
}

fn print_user(user: &UserResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}
