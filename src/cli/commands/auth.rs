use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{save_session, Connection};
use crate::cli::utils::{output_success, output_value, resolve_password};
use crate::cli::OutputFormat;
use crate::services::{AuthService, LoginRequest, RegisterRequest, User};

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login with email and password")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (falls back to CAIXAHUB_PASSWORD)")]
        password: Option<String>,
    },

    #[command(about = "Logout and forget the saved session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh the access token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Create a new account and log in")]
    Register {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "First name")]
        first_name: String,
        #[arg(long, help = "Last name")]
        last_name: String,
        #[arg(long, help = "Password (falls back to CAIXAHUB_PASSWORD)")]
        password: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let connection = Connection::open()?;
            let auth = AuthService::new(connection.http.clone());
            let request = LoginRequest::new(email, resolve_password(password)?);

            let user = auth.login(&request).await?;
            store_login(&connection, &user).await?;

            output_success(
                &output_format,
                &format!("Logged in as {}", user.email),
                Some(json!({ "user": user })),
            )
        }
        AuthCommands::Register { email, first_name, last_name, password } => {
            let connection = Connection::open()?;
            let auth = AuthService::new(connection.http.clone());
            let password = resolve_password(password)?;
            let request = RegisterRequest {
                email: email.trim().to_lowercase(),
                password: password.clone(),
                password2: password,
                first_name,
                last_name,
            };

            let user = auth.register(&request).await?;
            store_login(&connection, &user).await?;

            output_success(
                &output_format,
                &format!("Account created for {}", user.email),
                Some(json!({ "user": user })),
            )
        }
        AuthCommands::Logout => {
            let connection = Connection::open()?;
            if connection.session.is_logged_in() {
                AuthService::new(connection.http.clone()).logout().await;
            }

            let mut session = connection.session.clone();
            session.tokens = None;
            session.email = None;
            save_session(&session)?;

            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let connection = Connection::open()?;
            let session = &connection.session;
            let expires_at = session.tokens.as_ref().and_then(|t| t.access_expires_at());
            let status = json!({
                "logged_in": session.is_logged_in(),
                "email": session.email,
                "server_url": session.server_url(),
                "access_expires_at": expires_at,
            });

            output_value(&output_format, "auth", &status, |_| {
                match (&session.email, session.is_logged_in()) {
                    (Some(email), true) => println!("Logged in as {}", email),
                    (None, true) => println!("Logged in"),
                    _ => println!("Not logged in"),
                }
                println!("Server: {}", session.server_url());
                if let Some(exp) = expires_at.and_then(|exp| chrono::DateTime::from_timestamp(exp, 0)) {
                    println!("Access token expires: {}", exp.to_rfc3339());
                }
            })
        }
        AuthCommands::Refresh => {
            let connection = Connection::open_authenticated()?;
            let refreshed = AuthService::new(connection.http.clone()).refresh().await;
            connection.persist().await?;
            refreshed?;
            output_success(&output_format, "Access token refreshed", None)
        }
        AuthCommands::Whoami => {
            let connection = Connection::open_authenticated()?;
            let profile = AuthService::new(connection.http.clone()).profile().await;
            connection.persist().await?;
            let user = profile?;

            output_value(&output_format, "user", &user, |user: &User| {
                println!("{} <{}>", user.full_name(), user.email);
                println!("Id: {}", user.id);
                println!("Email verified: {}", if user.is_email_verified { "yes" } else { "no" });
            })
        }
    }
}

async fn store_login(connection: &Connection, user: &User) -> anyhow::Result<()> {
    let mut session = connection.session.clone();
    session.tokens = connection.http.tokens().get().await;
    session.email = Some(user.email.clone());
    save_session(&session)
}
