//! CLI commands

use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use passage_application::SessionController;
use passage_domain::{AuthError, Credentials, Navigation, Route, auth::token_preview};
use passage_infrastructure::to_json_stable;

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register {
        /// Account name
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(short, long, env = "PASSAGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and store the session
    Login {
        /// Account name
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(short, long, env = "PASSAGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session
    Logout {
        /// Only forget the local session, do not contact the server
        #[arg(long)]
        local: bool,
    },

    /// Show the profile of the logged-in user
    Profile,

    /// Show the current session state
    Status,
}

impl Commands {
    pub async fn execute(self, session: &SessionController) -> Result<()> {
        match self {
            Self::Register { username, password } => {
                if let Navigation::Redirect(_) = session.authorize(Route::Register) {
                    bail!("already logged in, log out before registering a new account");
                }
                let message = session
                    .register(&Credentials::new(username, password))
                    .await
                    .map_err(user_facing)?;
                println!("{message}");
            }
            Self::Login { username, password } => {
                if let Navigation::Redirect(_) = session.authorize(Route::login()) {
                    println!("{}", describe(session));
                    return Ok(());
                }
                let message = session
                    .login(&Credentials::new(username, password))
                    .await
                    .map_err(user_facing)?;
                println!("{message}");
            }
            Self::Logout { local } => {
                session.logout(!local).await;
                println!("Logged out");
            }
            Self::Profile => {
                if let Navigation::Redirect(_) = session.authorize(Route::Profile) {
                    bail!("not logged in");
                }
                let user = session.fetch_profile().await.map_err(user_facing)?;
                print!("{}", to_json_stable(&user)?);
            }
            Self::Status => println!("{}", describe(session)),
        }
        Ok(())
    }
}

fn describe(session: &SessionController) -> String {
    let state = session.state();
    let tokens = session.tokens();
    match (session.current_user(), tokens.access_token()) {
        (Some(user), Some(token)) => format!(
            "{} as {} (token {})",
            state.label(),
            user.username,
            token_preview(&token)
        ),
        (None, Some(token)) => format!("{} (token {})", state.label(), token_preview(&token)),
        _ => state.label().to_string(),
    }
}

fn user_facing(error: AuthError) -> anyhow::Error {
    anyhow!(error.user_message())
}
