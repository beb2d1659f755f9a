//! Auth command - session management.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::{Args, Subcommand};
use console::{Style, style};
use fintrack_session::{SessionStore, SignUpOutcome};
use serde_json::json;

use super::{Context, print_json};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in with email and password
    SignIn {
        /// Account email
        #[arg(long)]
        email: String,

        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account
    SignUp {
        /// Account email
        #[arg(long)]
        email: String,

        /// Name shown in the app
        #[arg(long)]
        display_name: Option<String>,

        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and clear the stored session
    SignOut,

    /// Show the current session
    Status,

    /// Exchange the refresh token for a new session now
    Refresh,

    /// Mark onboarding as completed
    Onboarding {
        /// Mark onboarding as not completed instead
        #[arg(long)]
        reset: bool,
    },
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    let app = ctx.app().await?;
    let store = &app.session;

    match args.command {
        AuthCommand::SignIn { email, password } => {
            let password = read_password(password)?;
            store.sign_in(&email, &password).await?;
            print_done(ctx, "Signed in", store)
        }
        AuthCommand::SignUp {
            email,
            display_name,
            password,
        } => {
            let password = read_password(password)?;
            match store
                .sign_up(&email, &password, display_name.as_deref())
                .await?
            {
                SignUpOutcome::SignedIn => print_done(ctx, "Account created", store),
                SignUpOutcome::ConfirmationRequired(user) => {
                    if ctx.json_output {
                        print_json(&json!({
                            "confirmation_required": true,
                            "user_id": user.id,
                        }))
                    } else {
                        println!("Check {} to confirm your account, then sign in.", email);
                        Ok(())
                    }
                }
            }
        }
        AuthCommand::SignOut => {
            let was_logged_in = store.is_logged_in();
            store.sign_out().await;
            if ctx.json_output {
                print_json(&json!({ "logged_in": false }))
            } else {
                if was_logged_in {
                    let green = Style::new().green();
                    println!("{} Signed out", green.apply_to("✓"));
                } else {
                    println!("Not signed in.");
                }
                Ok(())
            }
        }
        AuthCommand::Status => print_status(ctx, store),
        AuthCommand::Refresh => {
            if !store.is_logged_in() {
                anyhow::bail!("Not logged in. Run 'fintrack auth sign-in' first.");
            }
            store.refresh_token().await?;
            print_done(ctx, "Session refreshed", store)
        }
        AuthCommand::Onboarding { reset } => {
            if reset {
                store.reset_onboarding().await;
            } else {
                store.complete_onboarding().await;
            }
            print_status(ctx, store)
        }
    }
}

fn read_password(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => Ok(rpassword::prompt_password("Password: ")?),
    }
}

fn print_done(ctx: &Context, message: &str, store: &SessionStore) -> Result<()> {
    if ctx.json_output {
        return print_status(ctx, store);
    }
    let green = Style::new().green();
    match store.user().and_then(|u| u.email) {
        Some(email) => println!("{} {} as {}", green.apply_to("✓"), message, email),
        None => println!("{} {}", green.apply_to("✓"), message),
    }
    Ok(())
}

fn print_status(ctx: &Context, store: &SessionStore) -> Result<()> {
    let snapshot = store.snapshot();
    let expires_at = snapshot
        .session()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s.expires_at, 0));

    if ctx.json_output {
        let user = snapshot.user();
        return print_json(&json!({
            "logged_in": snapshot.is_logged_in(),
            "user_id": user.map(|u| u.id.clone()),
            "email": user.and_then(|u| u.email.clone()),
            "display_name": user.and_then(|u| u.display_name()),
            "expires_at": expires_at.map(|t| t.to_rfc3339()),
            "has_completed_onboarding": snapshot.has_completed_onboarding,
            "is_vip": snapshot.is_vip,
        }));
    }

    let dim = Style::new().dim();
    println!("{}", style("Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));

    let Some(user) = snapshot.user() else {
        println!("  Not signed in");
        println!(
            "  {}",
            dim.apply_to("Run 'fintrack auth sign-in --email <EMAIL>' to sign in")
        );
        return Ok(());
    };

    println!("  User:       {}", user.email.as_deref().unwrap_or(&user.id));
    if let Some(name) = user.display_name() {
        println!("  Name:       {}", name);
    }
    if let Some(expires_at) = expires_at {
        println!(
            "  Expires:    {}",
            expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!(
        "  Onboarding: {}",
        if snapshot.has_completed_onboarding {
            "completed"
        } else {
            "pending"
        }
    );
    if ctx.verbose {
        println!(
            "  {}",
            dim.apply_to(format!("refresh scheduled: {}", store.has_pending_refresh()))
        );
    }
    Ok(())
}
