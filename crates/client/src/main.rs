// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use tracing::error;

use jobboard_client::config::ClientConfig;
use jobboard_client::error::ClientError;
use jobboard_client::feed::FeedEvent;
use jobboard_client::payment::reconcile::ReconcileOutcome;
use jobboard_client::payment::urls::parse_return;
use jobboard_client::api::models::{PremiumLevel, PremiumStatus};
use jobboard_client::payment::pending::PendingPayment;
use jobboard_client::session::{AuthPhase, SessionState};
use jobboard_client::subscription::SubscribeOutcome;
use jobboard_client::JobBoardClient;

#[derive(Parser)]
#[command(name = "jobboard", version, about = "Job-board account and subscription client")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Email a sign-in code
    RequestCode { email: String },
    /// Sign in with an emailed code
    SignIn { email: String, code: String },
    /// Show session, premium, and pending payment status
    Status,
    /// Sign out and forget stored tokens
    Logout,
    /// List subscription plans
    Plans,
    /// Start a subscription purchase
    Subscribe { plan_id: String },
    /// Reconcile the pending payment
    Reconcile {
        /// URL the payment provider redirected back to
        #[arg(long)]
        return_url: Option<String>,
    },
    /// Payment history
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Cancel an external payment
    CancelPayment { payment_id: String },
    /// Cancel a subscription and its pending payments
    CancelSubscription { subscription_id: String },
    /// Stream live job updates
    Watch {
        /// User id sent when authenticating the feed (defaults to the profile id)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Toggle or set notification sound muting
    Mute {
        #[arg(long)]
        on: bool,
        #[arg(long, conflicts_with = "on")]
        off: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            match e.downcast_ref::<ClientError>() {
                Some(ClientError::SessionExpired) => {
                    eprintln!("Session expired. Run `jobboard request-code <email>` to sign in again.");
                }
                Some(ce) if ce.is_retryable() => {
                    eprintln!("{ce} (temporary, try again)");
                }
                _ => error!("fatal: {e:#}"),
            }
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = JobBoardClient::open(cli.config)?;

    match cli.command {
        Command::RequestCode { email } => {
            client.session.request_code(&email).await?;
            println!("Verification code sent to {email}");
        }
        Command::SignIn { email, code } => {
            let user = client.session.sign_in(&email, &code).await?;
            println!("Signed in as {}", user.email);
        }
        Command::Status => {
            let state = client.start().await;
            let premium = if state.is_logged_in {
                Some(client.subscriptions.premium_status().await)
            } else {
                None
            };
            for line in status_lines(&state, premium, client.pending.get()) {
                println!("{line}");
            }
        }
        Command::Logout => {
            client.session.logout()?;
            println!("Signed out");
        }
        Command::Plans => {
            for plan in client.subscriptions.plans().await? {
                let price = plan.price.map(|p| p.to_string()).unwrap_or_default();
                println!("{:<6}  {:<24}  {}", plan.id, plan.name, price);
            }
        }
        Command::Subscribe { plan_id } => {
            require_session(&client).await?;
            match client.subscriptions.subscribe(&plan_id).await? {
                SubscribeOutcome::PaymentRequired { payment_url, pending, .. } => {
                    println!("Complete payment at: {payment_url}");
                    println!("Then run `jobboard reconcile` (payment {})", pending.payment_id);
                }
                SubscribeOutcome::Activated { .. } => println!("Subscription active"),
            }
        }
        Command::Reconcile { return_url } => {
            require_session(&client).await?;
            let outcome = match return_url {
                Some(url) => client.reconciler.reconcile_return(&parse_return(&url)?).await?,
                None => client.reconciler.reconcile().await?,
            };
            print_outcome(&outcome);
        }
        Command::History { page, page_size } => {
            let history = client.subscriptions.payment_history(page, page_size).await?;
            println!("{} payments", history.count);
            for invoice in history.results {
                println!(
                    "{:<12}  {:<22}  {} {}",
                    invoice.id.unwrap_or_default(),
                    invoice.status.label(),
                    invoice.price_amount.map(|a| a.to_string()).unwrap_or_default(),
                    invoice.price_currency.unwrap_or_default(),
                );
            }
        }
        Command::CancelPayment { payment_id } => {
            let outcome = client.reconciler.cancel_payment(&payment_id).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::CancelSubscription { subscription_id } => {
            let outcome = client.reconciler.cancel_subscription(&subscription_id).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Watch { user_id } => {
            let state = client.start().await;
            let user_id = user_id
                .or_else(|| state.user.and_then(|u| u.id))
                .ok_or_else(|| anyhow::anyhow!("no user id: sign in or pass --user-id"))?;
            let feed = client.job_feed(user_id)?;
            let mut rx = feed.subscribe();
            feed.start();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = rx.recv() => match event {
                        Ok(FeedEvent::GaveUp) => {
                            eprintln!("feed disconnected, giving up");
                            break;
                        }
                        Ok(event) => println!("{}", serde_json::to_string(&event)?),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    },
                }
            }
            feed.stop().await;
        }
        Command::Mute { on, off } => {
            let muted = if on || off {
                client.prefs.set_muted(on)?;
                on
            } else {
                client.prefs.toggle_muted()?
            };
            println!("notification sounds {}", if muted { "muted" } else { "on" });
        }
    }

    client.shutdown();
    Ok(())
}

async fn require_session(client: &JobBoardClient) -> anyhow::Result<()> {
    let state = client.start().await;
    if !state.is_logged_in {
        return Err(ClientError::SessionExpired.into());
    }
    Ok(())
}

/// Render `jobboard status`. A failed premium lookup is reported inline so
/// the rest of the status still prints.
fn status_lines(
    state: &SessionState,
    premium: Option<Result<PremiumStatus, ClientError>>,
    pending: Option<PendingPayment>,
) -> Vec<String> {
    let mut lines = Vec::new();
    match state.user {
        Some(ref user) if state.phase == AuthPhase::Authenticated => {
            lines.push(format!("signed in: {}", user.email));
        }
        _ => lines.push("signed out".to_owned()),
    }
    match premium {
        Some(Ok(premium)) => lines.push(format!("premium: {}", premium_label(&premium))),
        Some(Err(e)) => lines.push(format!("premium: unavailable ({e})")),
        None => {}
    }
    if let Some(pending) = pending {
        lines.push(format!(
            "pending payment: {} (subscription {})",
            pending.payment_id, pending.subscription_id
        ));
    }
    lines
}

fn premium_label(premium: &PremiumStatus) -> &'static str {
    match premium.has_premium {
        PremiumLevel::Active => "active",
        PremiumLevel::Pending => "payment pending",
        PremiumLevel::None => "none",
    }
}

fn print_outcome(outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::NothingPending => println!("No pending payment"),
        ReconcileOutcome::Success { premium, .. } => {
            let active = premium.as_ref().is_some_and(|p| p.is_active());
            println!("Payment completed{}", if active { ", premium active" } else { "" });
        }
        ReconcileOutcome::Failure { reason, .. } => println!("Payment failed: {reason}"),
        ReconcileOutcome::Inconclusive { reason, .. } => {
            println!("Payment not confirmed yet: {reason}. Run `jobboard reconcile` to retry.");
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
