//! Mystic API client - command line entry point
//!
//! ```text
//! mystic                 start-up check (restore session, verify profile)
//! mystic login <email>   log in, reading the password from stdin
//! mystic logout          end the session
//! mystic contexts        list tarot reading contexts
//! mystic history         show the five most recent readings
//! ```

use std::io::BufRead;

use mystic::{MysticClient, Splash};
use mystic_infrastructure::load_settings;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = load_settings()?;
    tracing::info!(
        base_url = %settings.base_url,
        "Starting Mystic client v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = MysticClient::open(&settings).await?;
    let watcher = client.watch_session();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] => match client.splash().await? {
            Splash::LoginRequired => println!("Not logged in. Run `mystic login <email>`."),
            Splash::Ready(user) => println!("Welcome back, {}.", user.display_name()),
            Splash::Offline(user) => println!(
                "Offline. Cached profile: {}",
                user.map_or_else(|| "none".to_string(), |u| u.display_name())
            ),
        },
        ["login", email] => {
            eprint!("Password: ");
            let mut password = String::new();
            std::io::stdin().lock().read_line(&mut password)?;
            let login = client.auth.login(*email, password.trim_end()).await?;
            println!("Logged in as {}.", login.user.display_name());
        }
        ["logout"] => {
            client.auth.logout().await?;
            println!("Logged out.");
        }
        ["contexts"] => {
            for context in client.tarot.contexts().await? {
                println!("{:<24} {}", context.slug, context.name);
            }
        }
        ["history"] => {
            let Some(user) = client.auth.current_user().await else {
                return Err("not logged in".into());
            };
            for reading in client.history.recent(&user.id).await? {
                println!(
                    "{}  {}  {}",
                    reading.created_at.format("%Y-%m-%d %H:%M"),
                    reading.id,
                    reading.analysis.overview
                );
            }
        }
        _ => return Err(format!("unknown command: {}", args.join(" ")).into()),
    }

    drop(client);
    watcher.abort();
    Ok(())
}
